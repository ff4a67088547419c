use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{info, warn};
use parking_lot::Mutex;

use obus_shared::{AckCallback, BusDescriptor, MethodCall, Object, ObjectDescriptor, ObusAddress};

use crate::{
    client_config::{ClientConfig, DispatchMode},
    connection::{connection::Connection, state::ConnectionState, DispatchMessage},
    error::ClientError,
    notify::{
        bus_events::BusEventNotifier, object_events::ObjectEventNotifier, registry::ObjectRegistry,
    },
    transport::{Connector, SystemConnector, Transport},
};

/// Client mirroring the objects of one bus.
///
/// Cloning a `Client` yields another handle on the same connection.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    connection: Arc<Connection>,
    runtime: Mutex<Option<Runtime>>,
    manual_queue: Mutex<Option<Receiver<DispatchMessage>>>,
}

/// Threads and channels of a started client
struct Runtime {
    transport: Transport,
    dispatch: Sender<DispatchMessage>,
    dispatcher: Option<JoinHandle<()>>,
    /// Set when stopped from a listener, so the dispatcher drops what is
    /// still queued
    exit: Arc<AtomicBool>,
}

impl Client {
    /// Create a new Client
    pub fn new(config: ClientConfig, descriptor: Arc<BusDescriptor>) -> Self {
        Self::with_bus_events(config, descriptor, Arc::new(BusEventNotifier::new()))
    }

    /// Create a new Client notifying bus events to `bus_events`
    pub fn with_bus_events(
        config: ClientConfig,
        descriptor: Arc<BusDescriptor>,
        bus_events: Arc<BusEventNotifier>,
    ) -> Self {
        let connection = Connection::new(config.name.clone(), descriptor, bus_events);
        connection.set_logging(config.log_objects, config.log_events, config.log_calls);
        Self {
            inner: Arc::new(ClientInner {
                config,
                connection: Arc::new(connection),
                runtime: Mutex::new(None),
                manual_queue: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.connection.name()
    }

    pub fn descriptor(&self) -> &Arc<BusDescriptor> {
        self.inner.connection.descriptor()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Connects to `address` over TCP or a Unix-domain socket
    pub fn start(&self, address: ObusAddress) -> Result<(), ClientError> {
        self.start_with_connector(address, Arc::new(SystemConnector))
    }

    /// Connects to `address` through `connector`, reconnecting whenever the
    /// connection fails or is lost until [`Client::stop`] is called
    pub fn start_with_connector(
        &self,
        address: ObusAddress,
        connector: Arc<dyn Connector>,
    ) -> Result<(), ClientError> {
        let mut runtime = self.inner.runtime.lock();
        let connection = &self.inner.connection;
        connection.begin()?;
        info!("Starting client '{}' on {}", connection.name(), address);

        let (dispatch, queue) = mpsc::channel();
        let exit = Arc::new(AtomicBool::new(false));
        let dispatcher = match self.inner.config.dispatch {
            DispatchMode::Thread => {
                let dispatched = connection.clone();
                let dispatcher_exit = exit.clone();
                let spawned = thread::Builder::new()
                    .name("obus-dispatcher".to_string())
                    .spawn(move || dispatch_loop(dispatched, queue, dispatcher_exit));
                match spawned {
                    Ok(handle) => Some(handle),
                    Err(err) => {
                        connection.abort_begin();
                        return Err(ClientError::ThreadSpawn {
                            thread: "dispatcher",
                            reason: err.to_string(),
                        });
                    }
                }
            }
            DispatchMode::Manual => {
                *self.inner.manual_queue.lock() = Some(queue);
                None
            }
        };

        let config = &self.inner.config;
        let transport = match Transport::start(
            address,
            connector,
            config.reconnect_delay,
            config.read_buffer_size,
            dispatch.clone(),
        ) {
            Ok(transport) => transport,
            Err(err) => {
                let _ = dispatch.send(DispatchMessage::Stop);
                if let Some(dispatcher) = dispatcher {
                    let _ = dispatcher.join();
                }
                self.inner.manual_queue.lock().take();
                connection.abort_begin();
                return Err(err);
            }
        };
        connection.attach_outbox(transport.outbox());

        *runtime = Some(Runtime {
            transport,
            dispatch,
            dispatcher,
            exit,
        });
        Ok(())
    }

    /// Closes the connection and stops every client thread. Calls still
    /// pending are acknowledged with `ABORTED`.
    ///
    /// May be called from a listener; stopping an idle client does nothing.
    pub fn stop(&self) {
        let runtime = self.inner.runtime.lock().take();
        if let Some(runtime) = runtime {
            info!("Stopping client '{}'", self.name());
            stop_runtime(&self.inner.connection, runtime);
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Runs the listeners of every message queued so far, on the calling
    /// thread. Only meaningful with [`DispatchMode::Manual`].
    ///
    /// Returns the number of messages handled.
    pub fn process_events(&self) -> usize {
        let messages: Vec<DispatchMessage> = match &*self.inner.manual_queue.lock() {
            Some(queue) => queue.try_iter().collect(),
            None => return 0,
        };
        self.handle_all(messages)
    }

    /// Like [`Client::process_events`], but waits up to `timeout` for a
    /// first message when the queue is empty
    pub fn process_events_timeout(&self, timeout: Duration) -> usize {
        let messages: Vec<DispatchMessage> = {
            let guard = self.inner.manual_queue.lock();
            let queue = match &*guard {
                Some(queue) => queue,
                None => return 0,
            };
            match queue.recv_timeout(timeout) {
                Ok(first) => std::iter::once(first).chain(queue.try_iter()).collect(),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return 0
                }
            }
        };
        self.handle_all(messages)
    }

    fn handle_all(&self, messages: Vec<DispatchMessage>) -> usize {
        let mut handled = 0;
        for message in messages {
            handled += 1;
            if !self.inner.connection.handle(message) {
                break;
            }
        }
        handled
    }

    /// Sends `call` to the server. `callback` receives the acknowledgement,
    /// or `ABORTED` if the object goes away or the client is stopped first.
    ///
    /// Returns the handle of the call.
    pub fn call_bus_method(
        &self,
        call: MethodCall,
        callback: Option<AckCallback>,
    ) -> Result<u16, ClientError> {
        self.inner.connection.call_bus_method(call, callback)
    }

    /// Number of calls sent and not acknowledged yet
    pub fn pending_calls(&self) -> usize {
        self.inner.connection.pending_calls()
    }

    pub fn get_object(&self, handle: u16) -> Option<Arc<Object>> {
        self.inner.connection.get_object(handle)
    }

    /// Every mirrored object of one class, ordered by handle
    pub fn objects(&self, descriptor: &ObjectDescriptor) -> Vec<Arc<Object>> {
        self.inner.connection.objects_of(descriptor)
    }

    /// Every mirrored object, ordered by handle
    pub fn all_objects(&self) -> Vec<Arc<Object>> {
        self.inner.connection.objects()
    }

    /// Writes the connection state, then one line per mirrored object
    pub fn dump(&self, writer: &mut dyn io::Write) -> io::Result<()> {
        self.inner.connection.dump(writer)
    }

    pub fn bus_events(&self) -> &Arc<BusEventNotifier> {
        self.inner.connection.bus_events()
    }

    /// Attaches the registry of one object class
    pub fn add_registry<K>(&self, registry: Arc<ObjectRegistry<K>>) -> Result<(), ClientError>
    where
        K: Eq + std::hash::Hash + Send + 'static,
    {
        self.inner.connection.add_registry(registry)
    }

    /// Attaches the event notifier of one object class
    pub fn add_object_events(&self, notifier: Arc<ObjectEventNotifier>) -> Result<(), ClientError> {
        self.inner.connection.add_object_events(notifier)
    }

    pub fn set_logging(&self, objects: bool, events: bool, calls: bool) {
        self.inner.connection.set_logging(objects, events, calls);
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            stop_runtime(&self.connection, runtime);
        }
    }
}

fn stop_runtime(connection: &Connection, runtime: Runtime) {
    let Runtime {
        mut transport,
        dispatch,
        dispatcher,
        exit,
    } = runtime;
    transport.stop();

    match dispatcher {
        Some(dispatcher) if dispatcher.thread().id() != thread::current().id() => {
            let _ = dispatch.send(DispatchMessage::Stop);
            if dispatcher.join().is_err() {
                warn!("Dispatcher thread panicked");
            }
        }
        Some(_) => {
            // called from a listener: the dispatcher exits once this returns
            exit.store(true, Ordering::SeqCst);
            connection.shutdown();
        }
        None => connection.shutdown(),
    }
}

fn dispatch_loop(
    connection: Arc<Connection>,
    queue: Receiver<DispatchMessage>,
    exit: Arc<AtomicBool>,
) {
    while let Ok(message) = queue.recv() {
        if !connection.handle(message) || exit.load(Ordering::SeqCst) {
            break;
        }
    }
}

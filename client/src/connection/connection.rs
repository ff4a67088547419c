use std::{
    collections::HashMap,
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
        Arc,
    },
};

use log::{error, info, warn};
use parking_lot::{Mutex, RwLock};

use obus_shared::{
    encode_frame, AckCallback, AckKind, Bus, BusDescriptor, BusEvent, BusEventDescriptor,
    ConnectionRequest, ConnectionStatus, MethodCall, Object, ObjectDescriptor, ObjectEvent,
    Packet, PacketType, RawPacket, BUS_EVENT_CONNECTED, BUS_EVENT_CONNECTION_REFUSED,
    BUS_EVENT_DISCONNECTED,
};

use crate::{
    error::ClientError,
    notify::{
        bus_events::BusEventNotifier,
        listener::Phase,
        object_events::ObjectEventNotifier,
        registry::ClassRegistry,
    },
    transport::TxMessage,
};

use super::{pending_calls::PendingCalls, state::ConnectionState, DispatchMessage};

/// State shared by a client and its dispatcher: the mirrored bus, the
/// pending calls and the listeners to notify.
///
/// Listener callbacks are never run while one of the locks below is held,
/// so a callback may call back into the client.
pub(crate) struct Connection {
    name: String,
    descriptor: Arc<BusDescriptor>,
    state: Mutex<ConnectionState>,
    bus: RwLock<Bus>,
    pending: Mutex<PendingCalls>,
    bus_events: Arc<BusEventNotifier>,
    registries: RwLock<HashMap<u16, Arc<dyn ClassRegistry>>>,
    object_events: RwLock<HashMap<u16, Arc<ObjectEventNotifier>>>,
    outbox: Mutex<Option<Sender<TxMessage>>>,
    log_objects: AtomicBool,
    log_events: AtomicBool,
    log_calls: AtomicBool,
}

impl Connection {
    pub fn new(
        name: String,
        descriptor: Arc<BusDescriptor>,
        bus_events: Arc<BusEventNotifier>,
    ) -> Self {
        Self {
            name,
            bus: RwLock::new(Bus::new(descriptor.clone())),
            descriptor,
            state: Mutex::new(ConnectionState::Idle),
            pending: Mutex::new(PendingCalls::new()),
            bus_events,
            registries: RwLock::new(HashMap::new()),
            object_events: RwLock::new(HashMap::new()),
            outbox: Mutex::new(None),
            log_objects: AtomicBool::new(false),
            log_events: AtomicBool::new(false),
            log_calls: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &Arc<BusDescriptor> {
        &self.descriptor
    }

    pub fn bus_events(&self) -> &Arc<BusEventNotifier> {
        &self.bus_events
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// True once `shutdown` ran, possibly from a listener further up the stack
    fn stopped(&self) -> bool {
        self.state() == ConnectionState::Idle
    }

    fn set_state(&self, state: ConnectionState) -> ConnectionState {
        std::mem::replace(&mut *self.state.lock(), state)
    }

    pub fn set_logging(&self, objects: bool, events: bool, calls: bool) {
        self.log_objects.store(objects, Ordering::Relaxed);
        self.log_events.store(events, Ordering::Relaxed);
        self.log_calls.store(calls, Ordering::Relaxed);
    }

    fn logs_objects(&self) -> bool {
        self.log_objects.load(Ordering::Relaxed)
    }

    fn logs_events(&self) -> bool {
        self.log_events.load(Ordering::Relaxed)
    }

    fn logs_calls(&self) -> bool {
        self.log_calls.load(Ordering::Relaxed)
    }

    // Lifecycle

    /// Leaves IDLE for CONNECTING, failing if the client was already started
    pub fn begin(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        if *state != ConnectionState::Idle {
            return Err(ClientError::AlreadyStarted { state: *state });
        }
        *state = ConnectionState::Connecting;
        Ok(())
    }

    /// Undoes `begin` when the transport could not be started
    pub fn abort_begin(&self) {
        self.set_state(ConnectionState::Idle);
    }

    pub fn attach_outbox(&self, outbox: Sender<TxMessage>) {
        *self.outbox.lock() = Some(outbox);
    }

    /// Handles one dispatcher message. Returns false once the dispatcher
    /// should exit.
    pub fn handle(&self, message: DispatchMessage) -> bool {
        if let DispatchMessage::Stop = message {
            self.shutdown();
            return false;
        }
        if self.state() == ConnectionState::Idle {
            // stopped from a callback, drain what the reader posted before
            return true;
        }
        match message {
            DispatchMessage::Connected => self.send_connection_request(),
            DispatchMessage::Disconnected => self.disconnect(),
            DispatchMessage::Packet(raw) => self.recv_packet(raw),
            DispatchMessage::Stop => {}
        }
        true
    }

    /// Drops the current connection. Objects mirrored while connected leave
    /// through a `disconnected` bus event.
    fn disconnect(&self) {
        let previous = self.set_state(ConnectionState::Disconnecting);
        if previous == ConnectionState::Connected {
            match self.descriptor.bus_event_by_uid(BUS_EVENT_DISCONNECTED) {
                Some(descriptor) => {
                    let mut bus_event = BusEvent::new(descriptor.clone());
                    for object in self.bus.read().objects() {
                        bus_event.add_unregister(object);
                    }
                    self.dispatch_bus_event(&mut bus_event);
                }
                None => error!("Bus '{}' has no disconnected event", self.descriptor.name()),
            }
        }
        self.set_state(ConnectionState::Connecting);
    }

    /// Final step of `stop`: disconnects, aborts the calls still pending and
    /// goes back to IDLE.
    pub fn shutdown(&self) {
        if self.state() == ConnectionState::Connected {
            self.disconnect();
        }
        let (calls, objects) = {
            let mut bus = self.bus.write();
            let calls = self.pending.lock().take_all();
            (calls, bus.clear())
        };
        for mut call in calls {
            warn!("Call {} aborted: client stopped", call.handle());
            call.complete(AckKind::Aborted);
        }
        for object in objects {
            warn!("Object {} dropped: client stopped", object);
        }
        self.outbox.lock().take();
        self.set_state(ConnectionState::Idle);
    }

    // Outgoing

    fn send(&self, bytes: Vec<u8>) {
        let outbox = self.outbox.lock().clone();
        match outbox {
            Some(outbox) => {
                if outbox.send(TxMessage::Packet(bytes)).is_err() {
                    warn!("Tx packet lost: writer stopped");
                }
            }
            None => warn!("Tx packet lost: client not started"),
        }
    }

    fn send_connection_request(&self) {
        let request = ConnectionRequest::new(self.descriptor.name(), self.descriptor.crc(), &self.name);
        info!(
            "Sending connection request: bus='{}' crc=0x{:08x} client='{}'",
            request.bus_name, request.crc, request.client_name
        );
        self.send(Packet::ConnectionRequest(request).encode());
    }

    /// Sends a method call; `callback` later receives its acknowledgement
    pub fn call_bus_method(
        &self,
        mut call: MethodCall,
        callback: Option<AckCallback>,
    ) -> Result<u16, ClientError> {
        if self.stopped() {
            return Err(ClientError::NotStarted);
        }

        // the bus lock is held until the call is pending, so a removal of
        // the object either comes first and refuses the call or finds it
        let (handle, displaced, bytes) = {
            let bus = self.bus.read();
            let registered = match call.object() {
                Some(object) => bus
                    .find(object.handle())
                    .map_or(false, |found| Arc::ptr_eq(found, &object)),
                None => false,
            };
            if !registered {
                let uid = call.descriptor().object_uid();
                return Err(ClientError::ObjectNotRegistered {
                    uid,
                    handle: call.object_handle(),
                });
            }
            call.set_callback(callback);

            let mut pending = self.pending.lock();
            let (handle, displaced) = pending.insert(call);
            let bytes = pending.get(handle).map(|call| {
                if self.logs_calls() {
                    info!("Calling {}", call);
                }
                encode_frame(PacketType::Call, |buffer| call.encode(buffer))
            });
            (handle, displaced, bytes)
        };
        if let Some(mut displaced) = displaced {
            warn!("Call {} aborted: no free call handle", displaced.handle());
            displaced.complete(AckKind::Aborted);
        }
        if let Some(bytes) = bytes {
            self.send(bytes);
        }
        Ok(handle)
    }

    // Incoming

    fn recv_packet(&self, raw: RawPacket) {
        let decoded = {
            let bus = self.bus.read();
            Packet::decode(&raw, &bus)
        };
        let packet = match decoded {
            Ok(Some(packet)) => packet,
            Ok(None) => return,
            Err(err) => {
                warn!("Rx packet {} dropped: {}", raw.packet_type(), err);
                return;
            }
        };

        match packet {
            Packet::ConnectionResponse { status, objects } => {
                self.recv_connection_response(status, objects)
            }
            Packet::Add(object) => self.recv_add(object),
            Packet::Remove(object) => self.recv_remove(object),
            Packet::BusEvent(mut bus_event) => self.dispatch_bus_event(&mut bus_event),
            Packet::Event(event) => self.recv_event(event),
            Packet::Ack { handle, ack } => self.recv_ack(handle, ack),
            other => warn!("Unexpected {} packet from server", other.packet_type()),
        }
    }

    fn recv_connection_response(&self, status: ConnectionStatus, objects: Vec<Arc<Object>>) {
        if self.state() != ConnectionState::Connecting {
            warn!("Connection response ignored in state {}", self.state());
            return;
        }
        info!("Connection {}", status);

        let uid = match status {
            ConnectionStatus::Accepted => {
                self.set_state(ConnectionState::Connected);
                BUS_EVENT_CONNECTED
            }
            ConnectionStatus::Refused => {
                self.set_state(ConnectionState::Refused);
                BUS_EVENT_CONNECTION_REFUSED
            }
        };
        let descriptor = match self.descriptor.bus_event_by_uid(uid) {
            Some(descriptor) => descriptor.clone(),
            None => {
                error!("Bus '{}' has no bus event uid={}", self.descriptor.name(), uid);
                return;
            }
        };
        let mut bus_event = BusEvent::new(descriptor);
        if status == ConnectionStatus::Accepted {
            for object in objects {
                bus_event.add_register(object);
            }
        }
        self.dispatch_bus_event(&mut bus_event);
    }

    fn recv_add(&self, object: Arc<Object>) {
        if self.register_object(&object) {
            self.registry_add(&object, None);
        }
    }

    fn recv_remove(&self, object: Arc<Object>) {
        self.registry_remove(&object, None);
        self.unregister_object(&object);
    }

    fn recv_event(&self, mut event: ObjectEvent) {
        let object = match event.object() {
            Some(object) => object,
            None => return,
        };
        if self.logs_events() {
            info!("Event {}", event);
        }
        self.notify_event(&object, &event, None, Phase::PreCommit);
        if self.stopped() {
            return;
        }
        event.commit();
        self.notify_event(&object, &event, None, Phase::PostCommit);
    }

    fn recv_ack(&self, handle: u16, ack: AckKind) {
        let call = self.pending.lock().take(handle);
        match call {
            Some(mut call) => {
                if self.logs_calls() {
                    info!("Call handle={} acknowledged: {}", handle, ack);
                }
                call.complete(ack);
            }
            None => warn!("Ack {} for unknown call handle={}", ack, handle),
        }
    }

    /// Runs the two phases of a bus event: pre-commit listeners see the
    /// state before any event is applied, post-commit listeners see it
    /// after every event is applied.
    fn dispatch_bus_event(&self, bus_event: &mut BusEvent) {
        if !bus_event.mark_dispatched() {
            return;
        }
        if self.logs_events() {
            info!("Bus event {}", bus_event);
        }
        let descriptor = bus_event.descriptor().clone();
        self.bus_events.notify(&descriptor, Phase::PreCommit);
        if self.stopped() {
            return;
        }

        let registered: Vec<Arc<Object>> = bus_event
            .register_list()
            .iter()
            .filter(|object| self.register_object(object))
            .cloned()
            .collect();
        for object in &registered {
            self.registry_add(object, Some(&descriptor));
        }
        if self.stopped() {
            return;
        }

        let targets: Vec<Option<Arc<Object>>> =
            bus_event.events().iter().map(|event| event.object()).collect();
        for (event, object) in bus_event.events().iter().zip(&targets) {
            if let Some(object) = object {
                self.notify_event(object, event, Some(&descriptor), Phase::PreCommit);
            }
        }
        if self.stopped() {
            return;
        }
        for event in bus_event.events_mut() {
            if self.logs_events() {
                info!("Event {}", event);
            }
            event.commit();
        }
        for (event, object) in bus_event.events().iter().zip(&targets) {
            if let Some(object) = object {
                self.notify_event(object, event, Some(&descriptor), Phase::PostCommit);
            }
        }

        for object in bus_event.unregister_list() {
            self.registry_remove(object, Some(&descriptor));
        }
        for object in bus_event.unregister_list() {
            if self.stopped() {
                return;
            }
            self.unregister_object(object);
        }

        self.bus_events.notify(&descriptor, Phase::PostCommit);
    }

    fn register_object(&self, object: &Arc<Object>) -> bool {
        if self.stopped() {
            return false;
        }
        if self.logs_objects() {
            info!("Adding object {}", object);
        }
        match self.bus.write().register(object.clone()) {
            Ok(()) => true,
            Err(err) => {
                error!("Object {} not added: {}", object, err);
                false
            }
        }
    }

    /// Aborts the calls still pending on `object`, then drops it from the
    /// handle table
    fn unregister_object(&self, object: &Arc<Object>) {
        if self.stopped() {
            return;
        }
        if self.logs_objects() {
            info!("Removing object {}", object);
        }
        let calls = self.pending.lock().take_for(object);
        self.abort_calls(object, calls);

        // calls made while the callbacks ran are taken under the bus lock
        let late = {
            let mut bus = self.bus.write();
            let late = self.pending.lock().take_for(object);
            if let Err(err) = bus.unregister(object) {
                error!("Object {} not removed: {}", object, err);
            }
            late
        };
        self.abort_calls(object, late);
    }

    fn abort_calls(&self, object: &Arc<Object>, calls: Vec<MethodCall>) {
        for mut call in calls {
            warn!("Call {} aborted: object {} removed", call.handle(), object);
            call.complete(AckKind::Aborted);
        }
    }

    fn registry_add(&self, object: &Arc<Object>, bus_event: Option<&Arc<BusEventDescriptor>>) {
        let registry = self.registries.read().get(&object.uid()).cloned();
        if let Some(registry) = registry {
            registry.add(object, bus_event);
        }
    }

    fn registry_remove(&self, object: &Arc<Object>, bus_event: Option<&Arc<BusEventDescriptor>>) {
        let registry = self.registries.read().get(&object.uid()).cloned();
        if let Some(registry) = registry {
            registry.remove(object, bus_event);
        }
    }

    fn notify_event(
        &self,
        object: &Arc<Object>,
        event: &ObjectEvent,
        bus_event: Option<&Arc<BusEventDescriptor>>,
        phase: Phase,
    ) {
        let notifier = self.object_events.read().get(&object.uid()).cloned();
        if let Some(notifier) = notifier {
            notifier.notify(object, event, bus_event, phase);
        }
    }

    // Queries

    pub fn get_object(&self, handle: u16) -> Option<Arc<Object>> {
        self.bus.read().find(handle).cloned()
    }

    pub fn objects(&self) -> Vec<Arc<Object>> {
        self.bus.read().objects()
    }

    pub fn objects_of(&self, descriptor: &ObjectDescriptor) -> Vec<Arc<Object>> {
        self.bus.read().objects_of(descriptor)
    }

    pub fn pending_calls(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn dump(&self, writer: &mut dyn io::Write) -> io::Result<()> {
        writeln!(writer, "Bus: {}", self.state())?;
        for object in self.objects() {
            writeln!(writer, "{}", object)?;
        }
        Ok(())
    }

    // Listeners

    fn check_in_bus(&self, descriptor: &Arc<ObjectDescriptor>) -> Result<(), ClientError> {
        match self.descriptor.object_by_uid(descriptor.uid()) {
            Some(known) if Arc::ptr_eq(known, descriptor) => Ok(()),
            _ => Err(ClientError::ObjectNotInBus {
                name: descriptor.name().to_string(),
                bus: self.descriptor.name().to_string(),
            }),
        }
    }

    pub fn add_registry(&self, registry: Arc<dyn ClassRegistry>) -> Result<(), ClientError> {
        let descriptor = registry.descriptor().clone();
        self.check_in_bus(&descriptor)?;
        let mut registries = self.registries.write();
        if registries.contains_key(&descriptor.uid()) {
            return Err(ClientError::DuplicateRegistry {
                name: descriptor.name().to_string(),
            });
        }
        registries.insert(descriptor.uid(), registry);
        Ok(())
    }

    pub fn add_object_events(&self, notifier: Arc<ObjectEventNotifier>) -> Result<(), ClientError> {
        let descriptor = notifier.descriptor().clone();
        self.check_in_bus(&descriptor)?;
        let mut notifiers = self.object_events.write();
        if notifiers.contains_key(&descriptor.uid()) {
            return Err(ClientError::DuplicateNotifier {
                name: descriptor.name().to_string(),
            });
        }
        notifiers.insert(descriptor.uid(), notifier);
        Ok(())
    }
}

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use parking_lot::Mutex;

use obus_shared::{FrameDecoder, ObusAddress};

use crate::{connection::DispatchMessage, error::ClientError};

use super::{Connector, Socket};

pub(crate) enum TxMessage {
    Packet(Vec<u8>),
    Stop,
}

type SocketSlot = Arc<Mutex<Option<Arc<dyn Socket>>>>;

/// Socket reader and writer threads of a started client.
///
/// The reader connects, feeds the frame decoder and reconnects after a
/// delay until stopped. The writer drains the outbox into the current
/// socket.
pub(crate) struct Transport {
    running: Arc<AtomicBool>,
    socket: SocketSlot,
    outbox: Sender<TxMessage>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

struct ReaderContext {
    address: ObusAddress,
    connector: Arc<dyn Connector>,
    running: Arc<AtomicBool>,
    socket: SocketSlot,
    dispatch: Sender<DispatchMessage>,
    reconnect_delay: Duration,
    read_buffer_size: usize,
}

impl Transport {
    pub fn start(
        address: ObusAddress,
        connector: Arc<dyn Connector>,
        reconnect_delay: Duration,
        read_buffer_size: usize,
        dispatch: Sender<DispatchMessage>,
    ) -> Result<Self, ClientError> {
        let running = Arc::new(AtomicBool::new(true));
        let socket: SocketSlot = Arc::new(Mutex::new(None));
        let (outbox, outbox_rx) = mpsc::channel();

        let writer_socket = socket.clone();
        let writer = thread::Builder::new()
            .name("obus-writer".to_string())
            .spawn(move || write_loop(outbox_rx, writer_socket))
            .map_err(|err| ClientError::ThreadSpawn {
                thread: "writer",
                reason: err.to_string(),
            })?;

        let context = ReaderContext {
            address,
            connector,
            running: running.clone(),
            socket: socket.clone(),
            dispatch,
            reconnect_delay,
            read_buffer_size: read_buffer_size.max(1),
        };
        let reader = thread::Builder::new()
            .name("obus-reader".to_string())
            .spawn(move || read_loop(context));
        let reader = match reader {
            Ok(reader) => reader,
            Err(err) => {
                let _ = outbox.send(TxMessage::Stop);
                let _ = writer.join();
                return Err(ClientError::ThreadSpawn {
                    thread: "reader",
                    reason: err.to_string(),
                });
            }
        };

        Ok(Self {
            running,
            socket,
            outbox,
            reader: Some(reader),
            writer: Some(writer),
        })
    }

    pub fn outbox(&self) -> Sender<TxMessage> {
        self.outbox.clone()
    }

    /// Stops both threads and waits for them
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(socket) = self.socket.lock().take() {
            let _ = socket.shutdown();
        }
        let _ = self.outbox.send(TxMessage::Stop);

        if let Some(reader) = self.reader.take() {
            reader.thread().unpark();
            if reader.join().is_err() {
                warn!("Reader thread panicked");
            }
        }
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                warn!("Writer thread panicked");
            }
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if self.reader.is_some() || self.writer.is_some() {
            self.stop();
        }
    }
}

fn read_loop(context: ReaderContext) {
    while context.running.load(Ordering::SeqCst) {
        match context.connector.connect(&context.address) {
            Ok(socket) => {
                *context.socket.lock() = Some(socket.clone());
                if !context.running.load(Ordering::SeqCst) {
                    let _ = socket.shutdown();
                    break;
                }
                info!("Connected to {}", context.address);
                if context.dispatch.send(DispatchMessage::Connected).is_err() {
                    break;
                }

                read_socket(&context, socket.as_ref());

                context.socket.lock().take();
                let _ = socket.shutdown();
                info!("Disconnected from {}", context.address);
                if context.dispatch.send(DispatchMessage::Disconnected).is_err() {
                    break;
                }
            }
            Err(err) => {
                if context.running.load(Ordering::SeqCst) {
                    debug!("Failed to connect to {}: {}", context.address, err);
                }
            }
        }

        let deadline = Instant::now() + context.reconnect_delay;
        while context.running.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::park_timeout(deadline - now);
        }
    }
}

fn read_socket(context: &ReaderContext, socket: &dyn Socket) {
    let mut decoder = FrameDecoder::new();
    loop {
        let mut buffer = vec![0; context.read_buffer_size];
        match socket.read(&mut buffer) {
            Ok(0) => return,
            Ok(count) => {
                for packet in decoder.decode(&buffer[..count]) {
                    if context.dispatch.send(DispatchMessage::Packet(packet)).is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                if context.running.load(Ordering::SeqCst) {
                    warn!("Socket read failed: {}", err);
                }
                return;
            }
        }
    }
}

fn write_loop(outbox: Receiver<TxMessage>, socket: SocketSlot) {
    while let Ok(message) = outbox.recv() {
        let bytes = match message {
            TxMessage::Packet(bytes) => bytes,
            TxMessage::Stop => return,
        };
        let current = socket.lock().clone();
        match current {
            Some(socket) => {
                if let Err(err) = socket.write_all(&bytes) {
                    warn!("Tx packet lost: {}", err);
                    let _ = socket.shutdown();
                }
            }
            None => warn!("Tx packet lost: not connected"),
        }
    }
}

use obus_shared::RawPacket;

pub mod connection;
pub mod pending_calls;
pub mod state;

/// Input of the dispatcher, posted by the reader thread and by `stop`
pub(crate) enum DispatchMessage {
    Connected,
    Disconnected,
    Packet(RawPacket),
    Stop,
}

use std::{io, sync::Arc};

use obus_shared::ObusAddress;

mod stream;
mod transport;

pub use stream::SystemConnector;
pub(crate) use transport::{Transport, TxMessage};

/// A connected byte stream. All methods take `&self` so the reader and the
/// writer can share one socket, and `shutdown` can unblock a pending `read`.
pub trait Socket: Send + Sync {
    /// Reads some bytes; `Ok(0)` means the peer closed the stream
    fn read(&self, buffer: &mut [u8]) -> io::Result<usize>;
    fn write_all(&self, bytes: &[u8]) -> io::Result<()>;
    fn shutdown(&self) -> io::Result<()>;
}

/// Opens sockets to a bus address
pub trait Connector: Send + Sync {
    fn connect(&self, address: &ObusAddress) -> io::Result<Arc<dyn Socket>>;
}

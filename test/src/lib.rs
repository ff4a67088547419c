pub mod helpers;

pub use helpers::*;
pub use local_socket::{LocalConnector, LocalPeer, LocalSocket, LocalSocketPair};

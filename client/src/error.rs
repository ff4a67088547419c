use thiserror::Error;

use obus_shared::{AddressError, BusError};

use crate::connection::state::ConnectionState;

/// Errors surfaced to the application by the client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// `start` was called on a client that is not idle
    #[error("Client already started (state {state})")]
    AlreadyStarted { state: ConnectionState },

    /// The operation needs a started client
    #[error("Client is not started")]
    NotStarted,

    /// The bus address could not be parsed
    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    /// A bus entity was misused
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// The object of a call is no longer mirrored by this client
    #[error("Object uid={uid} handle={handle} is not registered on the bus")]
    ObjectNotRegistered { uid: u16, handle: u16 },

    /// The object class is not part of this client's bus
    #[error("Object '{name}' is not part of bus '{bus}'")]
    ObjectNotInBus { name: String, bus: String },

    /// A registry is already attached for this object class
    #[error("A registry is already attached for object '{name}'")]
    DuplicateRegistry { name: String },

    /// An event notifier is already attached for this object class
    #[error("An event notifier is already attached for object '{name}'")]
    DuplicateNotifier { name: String },

    /// A client thread could not be spawned
    #[error("Failed to spawn {thread} thread: {reason}")]
    ThreadSpawn { thread: &'static str, reason: String },
}

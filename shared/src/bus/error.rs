use thiserror::Error;

/// Errors that can occur while maintaining the handle table of a bus
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Handle 0 is reserved and cannot identify an object
    #[error("Object uid={uid} has the invalid handle 0")]
    InvalidHandle { uid: u16 },

    /// Another object is already registered with this handle
    #[error("Object uid={uid} handle={handle} already registered")]
    HandleInUse { uid: u16, handle: u16 },

    /// No such object is registered with this handle
    #[error("Object uid={uid} handle={handle} not registered")]
    NotRegistered { uid: u16, handle: u16 },

    /// The method does not belong to the object's class
    #[error("Method '{method}' is not a method of object '{object}'")]
    MethodNotInObject { method: String, object: String },

    /// The struct was built on a descriptor other than the expected one
    #[error("Struct descriptor does not match '{owner}'")]
    StructMismatch { owner: String },
}

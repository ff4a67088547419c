use thiserror::Error;

/// Errors that can occur while building descriptors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// Two fields of the same struct share a uid
    #[error("Field '{name}' uses uid {uid} which is already taken in this struct")]
    DuplicateFieldUid { name: String, uid: u16 },

    /// Two events of the same object share a uid
    #[error("Event '{name}' uses uid {uid} which is already taken in object '{object}'")]
    DuplicateEventUid {
        object: String,
        name: String,
        uid: u16,
    },

    /// Two methods of the same object share a uid
    #[error("Method '{name}' uses uid {uid} which is already taken in object '{object}'")]
    DuplicateMethodUid {
        object: String,
        name: String,
        uid: u16,
    },

    /// Two objects of the same bus share a uid
    #[error("Object '{name}' uses uid {uid} which is already taken in bus '{bus}'")]
    DuplicateObjectUid { bus: String, name: String, uid: u16 },

    /// Two bus events of the same bus share a uid
    #[error("Bus event '{name}' uses uid {uid} which is already taken in bus '{bus}'")]
    DuplicateBusEventUid { bus: String, name: String, uid: u16 },

    /// A bus event tried to use a uid synthesised by the client
    #[error("Bus event '{name}' uses reserved uid {uid}")]
    ReservedBusEventUid { name: String, uid: u16 },

    /// An event update set names a field the object does not declare
    #[error("Event '{event}' updates field uid {uid} which object '{object}' does not declare")]
    UnknownUpdateField {
        object: String,
        event: String,
        uid: u16,
    },
}

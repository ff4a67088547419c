use thiserror::Error;

use obus_serde::BufferError;

/// Errors that can occur while decoding a frame payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The payload ended early or contained an unreadable string
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// A field type byte outside of the known type families
    #[error("Field uid={uid} has invalid type byte 0x{type_byte:02x}")]
    InvalidFieldType { uid: u16, type_byte: u8 },

    /// An enum value unknown to the field's driver
    #[error("Field '{field}' has invalid enum value {value}")]
    InvalidEnumValue { field: String, value: i32 },

    /// No object class with this uid in the bus descriptor
    #[error("Unknown object uid={uid}")]
    UnknownObject { uid: u16 },

    /// No event with this uid in the object's descriptor
    #[error("Unknown event uid={uid} for object uid={object_uid}")]
    UnknownEvent { object_uid: u16, uid: u16 },

    /// No method with this uid in the object's descriptor
    #[error("Unknown method uid={uid} for object uid={object_uid}")]
    UnknownMethod { object_uid: u16, uid: u16 },

    /// No bus event with this uid in the bus descriptor
    #[error("Unknown bus event uid={uid}")]
    UnknownBusEvent { uid: u16 },

    /// The handle does not designate a registered object
    #[error("Object uid={uid} handle={handle} not registered")]
    ObjectNotRegistered { uid: u16, handle: u16 },

    /// The handle designates an object of another class
    #[error("Object handle={handle} has uid={registered_uid}, expected uid={uid}")]
    ObjectUidMismatch {
        uid: u16,
        handle: u16,
        registered_uid: u16,
    },

    /// Acknowledgement code outside 0..=6
    #[error("Invalid call ack: {code}")]
    InvalidAckCode { code: u8 },

    /// Connection response status other than accepted or refused
    #[error("Invalid connection response: {status}")]
    InvalidConnectionStatus { status: u8 },

    /// Packet type byte outside 0..=7
    #[error("Invalid packet type: {packet_type}")]
    InvalidPacketType { packet_type: u8 },

    /// Connection request for a protocol other than ours
    #[error("Unsupported protocol version {version}")]
    UnsupportedProtocolVersion { version: u8 },

    /// Header announcing a size smaller than the header itself
    #[error("Bad packet size: {size}")]
    InvalidPacketSize { size: u32 },
}

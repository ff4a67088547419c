//! # Obus Shared
//! Descriptor model, bus entities and wire codec shared between the obus
//! client and any peer speaking the protocol.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use obus_serde::{Buffer, BufferError, ALLOC_STEP, STRING_MAX_SIZE};

mod bus;
mod connection;
mod descriptor;
mod structure;
mod transport;

pub use bus::{
    bus_event::BusEvent,
    call::{AckCallback, AckKind, MethodCall},
    error::BusError,
    event::ObjectEvent,
    object::Object,
    table::Bus,
};
pub use connection::{
    decoder::{FrameDecoder, RawPacket},
    error::DecodeError,
    packet::{encode_frame, ConnectionRequest, ConnectionStatus, Packet},
    packet_type::{PacketType, HEADER_SIZE, MAGIC, PROTOCOL_VERSION},
};
pub use descriptor::{
    bus::{
        BusDescriptor, BusDescriptorBuilder, BusEventDescriptor, BUS_EVENT_CONNECTED,
        BUS_EVENT_CONNECTION_REFUSED, BUS_EVENT_DISCONNECTED,
    },
    enum_driver::{EnumDriver, MethodState, WireEnum},
    error::DescriptorError,
    field::{FieldDescriptor, FieldKind, FieldRole, FieldType, FIELD_ARRAY, FIELD_MASK},
    object::{
        EventDescriptor, MethodDescriptor, ObjectDescriptor, ObjectDescriptorBuilder,
        METHOD_STATE_PREFIX,
    },
    structure::StructDescriptor,
};
pub use structure::{
    error::StructError,
    obus_struct::Struct,
    value::{EnumValue, FieldValue, Scalar, Value},
};
pub use transport::{address::ObusAddress, error::AddressError};

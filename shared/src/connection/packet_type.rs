use std::fmt;

use super::error::DecodeError;

/// Magic bytes opening every frame
pub const MAGIC: [u8; 4] = *b"obus";
/// magic | u32 total size | u8 packet type
pub const HEADER_SIZE: usize = 9;
pub const PROTOCOL_VERSION: u8 = 2;

// An enum representing the different kinds of frame exchanged with a bus
// server
#[derive(Copy, Debug, Clone, Eq, PartialEq, Hash)]
pub enum PacketType {
    // Sent by the client once its socket is connected
    ConnectionRequest = 0,
    // Accepts or refuses the client, with the initial object set
    ConnectionResponse = 1,
    // A single object added on the bus
    Add = 2,
    // A single object removed from the bus
    Remove = 3,
    // A composite bus event
    BusEvent = 4,
    // A single object event
    Event = 5,
    // A method call, sent by the client
    Call = 6,
    // Acknowledgement of a method call
    Ack = 7,
}

impl PacketType {
    pub fn from_u8(value: u8) -> Result<Self, DecodeError> {
        Ok(match value {
            0 => Self::ConnectionRequest,
            1 => Self::ConnectionResponse,
            2 => Self::Add,
            3 => Self::Remove,
            4 => Self::BusEvent,
            5 => Self::Event,
            6 => Self::Call,
            7 => Self::Ack,
            packet_type => return Err(DecodeError::InvalidPacketType { packet_type }),
        })
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ConnectionRequest => "CONREQ",
            Self::ConnectionResponse => "CONRESP",
            Self::Add => "ADD",
            Self::Remove => "REMOVE",
            Self::BusEvent => "BUS_EVENT",
            Self::Event => "EVENT",
            Self::Call => "CALL",
            Self::Ack => "ACK",
        };
        f.write_str(name)
    }
}

use std::{fmt, sync::Arc};

use log::warn;

use obus_serde::Buffer;

use crate::bus::{
    bus_event::BusEvent,
    call::{AckKind, MethodCall},
    event::ObjectEvent,
    object::Object,
    table::Bus,
};

use super::{
    decoder::RawPacket,
    error::DecodeError,
    packet_type::{PacketType, MAGIC, PROTOCOL_VERSION},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Accepted = 0,
    Refused = 1,
}

impl ConnectionStatus {
    pub fn from_u8(status: u8) -> Result<Self, DecodeError> {
        match status {
            0 => Ok(Self::Accepted),
            1 => Ok(Self::Refused),
            status => Err(DecodeError::InvalidConnectionStatus { status }),
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => f.write_str("ACCEPTED"),
            Self::Refused => f.write_str("REFUSED"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub version: u8,
    pub bus_name: String,
    pub crc: u32,
    pub client_name: String,
}

impl ConnectionRequest {
    pub fn new(bus_name: impl Into<String>, crc: u32, client_name: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            bus_name: bus_name.into(),
            crc,
            client_name: client_name.into(),
        }
    }
}

/// A frame of any kind, with its payload decoded
#[derive(Debug)]
pub enum Packet {
    ConnectionRequest(ConnectionRequest),
    ConnectionResponse {
        status: ConnectionStatus,
        objects: Vec<Arc<Object>>,
    },
    Add(Arc<Object>),
    Remove(Arc<Object>),
    BusEvent(BusEvent),
    Event(ObjectEvent),
    Call(MethodCall),
    Ack {
        handle: u16,
        ack: AckKind,
    },
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::ConnectionRequest(_) => PacketType::ConnectionRequest,
            Self::ConnectionResponse { .. } => PacketType::ConnectionResponse,
            Self::Add(_) => PacketType::Add,
            Self::Remove(_) => PacketType::Remove,
            Self::BusEvent(_) => PacketType::BusEvent,
            Self::Event(_) => PacketType::Event,
            Self::Call(_) => PacketType::Call,
            Self::Ack { .. } => PacketType::Ack,
        }
    }

    /// Encodes the whole frame, header included
    pub fn encode(&self) -> Vec<u8> {
        encode_frame(self.packet_type(), |buffer| match self {
            Self::ConnectionRequest(request) => {
                buffer.write_u8(request.version);
                buffer.write_string(Some(&request.bus_name));
                buffer.write_u32(request.crc);
                buffer.write_string(Some(&request.client_name));
            }
            Self::ConnectionResponse { status, objects } => {
                buffer.write_u8(*status as u8);
                buffer.write_u32(objects.len() as u32);
                for object in objects {
                    object.encode(buffer);
                }
            }
            Self::Add(object) => object.encode(buffer),
            Self::Remove(object) => {
                buffer.write_u16(object.uid());
                buffer.write_u16(object.handle());
            }
            Self::BusEvent(bus_event) => bus_event.encode(buffer),
            Self::Event(event) => event.encode(buffer),
            Self::Call(call) => call.encode(buffer),
            Self::Ack { handle, ack } => {
                buffer.write_u16(*handle);
                buffer.write_u8(ack.to_u8());
            }
        })
    }

    /// Decodes the payload of a frame against the current state of `bus`.
    ///
    /// Returns `Ok(None)` when the single sub-object the frame carries was
    /// skipped.
    pub fn decode(raw: &RawPacket, bus: &Bus) -> Result<Option<Self>, DecodeError> {
        let mut buffer = Buffer::from_bytes(raw.payload());
        let packet = match raw.packet_type() {
            PacketType::ConnectionRequest => {
                let version = buffer.read_u8()?;
                if version != PROTOCOL_VERSION {
                    return Err(DecodeError::UnsupportedProtocolVersion { version });
                }
                let bus_name = buffer.read_string()?.unwrap_or_default();
                let crc = buffer.read_u32()?;
                let client_name = buffer.read_string()?.unwrap_or_default();
                Some(Self::ConnectionRequest(ConnectionRequest {
                    version,
                    bus_name,
                    crc,
                    client_name,
                }))
            }
            PacketType::ConnectionResponse => {
                let status = ConnectionStatus::from_u8(buffer.read_u8()?)?;
                let count = buffer.read_u32()?;
                let mut objects = Vec::new();
                for _ in 0..count {
                    if let Some(object) = Object::decode(bus.descriptor(), &mut buffer)? {
                        objects.push(Arc::new(object));
                    }
                }
                Some(Self::ConnectionResponse { status, objects })
            }
            PacketType::Add => Object::decode(bus.descriptor(), &mut buffer)?.map(|object| Self::Add(Arc::new(object))),
            PacketType::Remove => {
                let uid = buffer.read_u16()?;
                let handle = buffer.read_u16()?;
                Some(Self::Remove(bus.resolve(uid, handle)?.clone()))
            }
            PacketType::BusEvent => Some(Self::BusEvent(BusEvent::decode(bus, &mut buffer)?)),
            PacketType::Event => ObjectEvent::decode(bus, &mut buffer)?.map(Self::Event),
            PacketType::Call => MethodCall::decode(bus, &mut buffer)?.map(Self::Call),
            PacketType::Ack => {
                let handle = buffer.read_u16()?;
                let code = buffer.read_u8()?;
                let ack = AckKind::from_u8(code).ok_or(DecodeError::InvalidAckCode { code })?;
                Some(Self::Ack { handle, ack })
            }
        };

        if buffer.has_remaining() {
            warn!(
                "Packet {}: {} bytes left after decode",
                raw.packet_type(),
                buffer.remaining()
            );
        }
        Ok(packet)
    }
}

/// Builds a frame: header, then the payload written by `payload`
pub fn encode_frame(packet_type: PacketType, payload: impl FnOnce(&mut Buffer)) -> Vec<u8> {
    let mut buffer = Buffer::new();
    buffer.write_bytes(&MAGIC);
    buffer.write_u32(0);
    buffer.write_u8(packet_type.to_u8());
    payload(&mut buffer);
    buffer.finish();

    let mut bytes = buffer.into_bytes();
    let size = bytes.len() as u32;
    bytes[4..8].copy_from_slice(&size.to_be_bytes());
    bytes
}

use log::{debug, warn};

use super::{
    error::DecodeError,
    packet_type::{PacketType, HEADER_SIZE, MAGIC},
};

/// A complete frame whose payload is not decoded yet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawPacket {
    packet_type: PacketType,
    payload: Vec<u8>,
}

impl RawPacket {
    pub fn new(packet_type: PacketType, payload: Vec<u8>) -> Self {
        Self {
            packet_type,
            payload,
        }
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Magic(usize),
    Header,
    Payload,
}

/// Splits a byte stream into frames, resynchronising on the magic.
///
/// The decoder can be fed arbitrary chunks; a frame may be split at any byte.
pub struct FrameDecoder {
    state: State,
    header: [u8; HEADER_SIZE],
    header_len: usize,
    packet_type: PacketType,
    payload: Vec<u8>,
    payload_size: usize,
    bad_magic: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            header: [0; HEADER_SIZE],
            header_len: 0,
            packet_type: PacketType::ConnectionRequest,
            payload: Vec::new(),
            payload_size: 0,
            bad_magic: 0,
        }
    }

    /// Number of bytes rejected while looking for the magic
    pub fn bad_magic_count(&self) -> u64 {
        self.bad_magic
    }

    /// Drops any partial frame, e.g. after the connection was lost
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.header_len = 0;
        self.payload = Vec::new();
        self.payload_size = 0;
    }

    /// Feeds a chunk and returns the frames it completed
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<RawPacket> {
        let mut packets = Vec::new();
        self.decode_with(bytes, |packet| packets.push(packet));
        packets
    }

    pub fn decode_with(&mut self, mut bytes: &[u8], mut sink: impl FnMut(RawPacket)) {
        while !bytes.is_empty() {
            match self.state {
                State::Idle | State::Magic(0) => {
                    self.reset();
                    self.state = State::Magic(0);
                    self.check_magic(0, bytes[0]);
                    bytes = &bytes[1..];
                }
                State::Magic(index) => {
                    self.check_magic(index, bytes[0]);
                    bytes = &bytes[1..];
                }
                State::Header => {
                    let count = (HEADER_SIZE - self.header_len).min(bytes.len());
                    self.header[self.header_len..self.header_len + count].copy_from_slice(&bytes[..count]);
                    self.header_len += count;
                    bytes = &bytes[count..];
                    if self.header_len == HEADER_SIZE {
                        match self.decode_header() {
                            Ok(()) => {
                                if self.payload_size == 0 {
                                    sink(self.take_packet());
                                }
                            }
                            Err(err) => {
                                warn!("Frame decoder: {}", err);
                                self.state = State::Magic(0);
                            }
                        }
                    }
                }
                State::Payload => {
                    let count = (self.payload_size - self.payload.len()).min(bytes.len());
                    self.payload.extend_from_slice(&bytes[..count]);
                    bytes = &bytes[count..];
                    if self.payload.len() == self.payload_size {
                        sink(self.take_packet());
                    }
                }
            }
        }
    }

    fn check_magic(&mut self, index: usize, byte: u8) {
        if byte != MAGIC[index] {
            self.bad_magic += 1;
            warn!("Bad magic {}: 0x{:02x} (0x{:02x})", index, byte, MAGIC[index]);
            // the mismatching byte may itself start the next magic
            if index > 0 && byte == MAGIC[0] {
                self.header[0] = byte;
                self.header_len = 1;
                self.state = State::Magic(1);
            } else {
                self.state = State::Magic(0);
            }
            return;
        }
        self.header[index] = byte;
        self.header_len = index + 1;
        self.state = if index + 1 == MAGIC.len() {
            State::Header
        } else {
            State::Magic(index + 1)
        };
    }

    fn decode_header(&mut self) -> Result<(), DecodeError> {
        let size = u32::from_be_bytes([self.header[4], self.header[5], self.header[6], self.header[7]]);
        if (size as usize) < HEADER_SIZE {
            return Err(DecodeError::InvalidPacketSize { size });
        }
        self.packet_type = PacketType::from_u8(self.header[8])?;
        self.payload_size = size as usize - HEADER_SIZE;
        self.payload = Vec::with_capacity(self.payload_size);
        self.state = State::Payload;
        debug!("Frame header: type={} size={}", self.packet_type, size);
        Ok(())
    }

    fn take_packet(&mut self) -> RawPacket {
        self.state = State::Idle;
        self.header_len = 0;
        RawPacket::new(self.packet_type, std::mem::take(&mut self.payload))
    }
}

use log::{error, warn};

use obus_serde::Buffer;

use crate::connection::error::DecodeError;

pub mod bus_event;
pub mod call;
pub mod error;
pub mod event;
pub mod object;
pub mod table;

/// Decodes a sub-object preceded by its u32 byte size.
///
/// The size is authoritative: the position always ends right after the
/// sub-object. A failure inside it is logged and yields `None`, failing to
/// skip past it is an error for the whole frame.
pub(crate) fn decode_sized<T>(
    buffer: &mut Buffer,
    what: &str,
    decode: impl FnOnce(&mut Buffer) -> Result<T, DecodeError>,
) -> Result<Option<T>, DecodeError> {
    let size = buffer.read_u32()? as usize;
    let start = buffer.position();
    let result = decode(buffer);
    let end = start + size;
    match result {
        Ok(value) => {
            if buffer.position() != end {
                warn!(
                    "{}: decoded {} bytes but {} were announced",
                    what,
                    buffer.position().saturating_sub(start),
                    size
                );
                buffer.set_position(end)?;
            }
            Ok(Some(value))
        }
        Err(err) => {
            error!("{}: {}", what, err);
            buffer.set_position(end)?;
            Ok(None)
        }
    }
}

use thiserror::Error;

/// Errors that can occur while reading from a [`Buffer`](crate::Buffer)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Tried to read or skip past the end of the readable data
    #[error("Buffer underflow: needed {needed} bytes but only {remaining} remain")]
    Underflow { needed: usize, remaining: usize },

    /// A string length prefix was above the protocol limit
    #[error("String size too big: {size}")]
    StringTooLarge { size: u32 },

    /// A string payload could not be decoded as UTF-8
    #[error("String of {size} bytes is not valid UTF-8")]
    StringDecodeFailure { size: u32 },

    /// Tried to move the position outside of the readable data
    #[error("Position {position} is out of bounds (limit {limit})")]
    PositionOutOfBounds { position: usize, limit: usize },
}

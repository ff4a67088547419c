//! # Obus Serde
//! Big-endian byte buffer used to read and write obus frames.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod buffer;
mod error;

pub use buffer::{Buffer, ALLOC_STEP, STRING_MAX_SIZE};
pub use error::BufferError;

use crate::BufferError;

/// Growth step of a write buffer, used unless a single write needs more
pub const ALLOC_STEP: usize = 1024;

/// Strings with a length prefix at or above this value are rejected on read
pub const STRING_MAX_SIZE: u32 = 65536;

macro_rules! impl_number {
    ($write:ident, $read:ident, $t:ty) => {
        pub fn $write(&mut self, value: $t) {
            self.put(&value.to_be_bytes());
        }

        pub fn $read(&mut self) -> Result<$t, BufferError> {
            Ok(<$t>::from_be_bytes(self.take_array()?))
        }
    };
}

/// A big-endian byte buffer with a single position used for both reading and
/// writing.
///
/// Writes grow the buffer transparently. Reads are bounded by the limit, which
/// is the end of the data for a buffer built with [`Buffer::from_bytes`] and
/// the end of the written data once [`Buffer::finish`] has been called.
#[derive(Clone, Debug)]
pub struct Buffer {
    data: Vec<u8>,
    position: usize,
    limit: usize,
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buffer {
    pub fn new() -> Self {
        Self::with_capacity(ALLOC_STEP)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            position: 0,
            limit: capacity,
        }
    }

    /// Wraps received bytes for reading
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let data = bytes.into();
        let limit = data.len();
        Self {
            data,
            position: 0,
            limit,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) -> Result<(), BufferError> {
        if position > self.limit {
            return Err(BufferError::PositionOutOfBounds {
                position,
                limit: self.limit,
            });
        }
        self.position = position;
        Ok(())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.limit
    }

    /// Seals the written data: the limit becomes the current position.
    /// Returns the number of bytes written.
    pub fn finish(&mut self) -> usize {
        self.limit = self.position;
        self.position
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }

    pub fn skip(&mut self, count: usize) -> Result<(), BufferError> {
        self.take(count).map(|_| ())
    }

    /// The bytes between the start of the buffer and its limit
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.limit]
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.data.truncate(self.limit);
        self.data
    }

    // Size markers

    /// Writes a placeholder u32 and returns its position
    pub fn prepare_size_marker(&mut self) -> usize {
        let marker = self.position;
        self.write_u32(0);
        marker
    }

    /// Patches the placeholder at `marker` with the number of bytes written
    /// since the placeholder
    pub fn write_size_marker(&mut self, marker: usize) {
        let size = self.position.saturating_sub(marker + 4) as u32;
        self.data[marker..marker + 4].copy_from_slice(&size.to_be_bytes());
    }

    // Write

    impl_number!(write_u8, read_u8, u8);
    impl_number!(write_i8, read_i8, i8);
    impl_number!(write_u16, read_u16, u16);
    impl_number!(write_i16, read_i16, i16);
    impl_number!(write_u32, read_u32, u32);
    impl_number!(write_i32, read_i32, i32);
    impl_number!(write_u64, read_u64, u64);
    impl_number!(write_i64, read_i64, i64);
    impl_number!(write_f32, read_f32, f32);
    impl_number!(write_f64, read_f64, f64);

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    pub fn read_bool(&mut self) -> Result<bool, BufferError> {
        Ok(self.read_u8()? != 0)
    }

    /// Writes a length-prefixed, NUL-terminated string. `None` is written as
    /// a zero length.
    pub fn write_string(&mut self, value: Option<&str>) {
        match value {
            None => self.write_u32(0),
            Some(string) => {
                let bytes = string.as_bytes();
                self.ensure(4 + bytes.len() + 1);
                self.write_u32(bytes.len() as u32 + 1);
                self.put(bytes);
                self.write_u8(0);
            }
        }
    }

    pub fn read_string(&mut self) -> Result<Option<String>, BufferError> {
        let size = self.read_u32()?;
        if size >= STRING_MAX_SIZE {
            return Err(BufferError::StringTooLarge { size });
        }
        if size == 0 {
            return Ok(None);
        }
        let bytes = self.take(size as usize)?;
        // last byte is the NUL terminator
        let content = &bytes[..bytes.len() - 1];
        match std::str::from_utf8(content) {
            Ok(string) => Ok(Some(string.to_string())),
            Err(_) => Err(BufferError::StringDecodeFailure { size }),
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.put(bytes);
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, BufferError> {
        Ok(self.take(count)?.to_vec())
    }

    // Internal

    fn ensure(&mut self, size: usize) {
        if self.remaining() < size {
            let step = size.max(ALLOC_STEP);
            let new_len = self.data.len().max(self.limit) + step;
            self.data.resize(new_len, 0);
            self.limit = new_len;
        }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.ensure(bytes.len());
        let end = self.position + bytes.len();
        self.data[self.position..end].copy_from_slice(bytes);
        self.position = end;
    }

    fn take(&mut self, count: usize) -> Result<&[u8], BufferError> {
        if self.remaining() < count {
            return Err(BufferError::Underflow {
                needed: count,
                remaining: self.remaining(),
            });
        }
        let start = self.position;
        self.position += count;
        Ok(&self.data[start..self.position])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
        let mut output = [0u8; N];
        output.copy_from_slice(self.take(N)?);
        Ok(output)
    }
}

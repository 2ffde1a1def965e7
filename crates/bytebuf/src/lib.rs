//! Fixed-capacity byte buffer with bounds-checked access.
//!
//! `ByteBuffer` is the raw storage a page is laid out in. It never grows or
//! shrinks after construction; every access is checked against the capacity
//! and out-of-range requests surface as `DbError::Buffer`.
//!
//! Integers are stored as 4-byte little-endian values.
//!
//! # Example
//!
//! ```
//! use bytebuf::ByteBuffer;
//!
//! let mut buf = ByteBuffer::new(16);
//! buf.write_i32(0, -7).unwrap();
//! buf.write_bytes(4, b"abc").unwrap();
//! buf.copy(4, 8, 3).unwrap();
//!
//! assert_eq!(buf.read_i32(0).unwrap(), -7);
//! assert_eq!(buf.read_bytes(8, 3).unwrap(), b"abc");
//! assert!(buf.read_i32(14).is_err());
//! ```


use bytes::BytesMut;
use common::{DbError, DbResult};

const INT_WIDTH: usize = size_of::<i32>();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteBuffer {
    data: BytesMut,
}

impl ByteBuffer {
    /// Create a zero-filled buffer of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: BytesMut::zeroed(capacity),
        }
    }

    /// Create a buffer holding a copy of `bytes`; its capacity is `bytes.len()`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: BytesMut::from(bytes),
        }
    }

    pub fn from_string(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }

    /// Decode the whole buffer as UTF-8.
    pub fn read_string(&self) -> DbResult<String> {
        String::from_utf8(self.data.to_vec())
            .map_err(|e| DbError::Buffer(format!("buffer is not valid utf-8: {e}")))
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data.to_vec()
    }

    pub fn read_i32(&self, offset: usize) -> DbResult<i32> {
        let range = self.checked_range(offset, INT_WIDTH)?;
        let mut raw = [0u8; INT_WIDTH];
        raw.copy_from_slice(&self.data[range]);
        Ok(i32::from_le_bytes(raw))
    }

    pub fn write_i32(&mut self, offset: usize, value: i32) -> DbResult<()> {
        let range = self.checked_range(offset, INT_WIDTH)?;
        self.data[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn read_bytes(&self, offset: usize, len: usize) -> DbResult<&[u8]> {
        let range = self.checked_range(offset, len)?;
        Ok(&self.data[range])
    }

    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> DbResult<()> {
        let range = self.checked_range(offset, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Move `len` bytes from `src` to `dst` inside the buffer.
    ///
    /// The ranges may overlap; the result is as if the source were first
    /// copied to a temporary.
    pub fn copy(&mut self, src: usize, dst: usize, len: usize) -> DbResult<()> {
        let from = self.checked_range(src, len)?;
        self.checked_range(dst, len)?;
        self.data.copy_within(from, dst);
        Ok(())
    }

    fn checked_range(&self, offset: usize, len: usize) -> DbResult<std::ops::Range<usize>> {
        let end = offset.checked_add(len).ok_or_else(|| {
            DbError::Buffer(format!("range at {offset} with length {len} overflows"))
        })?;
        if end > self.data.len() {
            return Err(DbError::Buffer(format!(
                "range {offset}..{end} out of bounds for buffer of {} bytes",
                self.data.len()
            )));
        }
        Ok(offset..end)
    }
}

impl From<&str> for ByteBuffer {
    fn from(text: &str) -> Self {
        Self::from_string(text)
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

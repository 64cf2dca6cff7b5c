//! Write buffer for encoding GDS protocol data
//!
//! Provides methods for writing XDR primitives to a byte buffer. Every
//! variable-length field is followed by zero padding up to the next 4-byte
//! boundary.

use bytes::{BufMut, BytesMut};

use crate::buffer::padding;
use crate::constants::MAX_SEGMENT_SIZE;
use crate::error::{Error, Result};

/// A buffer for writing GDS protocol data
#[derive(Debug)]
pub struct WriteBuffer {
    /// The underlying byte buffer
    data: BytesMut,
}

impl WriteBuffer {
    /// Create a new WriteBuffer with default capacity
    pub fn new() -> Self {
        Self {
            data: BytesMut::with_capacity(8192),
        }
    }

    /// Create a new WriteBuffer with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the current length of data in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Get the buffer contents as a byte slice
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Freeze the buffer into immutable Bytes
    pub fn freeze(self) -> bytes::Bytes {
        self.data.freeze()
    }

    /// Take the buffered bytes, leaving the buffer empty
    pub fn split(&mut self) -> bytes::Bytes {
        self.data.split().freeze()
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    /// Lengths travel as i32; a longer field cannot be framed
    fn write_length(&mut self, len: usize) -> Result<()> {
        let framed = i32::try_from(len).map_err(|_| Error::BufferOverflow {
            needed: len,
            available: i32::MAX as usize,
        })?;
        self.write_i32(framed)
    }

    // =========================================================================
    // Raw byte writes
    // =========================================================================

    /// Write a single byte
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.data.put_u8(value);
        Ok(())
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.data.put_slice(bytes);
        Ok(())
    }

    /// Write zeros
    pub fn write_zeros(&mut self, n: usize) -> Result<()> {
        self.data.put_bytes(0, n);
        Ok(())
    }

    /// Write `n` copies of a byte
    pub fn write_fill(&mut self, value: u8, n: usize) -> Result<()> {
        self.data.put_bytes(value, n);
        Ok(())
    }

    /// Write the zero padding that follows a field of `len` bytes
    pub fn write_padding(&mut self, len: usize) -> Result<()> {
        self.write_zeros(padding(len))
    }

    // =========================================================================
    // Fixed-width integers
    // =========================================================================

    /// Write a 16-bit unsigned integer in little-endian format
    pub fn write_u16_le(&mut self, value: u16) -> Result<()> {
        self.data.put_u16_le(value);
        Ok(())
    }

    /// Write a 32-bit signed integer in big-endian format
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.data.put_i32(value);
        Ok(())
    }

    /// Write a 64-bit signed integer in big-endian format
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.data.put_i64(value);
        Ok(())
    }

    // =========================================================================
    // Variable-length fields
    // =========================================================================

    /// Write a length-prefixed buffer followed by zero padding
    pub fn write_buffer(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_length(bytes.len())?;
        self.write_bytes(bytes)?;
        self.write_padding(bytes.len())
    }

    /// Write a string as a length-prefixed buffer of its UTF-8 bytes.
    ///
    /// Attaching rejects connection character sets other than UTF-8 ones, so
    /// these bytes always match what the server expects.
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_buffer(s.as_bytes())
    }

    /// Write a version-tagged parameter block.
    ///
    /// The length covers the version byte and the content. An absent block
    /// writes only the version byte.
    pub fn write_typed(&mut self, version: u8, content: Option<&[u8]>) -> Result<()> {
        let content = content.unwrap_or(&[]);
        let size = content.len() + 1;
        self.write_length(size)?;
        self.write_u8(version)?;
        self.write_bytes(content)?;
        self.write_padding(size)
    }

    /// Write a version-tagged set of single-byte option codes
    pub fn write_set(&mut self, version: u8, options: &[u8]) -> Result<()> {
        self.write_typed(version, Some(options))
    }

    /// Write one blob segment in batch framing.
    ///
    /// The run is announced twice as `len + 2`, then carries a 2-byte
    /// little-endian segment length, the data and padding.
    pub fn write_blob_buffer(&mut self, segment: &[u8]) -> Result<()> {
        if segment.len() > MAX_SEGMENT_SIZE {
            return Err(Error::SegmentTooLong(segment.len()));
        }
        let run = segment.len() + 2;
        self.write_length(run)?;
        self.write_length(run)?;
        self.write_u16_le(segment.len() as u16)?;
        self.write_bytes(segment)?;
        self.write_padding(run)
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<[u8]> for WriteBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

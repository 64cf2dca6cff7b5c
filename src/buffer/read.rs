//! Read buffer for information replies
//!
//! Database, statement and blob information replies arrive as one opaque
//! buffer of `(item, u16le length, value)` entries whose integers are
//! little-endian "vax" integers. XDR fields on the wire are decoded by
//! [`WireChannel`](crate::transport::WireChannel) instead.

use bytes::Bytes;

use crate::buffer::vax_integer;
use crate::error::{Error, Result};

/// A cursor over an information reply
#[derive(Debug, Clone)]
pub struct ReadBuffer {
    /// The underlying byte data
    data: Bytes,
    /// Current read position
    pos: usize,
}

impl ReadBuffer {
    /// Create a new ReadBuffer from bytes
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a new ReadBuffer from a byte slice
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
            pos: 0,
        }
    }

    /// Get the number of bytes remaining to be read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Skip `n` bytes in the buffer
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure_remaining(n)?;
        self.pos += n;
        Ok(())
    }

    #[inline]
    fn ensure_remaining(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(Error::BufferUnderflow {
                needed: n,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure_remaining(1)?;
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    /// Read `n` bytes without copying
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        self.ensure_remaining(n)?;
        let bytes = self.data.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(bytes)
    }

    /// Read a little-endian integer of `len` bytes
    pub fn read_vax(&mut self, len: usize) -> Result<i32> {
        self.ensure_remaining(len)?;
        let value = vax_integer(&self.data[self.pos..self.pos + len]);
        self.pos += len;
        Ok(value)
    }

    /// Read the 2-byte length that precedes every information item value
    pub fn read_item_length(&mut self) -> Result<usize> {
        Ok(self.read_vax(2)? as u16 as usize)
    }

    /// Read an item length followed by a little-endian integer value
    pub fn read_item_int(&mut self) -> Result<i32> {
        let len = self.read_item_length()?;
        self.read_vax(len)
    }

    /// Read an item length followed by string content
    pub fn read_item_string(&mut self) -> Result<String> {
        let len = self.read_item_length()?;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

//! XDR channel over a transport
//!
//! Outgoing fields are staged in a [`WriteBuffer`] and sent by [`WireChannel::flush`].
//! Incoming fields are read straight from the transport, so a short read
//! surfaces as a transport fault and never as a partially decoded object.

use bytes::Bytes;

use crate::buffer::{padding, WriteBuffer};
use crate::constants::Opcode;
use crate::error::{Error, Result};

use super::Transport;

/// The octet codec bound to one transport
pub struct WireChannel {
    transport: Box<dyn Transport>,
    out: WriteBuffer,
}

impl WireChannel {
    /// Wrap a connected transport
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            out: WriteBuffer::new(),
        }
    }

    /// Check if the underlying transport is connected
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Close the underlying transport, dropping any unsent bytes
    pub async fn close(&mut self) -> Result<()> {
        self.out.clear();
        self.transport.close().await
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Start a new request: discard anything unsent and write the opcode
    pub fn begin(&mut self, op: Opcode) -> Result<&mut WriteBuffer> {
        self.out.clear();
        self.out.write_i32(op.code())?;
        Ok(&mut self.out)
    }

    /// Send everything staged so far
    pub async fn flush(&mut self) -> Result<()> {
        if self.out.is_empty() {
            return Ok(());
        }
        let frame = self.out.split();
        tracing::trace!(len = frame.len(), bytes = %hex::encode(&frame), "sending frame");
        self.transport.send(&frame).await
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Read exactly `n` raw bytes
    pub async fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        if n == 0 {
            return Ok(Bytes::new());
        }
        self.transport.read_exact(n).await
    }

    /// Skip the padding that follows a field of `len` bytes
    pub async fn skip_padding(&mut self, len: usize) -> Result<()> {
        let pad = padding(len);
        if pad > 0 {
            self.transport.read_exact(pad).await?;
        }
        Ok(())
    }

    /// Read a big-endian i32
    pub async fn read_i32(&mut self) -> Result<i32> {
        let raw = self.transport.read_exact(4).await?;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&raw);
        Ok(i32::from_be_bytes(bytes))
    }

    /// Read a big-endian i64
    pub async fn read_i64(&mut self) -> Result<i64> {
        let raw = self.transport.read_exact(8).await?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&raw);
        Ok(i64::from_be_bytes(bytes))
    }

    /// Read a length-prefixed buffer and its padding
    pub async fn read_buffer(&mut self) -> Result<Bytes> {
        let len = self.read_i32().await?;
        let len = usize::try_from(len)
            .map_err(|_| Error::Protocol(format!("negative buffer length {}", len)))?;
        let data = self.read_bytes(len).await?;
        self.skip_padding(len).await?;
        Ok(data)
    }

    /// Read a length-prefixed string
    pub async fn read_string(&mut self) -> Result<String> {
        let data = self.read_buffer().await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Read the next opcode, skipping keepalive `op_dummy` messages
    pub async fn next_operation(&mut self) -> Result<i32> {
        loop {
            let op = self.read_i32().await?;
            if op == Opcode::Dummy.code() {
                tracing::trace!("op_dummy received");
                continue;
            }
            return Ok(op);
        }
    }
}

impl std::fmt::Debug for WireChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireChannel")
            .field("connected", &self.transport.is_connected())
            .field("pending", &self.out.len())
            .finish()
    }
}

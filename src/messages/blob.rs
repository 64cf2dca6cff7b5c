//! Blob open/create and segment messages

use bytes::{Bytes, BytesMut};

use crate::buffer::{vax_integer, WriteBuffer};
use crate::constants::{bpb, Opcode, MAX_SEGMENT_SIZE};
use crate::error::{Error, Result};

/// Open or create a blob, optionally with a blob parameter block
#[derive(Debug)]
pub struct BlobOpenMessage<'a> {
    create: bool,
    transaction_id: i32,
    blob_id: i64,
    parameters: Option<&'a [u8]>,
}

impl<'a> BlobOpenMessage<'a> {
    /// Open an existing blob
    pub fn open(transaction_id: i32, blob_id: i64) -> Self {
        Self {
            create: false,
            transaction_id,
            blob_id,
            parameters: None,
        }
    }

    /// Create a new blob
    pub fn create(transaction_id: i32) -> Self {
        Self {
            create: true,
            transaction_id,
            blob_id: 0,
            parameters: None,
        }
    }

    /// Send an encoded blob parameter block (without its version byte)
    pub fn with_parameters(mut self, parameters: &'a [u8]) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// The `*2` variants carry a parameter block
    pub fn opcode(&self) -> Opcode {
        match (self.create, self.parameters.is_some()) {
            (false, false) => Opcode::OpenBlob,
            (false, true) => Opcode::OpenBlob2,
            (true, false) => Opcode::CreateBlob,
            (true, true) => Opcode::CreateBlob2,
        }
    }

    /// Write the fields that follow the opcode
    pub fn write_body(&self, buf: &mut WriteBuffer) -> Result<()> {
        if let Some(parameters) = self.parameters {
            buf.write_typed(bpb::VERSION1, Some(parameters))?;
        }
        buf.write_i32(self.transaction_id)?;
        buf.write_i64(self.blob_id)?;
        Ok(())
    }
}

/// Buffer length requested by `op_get_segment` for `requested` payload bytes
pub fn segment_request_length(requested: usize) -> i32 {
    requested.saturating_add(2).min(MAX_SEGMENT_SIZE) as i32
}

/// Server status reported in the object field of a get_segment response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    /// The buffer ends on a segment boundary
    Complete,
    /// The last segment continues in the next response
    Segment,
    /// The blob is exhausted
    EofPending,
}

impl SegmentStatus {
    /// Decode the response object field
    pub fn from_object(object: i32) -> Self {
        match object {
            1 => SegmentStatus::Segment,
            2 => SegmentStatus::EofPending,
            _ => SegmentStatus::Complete,
        }
    }
}

/// Join the `(u16le length, data)` runs of a get_segment response.
///
/// A run whose declared length passes the end of the buffer is rejected.
pub fn unpack_segments(data: &[u8]) -> Result<Bytes> {
    let mut out = BytesMut::with_capacity(data.len());
    let mut pos = 0;
    while pos < data.len() {
        if pos + 2 > data.len() {
            return Err(Error::Protocol(format!(
                "segment length prefix at offset {} passes the end of a {} byte buffer",
                pos,
                data.len()
            )));
        }
        let len = vax_integer(&data[pos..pos + 2]) as usize;
        pos += 2;
        if pos + len > data.len() {
            return Err(Error::Protocol(format!(
                "segment of {} bytes at offset {} passes the end of a {} byte buffer",
                len,
                pos,
                data.len()
            )));
        }
        out.extend_from_slice(&data[pos..pos + len]);
        pos += len;
    }
    Ok(out.freeze())
}

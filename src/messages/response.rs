//! Generic response and status vector decoding
//!
//! Almost every request is answered by `op_response`: an object id, a blob
//! id, a data buffer and a status vector. A status vector whose head is a
//! warning does not fail the call; it is handed back on the [`Response`] so
//! the attachment can record it.

use bytes::Bytes;

use crate::constants::{status_arg, Opcode};
use crate::error::{Error, GdsError, Result, StatusArg, StatusEntry};
use crate::transport::WireChannel;

/// Decoded `op_response`
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// Object id assigned by the server (handle, or a status for get_segment)
    pub object: i32,
    /// Blob id
    pub blob_id: i64,
    /// Response data buffer
    pub data: Bytes,
    /// Warning chain, if the server reported one
    pub warning: Option<GdsError>,
}

impl Response {
    /// Read the next response.
    ///
    /// `op` is an opcode already consumed by the caller; when `None` the
    /// next non-dummy opcode is read first.
    pub async fn read(channel: &mut WireChannel, op: Option<i32>) -> Result<Self> {
        let op = match op {
            Some(op) => op,
            None => channel.next_operation().await?,
        };
        if op != Opcode::Response.code() {
            return Err(Error::UnexpectedOpcode {
                expected: Opcode::Response.code(),
                actual: op,
            });
        }

        let object = channel.read_i32().await?;
        let blob_id = channel.read_i64().await?;
        let data = channel.read_buffer().await?;
        tracing::trace!(object, blob_id, data_len = data.len(), "op_response");

        let warning = match read_status_vector(channel).await? {
            Some(chain) if chain.warning => Some(chain),
            Some(chain) => return Err(Error::Server(chain)),
            None => None,
        };

        Ok(Self {
            object,
            blob_id,
            data,
            warning,
        })
    }
}

/// Read a status vector up to and including `isc_arg_end`.
///
/// Zero codes are dropped. Returns `None` when no entry survived.
pub async fn read_status_vector(channel: &mut WireChannel) -> Result<Option<GdsError>> {
    let mut entries = Vec::new();
    loop {
        let tag = channel.read_i32().await?;
        match tag {
            status_arg::END => break,
            status_arg::STRING | status_arg::INTERPRETED => {
                let text = channel.read_string().await?;
                entries.push(StatusEntry::text(StatusArg::from_tag(tag), text));
            }
            status_arg::NUMBER => {
                let value = channel.read_i32().await?;
                entries.push(StatusEntry::code(StatusArg::Number, value));
            }
            _ => {
                let code = channel.read_i32().await?;
                if code != 0 {
                    entries.push(StatusEntry::code(StatusArg::from_tag(tag), code));
                }
            }
        }
    }

    if entries.is_empty() {
        Ok(None)
    } else {
        Ok(Some(GdsError::new(entries)))
    }
}

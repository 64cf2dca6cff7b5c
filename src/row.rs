//! Row data on the wire
//!
//! Rows travel as one field per column, framed by the descriptor's wire
//! length table, each followed by an i32 null indicator. The engine does not
//! interpret column bytes: values are handed over raw, together with the
//! column's [`FieldDescriptor`](crate::descriptor::FieldDescriptor), to
//! whatever converts them into host values.

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::error::{Error, Result};
use crate::transport::WireChannel;

/// Null indicator value for an absent field
const NULL_INDICATOR: i32 = -1;

/// One row of raw column values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: Vec<Option<Bytes>>,
}

impl Row {
    /// Create a row from raw values
    pub fn new(values: Vec<Option<Bytes>>) -> Self {
        Self { values }
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw bytes of a column, `None` when NULL or out of range
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.values.get(index).and_then(|v| v.as_deref())
    }

    /// Check if a column is NULL
    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(None))
    }

    /// All values in column order
    pub fn values(&self) -> &[Option<Bytes>] {
        &self.values
    }

    /// Consume the row and return its values
    pub fn into_values(self) -> Vec<Option<Bytes>> {
        self.values
    }
}

/// Read one row using the descriptor's wire length table
pub(crate) async fn read_row(channel: &mut WireChannel, io_lengths: &[i32]) -> Result<Row> {
    let mut values = Vec::with_capacity(io_lengths.len());
    for &len in io_lengths {
        let data = if len == 0 {
            let n = channel.read_i32().await?;
            let n = usize::try_from(n)
                .map_err(|_| Error::Protocol(format!("negative field length {}", n)))?;
            let data = channel.read_bytes(n).await?;
            channel.skip_padding(n).await?;
            data
        } else if len > 0 {
            let n = (len - 1) as usize;
            let data = channel.read_bytes(n).await?;
            channel.skip_padding(n).await?;
            data
        } else {
            channel.read_bytes(len.unsigned_abs() as usize).await?
        };
        let indicator = channel.read_i32().await?;
        values.push(if indicator == NULL_INDICATOR { None } else { Some(data) });
    }
    Ok(Row::new(values))
}

/// Write one parameter row using the descriptor's wire length table.
///
/// Fixed text is cut or space-filled to the column length. Fixed-width values
/// must already have exactly the column's width.
pub(crate) fn write_row(buf: &mut WriteBuffer, io_lengths: &[i32], params: &[Option<Bytes>]) -> Result<()> {
    if io_lengths.len() != params.len() {
        return Err(Error::ParameterCount {
            expected: io_lengths.len(),
            actual: params.len(),
        });
    }

    for (index, (&len, param)) in io_lengths.iter().zip(params).enumerate() {
        let param = param.as_deref();
        if len == 0 {
            match param {
                Some(data) => buf.write_buffer(data)?,
                None => buf.write_i32(0)?,
            }
        } else if len > 0 {
            let width = (len - 1) as usize;
            match param {
                Some(data) if data.len() >= width => buf.write_bytes(&data[..width])?,
                Some(data) => {
                    buf.write_bytes(data)?;
                    buf.write_fill(b' ', width - data.len())?;
                }
                None => buf.write_fill(b' ', width)?,
            }
            buf.write_padding(width)?;
        } else {
            let width = len.unsigned_abs() as usize;
            match param {
                Some(data) if data.len() == width => buf.write_bytes(data)?,
                Some(data) => {
                    return Err(Error::Protocol(format!(
                        "parameter {} has {} bytes, column width is {}",
                        index + 1,
                        data.len(),
                        width
                    )));
                }
                None => buf.write_zeros(width)?,
            }
        }
        buf.write_i32(if param.is_some() { 0 } else { NULL_INDICATOR })?;
    }
    Ok(())
}

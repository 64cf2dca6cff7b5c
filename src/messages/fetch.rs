//! Fetch message for retrieving rows from an open cursor

use std::collections::VecDeque;

use crate::buffer::WriteBuffer;
use crate::constants::{Opcode, FETCH_NO_MORE_ROWS};
use crate::error::{Error, Result};
use crate::row::{read_row, Row};
use crate::transport::WireChannel;

/// Fetch request for the next batch of rows
#[derive(Debug)]
pub struct FetchMessage<'a> {
    statement_id: i32,
    blr: &'a [u8],
    batch_size: i32,
}

impl<'a> FetchMessage<'a> {
    /// Create a fetch request using the output row shape
    pub fn new(statement_id: i32, blr: &'a [u8], batch_size: i32) -> Self {
        Self {
            statement_id,
            blr,
            batch_size,
        }
    }

    /// Always `op_fetch`
    pub fn opcode(&self) -> Opcode {
        Opcode::Fetch
    }

    /// Write the fields that follow the opcode
    pub fn write_body(&self, buf: &mut WriteBuffer) -> Result<()> {
        buf.write_i32(self.statement_id)?;
        buf.write_buffer(self.blr)?;
        buf.write_i32(0)?; // message number
        buf.write_i32(self.batch_size)?;
        Ok(())
    }
}

/// How a fetch batch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The batch is complete; more rows may follow
    More,
    /// The cursor is exhausted
    Exhausted,
}

/// Read the `op_fetch_response` stream after its first opcode was consumed.
///
/// Each response carries a status and a message count; a row follows while
/// the status is 0 and the count positive, and then the next
/// `op_fetch_response`. Rows are appended to `rows`.
pub async fn read_fetch_rows(
    channel: &mut WireChannel,
    io_lengths: &[i32],
    rows: &mut VecDeque<Row>,
) -> Result<FetchOutcome> {
    loop {
        let status = channel.read_i32().await?;
        let messages = channel.read_i32().await?;

        if messages > 0 && status == 0 {
            rows.push_back(read_row(channel, io_lengths).await?);
            let op = channel.next_operation().await?;
            if op != Opcode::FetchResponse.code() {
                return Err(Error::UnexpectedOpcode {
                    expected: Opcode::FetchResponse.code(),
                    actual: op,
                });
            }
            continue;
        }

        return match status {
            0 => Ok(FetchOutcome::More),
            FETCH_NO_MORE_ROWS => Ok(FetchOutcome::Exhausted),
            other => Err(Error::Protocol(format!("fetch status {}", other))),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_layout() {
        let msg = FetchMessage::new(4, &[5, 2, 4, 0, 0, 0, 255, 76], 10);
        let mut buf = WriteBuffer::new();
        msg.write_body(&mut buf).unwrap();
        let expected: Vec<u8> = [
            vec![0, 0, 0, 4],
            vec![0, 0, 0, 8, 5, 2, 4, 0, 0, 0, 255, 76],
            vec![0, 0, 0, 0],
            vec![0, 0, 0, 10],
        ]
        .concat();
        assert_eq!(buf.as_slice(), &expected[..]);
        assert_eq!(msg.opcode(), Opcode::Fetch);
    }
}

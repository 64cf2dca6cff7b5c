//! Execute and execute-immediate messages
//!
//! Both carry an optional input row (its row-shape bytecode, message number,
//! message count and the row data) and an optional output row shape. When an
//! output shape is sent, a singleton result may come back inline as
//! `op_sql_response` ahead of the generic response.

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::Opcode;
use crate::descriptor::RowDescriptor;
use crate::error::{Error, Result};
use crate::row::{read_row, write_row, Row};
use crate::transport::WireChannel;

/// Input row: its descriptor and raw parameter values
#[derive(Debug, Clone, Copy)]
pub struct InputRow<'a> {
    /// Parameter descriptor
    pub descriptor: &'a RowDescriptor,
    /// Raw values, one per parameter
    pub values: &'a [Option<Bytes>],
}

fn write_input(buf: &mut WriteBuffer, input: Option<InputRow<'_>>) -> Result<()> {
    match input {
        Some(input) => {
            buf.write_buffer(input.descriptor.blr())?;
            buf.write_i32(0)?; // message number
            buf.write_i32(1)?; // message count
            write_row(buf, input.descriptor.io_lengths(), input.values)
        }
        None => {
            buf.write_buffer(&[])?;
            buf.write_i32(0)?;
            buf.write_i32(0)
        }
    }
}

/// Execute a prepared statement
#[derive(Debug)]
pub struct ExecuteMessage<'a> {
    statement_id: i32,
    transaction_id: i32,
    input: Option<InputRow<'a>>,
    output: Option<&'a RowDescriptor>,
}

impl<'a> ExecuteMessage<'a> {
    /// Create an execute request without input or output rows
    pub fn new(statement_id: i32, transaction_id: i32) -> Self {
        Self {
            statement_id,
            transaction_id,
            input: None,
            output: None,
        }
    }

    /// Attach the input row
    pub fn with_input(mut self, input: InputRow<'a>) -> Self {
        self.input = Some(input);
        self
    }

    /// Request an inline output row with this shape
    pub fn with_output(mut self, output: &'a RowDescriptor) -> Self {
        self.output = Some(output);
        self
    }

    /// `op_execute2` when an output shape is sent, else `op_execute`
    pub fn opcode(&self) -> Opcode {
        if self.output.is_some() {
            Opcode::Execute2
        } else {
            Opcode::Execute
        }
    }

    /// Write the fields that follow the opcode
    pub fn write_body(&self, buf: &mut WriteBuffer) -> Result<()> {
        buf.write_i32(self.statement_id)?;
        buf.write_i32(self.transaction_id)?;
        write_input(buf, self.input)?;
        if let Some(output) = self.output {
            buf.write_buffer(output.blr())?;
            buf.write_i32(0)?; // output message number
        }
        Ok(())
    }
}

/// Execute SQL text in one round trip, without a statement handle
#[derive(Debug)]
pub struct ExecImmediateMessage<'a> {
    transaction_id: i32,
    dialect: i32,
    sql: &'a str,
    input: Option<InputRow<'a>>,
    output: Option<&'a RowDescriptor>,
}

impl<'a> ExecImmediateMessage<'a> {
    /// Create an execute-immediate request
    pub fn new(transaction_id: i32, sql: &'a str, dialect: i32) -> Self {
        Self {
            transaction_id,
            dialect,
            sql,
            input: None,
            output: None,
        }
    }

    /// Attach the input row
    pub fn with_input(mut self, input: InputRow<'a>) -> Self {
        self.input = Some(input);
        self
    }

    /// Request an inline output row with this shape
    pub fn with_output(mut self, output: &'a RowDescriptor) -> Self {
        self.output = Some(output);
        self
    }

    /// `op_exec_immediate2` when any row shape is sent, else `op_exec_immediate`
    pub fn opcode(&self) -> Opcode {
        if self.input.is_some() || self.output.is_some() {
            Opcode::ExecImmediate2
        } else {
            Opcode::ExecImmediate
        }
    }

    /// Write the fields that follow the opcode
    pub fn write_body(&self, buf: &mut WriteBuffer) -> Result<()> {
        if self.opcode() == Opcode::ExecImmediate2 {
            write_input(buf, self.input)?;
            buf.write_buffer(self.output.map(|o| o.blr()).unwrap_or(&[]))?;
            buf.write_i32(0)?; // output message number
        }
        buf.write_i32(self.transaction_id)?;
        buf.write_i32(0)?; // database handle, unused
        buf.write_i32(self.dialect)?;
        buf.write_string(self.sql)?;
        buf.write_buffer(&[])?; // no info items
        buf.write_i32(0)?; // info buffer length
        Ok(())
    }
}

/// Read the body of an `op_sql_response`: a message count and at most one row
pub async fn read_sql_response(channel: &mut WireChannel, output: Option<&RowDescriptor>) -> Result<Option<Row>> {
    let messages = channel.read_i32().await?;
    tracing::debug!(messages, "op_sql_response");
    if messages <= 0 {
        return Ok(None);
    }
    match output {
        Some(output) => Ok(Some(read_row(channel, output.io_lengths()).await?)),
        None => Err(Error::Protocol("singleton row without an output shape".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::sql_type;
    use crate::descriptor::FieldDescriptor;

    #[test]
    fn test_execute_without_rows() {
        let msg = ExecuteMessage::new(7, 3);
        assert_eq!(msg.opcode(), Opcode::Execute);
        let mut buf = WriteBuffer::new();
        msg.write_body(&mut buf).unwrap();
        assert_eq!(
            buf.as_slice(),
            &[0, 0, 0, 7, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_execute_with_input_and_output() {
        let input = RowDescriptor::from_columns(vec![FieldDescriptor::new(sql_type::LONG, 4)]).unwrap();
        let output = RowDescriptor::from_columns(vec![FieldDescriptor::new(sql_type::SHORT, 2)]).unwrap();
        let values = [Some(Bytes::from_static(&[0, 0, 0, 42]))];
        let msg = ExecuteMessage::new(1, 2)
            .with_input(InputRow {
                descriptor: &input,
                values: &values,
            })
            .with_output(&output);
        assert_eq!(msg.opcode(), Opcode::Execute2);

        let mut buf = WriteBuffer::new();
        msg.write_body(&mut buf).unwrap();
        let data = buf.as_slice();
        // stmt, tr, blr length 12 (no padding), blr
        assert_eq!(&data[8..12], &[0, 0, 0, 12]);
        assert_eq!(&data[12..24], input.blr());
        assert_eq!(&data[24..32], &[0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(&data[32..40], &[0, 0, 0, 42, 0, 0, 0, 0]);
        assert_eq!(&data[40..44], &[0, 0, 0, 12]);
        assert_eq!(&data[44..56], output.blr());
        assert_eq!(&data[56..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_exec_immediate_layout() {
        let msg = ExecImmediateMessage::new(5, "X", 3);
        assert_eq!(msg.opcode(), Opcode::ExecImmediate);
        let mut buf = WriteBuffer::new();
        msg.write_body(&mut buf).unwrap();
        let expected: Vec<u8> = [
            vec![0, 0, 0, 5],
            vec![0, 0, 0, 0],
            vec![0, 0, 0, 3],
            vec![0, 0, 0, 1, b'X', 0, 0, 0],
            vec![0, 0, 0, 0],
            vec![0, 0, 0, 0],
        ]
        .concat();
        assert_eq!(buf.as_slice(), &expected[..]);
    }

    #[test]
    fn test_exec_immediate2_output_only() {
        let output = RowDescriptor::from_columns(vec![FieldDescriptor::new(sql_type::INT64, 8)]).unwrap();
        let msg = ExecImmediateMessage::new(5, "X", 3).with_output(&output);
        assert_eq!(msg.opcode(), Opcode::ExecImmediate2);
        let mut buf = WriteBuffer::new();
        msg.write_body(&mut buf).unwrap();
        let data = buf.as_slice();
        assert_eq!(&data[..12], &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&data[12..16], &[0, 0, 0, 12]);
        assert_eq!(&data[16..28], output.blr());
        assert_eq!(&data[28..36], &[0, 0, 0, 0, 0, 0, 0, 5]);
    }
}

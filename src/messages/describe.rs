//! Statement descriptor discovery
//!
//! The server describes a statement's columns as a flat information buffer:
//! a header with the column count, then for each column an `sqlda_seq` item,
//! the type, subtype, scale, length and name items, and `describe_end`. When
//! the reply does not fit the requested buffer it ends with `truncated`
//! instead of `end`, and the client asks again starting after the last
//! column it fully parsed.

use crate::buffer::ReadBuffer;
use crate::constants::{info, sql_info};
use crate::descriptor::{FieldDescriptor, RowDescriptor};
use crate::error::{Error, Result};

/// Items describing the output columns
pub const DESCRIBE_SELECT_ITEMS: [u8; 12] = [
    sql_info::SELECT,
    sql_info::DESCRIBE_VARS,
    sql_info::SQLDA_SEQ,
    sql_info::TYPE,
    sql_info::SUB_TYPE,
    sql_info::SCALE,
    sql_info::LENGTH,
    sql_info::FIELD,
    sql_info::RELATION,
    sql_info::OWNER,
    sql_info::ALIAS,
    sql_info::DESCRIBE_END,
];

/// Items describing the input parameters
pub const DESCRIBE_BIND_ITEMS: [u8; 12] = [
    sql_info::BIND,
    sql_info::DESCRIBE_VARS,
    sql_info::SQLDA_SEQ,
    sql_info::TYPE,
    sql_info::SUB_TYPE,
    sql_info::SCALE,
    sql_info::LENGTH,
    sql_info::FIELD,
    sql_info::RELATION,
    sql_info::OWNER,
    sql_info::ALIAS,
    sql_info::DESCRIBE_END,
];

/// Outcome of parsing one describe response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescribeProgress {
    /// The `end` marker was reached; every column is known
    Complete,
    /// The response was cut short; `last_index` is the 1-based index of the
    /// last column whose `describe_end` was seen
    Truncated {
        /// Last fully parsed column
        last_index: usize,
    },
}

/// Parse one describe response into `descriptor`.
///
/// The column count in the header sizes an empty descriptor; a descriptor
/// filled by an earlier, truncated response keeps its columns and must agree
/// on the count. `last_index` is where the previous pass stopped (0 on the
/// first pass).
pub fn parse_sql_info(data: &[u8], descriptor: &mut RowDescriptor, last_index: usize) -> Result<DescribeProgress> {
    let mut buf = ReadBuffer::from_slice(data);
    // select/bind item and describe_vars
    buf.skip(2)?;
    let count = usize::try_from(buf.read_item_int()?)
        .map_err(|_| Error::InfoBuffer("negative column count".to_string()))?;

    if descriptor.is_empty() {
        descriptor.resize(count);
    } else if descriptor.len() != count {
        return Err(Error::InfoBuffer(format!(
            "column count changed from {} to {}",
            descriptor.len(),
            count
        )));
    }

    let mut index = 0usize;
    let mut last_index = last_index;
    loop {
        let item = buf.read_u8()?;
        match item {
            info::END => return Ok(DescribeProgress::Complete),
            info::TRUNCATED => return Ok(DescribeProgress::Truncated { last_index }),
            sql_info::DESCRIBE_END => last_index = index,
            sql_info::SQLDA_SEQ => {
                let seq = buf.read_item_int()?;
                index = usize::try_from(seq)
                    .ok()
                    .filter(|&i| i >= 1 && i <= count)
                    .ok_or_else(|| Error::InfoBuffer(format!("column index {} of {}", seq, count)))?;
                *column_at(descriptor, index)? = FieldDescriptor::default();
            }
            sql_info::TYPE => column_at(descriptor, index)?.sql_type = buf.read_item_int()?,
            sql_info::SUB_TYPE => column_at(descriptor, index)?.sub_type = buf.read_item_int()?,
            sql_info::SCALE => column_at(descriptor, index)?.scale = buf.read_item_int()?,
            sql_info::LENGTH => column_at(descriptor, index)?.length = buf.read_item_int()?,
            sql_info::FIELD => column_at(descriptor, index)?.field_name = buf.read_item_string()?,
            sql_info::RELATION => column_at(descriptor, index)?.relation_name = buf.read_item_string()?,
            sql_info::OWNER => column_at(descriptor, index)?.owner_name = buf.read_item_string()?,
            sql_info::ALIAS => column_at(descriptor, index)?.alias_name = buf.read_item_string()?,
            other => {
                return Err(Error::InfoBuffer(format!("unexpected describe item {}", other)));
            }
        }
    }
}

fn column_at(descriptor: &mut RowDescriptor, index: usize) -> Result<&mut FieldDescriptor> {
    index
        .checked_sub(1)
        .and_then(|i| descriptor.column_mut(i))
        .ok_or_else(|| Error::InfoBuffer("describe item before sqlda_seq".to_string()))
}

/// Items for a follow-up request resuming after column `last_index`
pub fn restart_items(last_index: usize, items: &[u8]) -> Result<Vec<u8>> {
    let start = u16::try_from(last_index)
        .map_err(|_| Error::InfoBuffer(format!("column index {} out of range", last_index)))?;
    let mut out = Vec::with_capacity(4 + items.len());
    out.push(sql_info::SQLDA_START);
    out.push(2);
    out.extend_from_slice(&start.to_le_bytes());
    out.extend_from_slice(items);
    Ok(out)
}

//! Information buffer parsing
//!
//! Information responses are sequences of `item, u16le length, value` groups
//! terminated by `isc_info_end`. Values are little-endian regardless of the
//! surrounding XDR framing.

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::constants::{info, sql_info, Opcode};
use crate::error::{Error, Result};
use crate::statement::{SqlCounts, StatementType};

/// Items requested right after attach
pub const ATTACH_INFO_ITEMS: [u8; 5] = [
    info::DB_SQL_DIALECT,
    info::ISC_VERSION,
    info::ODS_VERSION,
    info::ODS_MINOR_VERSION,
    info::END,
];

/// Items requested for statement counts and type
pub const SQL_COUNTS_ITEMS: [u8; 3] = [sql_info::RECORDS, sql_info::STMT_TYPE, info::END];

/// Items requested for blob information
pub const BLOB_INFO_ITEMS: [u8; 5] = [
    info::BLOB_NUM_SEGMENTS,
    info::BLOB_MAX_SEGMENT,
    info::BLOB_TOTAL_LENGTH,
    info::BLOB_TYPE,
    info::END,
];

/// Information request for a database, statement or blob
#[derive(Debug)]
pub struct InfoMessage<'a> {
    opcode: Opcode,
    object_id: i32,
    items: &'a [u8],
    buffer_length: i32,
}

impl<'a> InfoMessage<'a> {
    /// `op_info_database`
    pub fn database(object_id: i32, items: &'a [u8], buffer_length: i32) -> Self {
        Self::new(Opcode::InfoDatabase, object_id, items, buffer_length)
    }

    /// `op_info_sql`
    pub fn statement(object_id: i32, items: &'a [u8], buffer_length: i32) -> Self {
        Self::new(Opcode::InfoSql, object_id, items, buffer_length)
    }

    /// `op_info_blob`
    pub fn blob(object_id: i32, items: &'a [u8], buffer_length: i32) -> Self {
        Self::new(Opcode::InfoBlob, object_id, items, buffer_length)
    }

    fn new(opcode: Opcode, object_id: i32, items: &'a [u8], buffer_length: i32) -> Self {
        Self {
            opcode,
            object_id,
            items,
            buffer_length,
        }
    }

    /// Request opcode
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Write the fields that follow the opcode
    pub fn write_body(&self, buf: &mut WriteBuffer) -> Result<()> {
        buf.write_i32(self.object_id)?;
        buf.write_i32(0)?; // incarnation
        buf.write_buffer(self.items)?;
        buf.write_i32(self.buffer_length)?;
        Ok(())
    }
}

/// Database properties reported at attach
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseInfo {
    /// SQL dialect of the database
    pub dialect: Option<i32>,
    /// Engine version string
    pub version: Option<String>,
    /// On-disk structure major version
    pub ods_major: Option<i32>,
    /// On-disk structure minor version
    pub ods_minor: Option<i32>,
}

/// Parse the attach information response.
///
/// A truncated response is accepted: parsing stops and whatever was read so
/// far is returned.
pub fn parse_database_info(data: &[u8]) -> Result<DatabaseInfo> {
    let mut buf = ReadBuffer::from_slice(data);
    let mut result = DatabaseInfo::default();

    loop {
        let item = buf.read_u8()?;
        match item {
            info::END => break,
            info::TRUNCATED => {
                tracing::debug!("database info truncated");
                break;
            }
            info::DB_SQL_DIALECT => result.dialect = Some(buf.read_item_int()?),
            info::ISC_VERSION => {
                let len = buf.read_item_length()?;
                // Value is a count byte and a length byte ahead of the first version string
                if len < 2 {
                    return Err(Error::InfoBuffer(format!("version item of {} bytes", len)));
                }
                let value = buf.read_bytes(len)?;
                result.version = Some(String::from_utf8_lossy(&value[2..]).into_owned());
            }
            info::ODS_VERSION => result.ods_major = Some(buf.read_item_int()?),
            info::ODS_MINOR_VERSION => result.ods_minor = Some(buf.read_item_int()?),
            other => {
                return Err(Error::InfoBuffer(format!("unexpected database info item {}", other)));
            }
        }
    }

    Ok(result)
}

/// Parse a statement counts/type response
pub fn parse_sql_counts(data: &[u8]) -> Result<SqlCounts> {
    let mut buf = ReadBuffer::from_slice(data);
    let mut counts = SqlCounts::default();

    loop {
        let item = buf.read_u8()?;
        if item == info::END || item == info::TRUNCATED {
            break;
        }
        let len = buf.read_item_length()?;
        match item {
            sql_info::RECORDS => {
                let mut records = ReadBuffer::new(buf.read_bytes(len)?);
                while records.remaining() > 0 {
                    let kind = records.read_u8()?;
                    if kind == info::END {
                        break;
                    }
                    let value = records.read_item_int()? as i64;
                    match kind {
                        sql_info::REQ_SELECT_COUNT => counts.selected = value,
                        sql_info::REQ_INSERT_COUNT => counts.inserted = value,
                        sql_info::REQ_UPDATE_COUNT => counts.updated = value,
                        sql_info::REQ_DELETE_COUNT => counts.deleted = value,
                        _ => {}
                    }
                }
            }
            sql_info::STMT_TYPE => {
                counts.statement_type = StatementType::from_code(buf.read_vax(len)?);
            }
            _ => buf.skip(len)?,
        }
    }

    Ok(counts)
}

/// Blob properties
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobInfo {
    /// Number of segments
    pub num_segments: i64,
    /// Length of the longest segment
    pub max_segment: i64,
    /// Total length in bytes
    pub total_length: i64,
    /// 0 for segmented, 1 for stream
    pub blob_type: i32,
}

/// Parse a blob information response
pub fn parse_blob_info(data: &[u8]) -> Result<BlobInfo> {
    let mut buf = ReadBuffer::from_slice(data);
    let mut result = BlobInfo::default();

    loop {
        let item = buf.read_u8()?;
        if item == info::END || item == info::TRUNCATED {
            break;
        }
        let len = buf.read_item_length()?;
        let value = crate::buffer::vax_integer_i64(&buf.read_bytes(len)?);
        match item {
            info::BLOB_NUM_SEGMENTS => result.num_segments = value,
            info::BLOB_MAX_SEGMENT => result.max_segment = value,
            info::BLOB_TOTAL_LENGTH => result.total_length = value,
            info::BLOB_TYPE => result.blob_type = value as i32,
            _ => {}
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attach_info() -> Vec<u8> {
        let mut data = vec![info::DB_SQL_DIALECT, 1, 0, 3];
        data.extend_from_slice(&[info::ISC_VERSION, 8, 0, 1, 6]);
        data.extend_from_slice(b"WI-V6.");
        data.extend_from_slice(&[info::ODS_VERSION, 1, 0, 11]);
        data.extend_from_slice(&[info::ODS_MINOR_VERSION, 1, 0, 2]);
        data.push(info::END);
        data
    }

    #[test]
    fn test_info_request_layout() {
        let msg = InfoMessage::statement(3, &SQL_COUNTS_ITEMS, 128);
        assert_eq!(msg.opcode(), Opcode::InfoSql);
        let mut buf = WriteBuffer::new();
        msg.write_body(&mut buf).unwrap();
        assert_eq!(
            buf.as_slice(),
            &[0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 3, 23, 21, 1, 0, 0, 0, 0, 128]
        );
    }

    #[test]
    fn test_parse_database_info() {
        let parsed = parse_database_info(&attach_info()).unwrap();
        assert_eq!(parsed.dialect, Some(3));
        assert_eq!(parsed.version.as_deref(), Some("WI-V6."));
        assert_eq!(parsed.ods_major, Some(11));
        assert_eq!(parsed.ods_minor, Some(2));
    }

    #[test]
    fn test_parse_database_info_truncated() {
        let data = [info::DB_SQL_DIALECT, 1, 0, 1, info::TRUNCATED];
        let parsed = parse_database_info(&data).unwrap();
        assert_eq!(parsed.dialect, Some(1));
        assert_eq!(parsed.version, None);
    }

    #[test]
    fn test_parse_database_info_unknown_item() {
        let data = [99, 1, 0, 1, info::END];
        assert!(matches!(parse_database_info(&data), Err(Error::InfoBuffer(_))));
    }

    #[test]
    fn test_parse_sql_counts() {
        let data = [
            sql_info::RECORDS, 15, 0,
            sql_info::REQ_UPDATE_COUNT, 4, 0, 2, 0, 0, 0,
            sql_info::REQ_INSERT_COUNT, 4, 0, 7, 0, 0, 0,
            info::END,
            sql_info::STMT_TYPE, 4, 0, 2, 0, 0, 0,
            info::END,
        ];
        let counts = parse_sql_counts(&data).unwrap();
        assert_eq!(counts.updated, 2);
        assert_eq!(counts.inserted, 7);
        assert_eq!(counts.deleted, 0);
        assert_eq!(counts.statement_type, StatementType::Insert);
    }

    #[test]
    fn test_parse_blob_info() {
        let data = [
            info::BLOB_NUM_SEGMENTS, 1, 0, 3,
            info::BLOB_TOTAL_LENGTH, 2, 0, 0x10, 0x01,
            info::BLOB_TYPE, 1, 0, 1,
            info::END,
        ];
        let parsed = parse_blob_info(&data).unwrap();
        assert_eq!(parsed.num_segments, 3);
        assert_eq!(parsed.total_length, 0x110);
        assert_eq!(parsed.blob_type, 1);
    }
}

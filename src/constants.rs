//! GDS wire protocol constants
//!
//! Operation codes, parameter block tags, information items, SQL type codes,
//! row-shape bytecode and engine error codes used by the Firebird/InterBase
//! remote protocol.

// =============================================================================
// Operation Codes
// =============================================================================

/// Operation codes (the leading i32 of every protocol message)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Opcode {
    /// Client connect request
    Connect = 1,
    /// Server accepts connection
    Accept = 3,
    /// Server rejects connection
    Reject = 4,
    /// Generic response
    Response = 9,
    /// Attach to a database
    Attach = 19,
    /// Create a database
    Create = 20,
    /// Detach from a database
    Detach = 21,
    /// Start a transaction
    Transaction = 29,
    /// Commit a transaction
    Commit = 30,
    /// Roll back a transaction
    Rollback = 31,
    /// Prepare a transaction (two-phase commit)
    Prepare = 32,
    /// Create a blob
    CreateBlob = 34,
    /// Open a blob
    OpenBlob = 35,
    /// Read a blob segment
    GetSegment = 36,
    /// Write a blob segment
    PutSegment = 37,
    /// Cancel a blob
    CancelBlob = 38,
    /// Close a blob
    CloseBlob = 39,
    /// Database information request
    InfoDatabase = 40,
    /// Blob information request
    InfoBlob = 43,
    /// Write batched blob segments
    BatchSegments = 44,
    /// Commit and keep the transaction alive
    CommitRetaining = 50,
    /// Prepare a transaction with a message
    Prepare2 = 51,
    /// Open a blob with a parameter block
    OpenBlob2 = 56,
    /// Create a blob with a parameter block
    CreateBlob2 = 57,
    /// Allocate a statement handle
    AllocateStatement = 62,
    /// Execute a statement
    Execute = 63,
    /// Execute SQL text without a statement handle
    ExecImmediate = 64,
    /// Fetch rows
    Fetch = 65,
    /// Fetch response carrying one row
    FetchResponse = 66,
    /// Free a statement
    FreeStatement = 67,
    /// Prepare SQL text
    PrepareStatement = 68,
    /// Set the cursor name
    SetCursor = 69,
    /// Statement information request
    InfoSql = 70,
    /// Keepalive, always skipped
    Dummy = 71,
    /// Execute immediate with row shapes
    ExecImmediate2 = 75,
    /// Execute with an output row shape
    Execute2 = 76,
    /// Singleton row delivered with an execute response
    SqlResponse = 78,
    /// Drop the database
    DropDatabase = 81,
    /// Roll back and keep the transaction alive
    RollbackRetaining = 86,
}

impl Opcode {
    /// Wire value of this opcode
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for Opcode {
    type Error = crate::error::Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Opcode::Connect),
            3 => Ok(Opcode::Accept),
            4 => Ok(Opcode::Reject),
            9 => Ok(Opcode::Response),
            19 => Ok(Opcode::Attach),
            20 => Ok(Opcode::Create),
            21 => Ok(Opcode::Detach),
            29 => Ok(Opcode::Transaction),
            30 => Ok(Opcode::Commit),
            31 => Ok(Opcode::Rollback),
            32 => Ok(Opcode::Prepare),
            34 => Ok(Opcode::CreateBlob),
            35 => Ok(Opcode::OpenBlob),
            36 => Ok(Opcode::GetSegment),
            37 => Ok(Opcode::PutSegment),
            38 => Ok(Opcode::CancelBlob),
            39 => Ok(Opcode::CloseBlob),
            40 => Ok(Opcode::InfoDatabase),
            43 => Ok(Opcode::InfoBlob),
            44 => Ok(Opcode::BatchSegments),
            50 => Ok(Opcode::CommitRetaining),
            51 => Ok(Opcode::Prepare2),
            56 => Ok(Opcode::OpenBlob2),
            57 => Ok(Opcode::CreateBlob2),
            62 => Ok(Opcode::AllocateStatement),
            63 => Ok(Opcode::Execute),
            64 => Ok(Opcode::ExecImmediate),
            65 => Ok(Opcode::Fetch),
            66 => Ok(Opcode::FetchResponse),
            67 => Ok(Opcode::FreeStatement),
            68 => Ok(Opcode::PrepareStatement),
            69 => Ok(Opcode::SetCursor),
            70 => Ok(Opcode::InfoSql),
            71 => Ok(Opcode::Dummy),
            75 => Ok(Opcode::ExecImmediate2),
            76 => Ok(Opcode::Execute2),
            78 => Ok(Opcode::SqlResponse),
            81 => Ok(Opcode::DropDatabase),
            86 => Ok(Opcode::RollbackRetaining),
            _ => Err(crate::error::Error::InvalidOpcode(value)),
        }
    }
}

// =============================================================================
// Connection Handshake
// =============================================================================

/// Values sent in the op_connect request
#[allow(missing_docs)]
pub mod connect {
    pub const CONNECT_VERSION2: i32 = 2;
    pub const ARCH_GENERIC: i32 = 1;
    pub const PROTOCOL_VERSION10: i32 = 10;
    pub const PTYPE_RPC: i32 = 2;
    pub const PTYPE_BATCH_SEND: i32 = 3;
    pub const PROTOCOL_WEIGHT: i32 = 2;
}

/// Tags of the user identification block
#[allow(missing_docs)]
pub mod cnct {
    pub const USER: u8 = 1;
    pub const HOST: u8 = 4;
    pub const USER_VERIFICATION: u8 = 6;
}

// =============================================================================
// Status Vector
// =============================================================================

/// Status vector argument tags
#[allow(missing_docs)]
pub mod status_arg {
    pub const END: i32 = 0;
    pub const GDS: i32 = 1;
    pub const STRING: i32 = 2;
    pub const CSTRING: i32 = 3;
    pub const NUMBER: i32 = 4;
    pub const INTERPRETED: i32 = 5;
    pub const WARNING: i32 = 18;
}

/// Engine error codes
#[allow(missing_docs)]
pub mod isc {
    pub const BAD_DB_HANDLE: i32 = 335544324;
    pub const BAD_DPB_CONTENT: i32 = 335544326;
    pub const BAD_REQ_HANDLE: i32 = 335544327;
    pub const BAD_SEGSTR_HANDLE: i32 = 335544328;
    pub const BAD_TRANS_HANDLE: i32 = 335544332;
    pub const OPEN_TRANS: i32 = 335544357;
    pub const SEGMENT: i32 = 335544366;
    pub const SEGSTR_EOF: i32 = 335544367;
    pub const CONNECT_REJECT: i32 = 335544421;
    pub const TRA_STATE: i32 = 335544468;
    pub const DSQL_SQLDA_ERR: i32 = 335544583;
    pub const NETWORK_ERROR: i32 = 335544721;
    pub const NET_READ_ERR: i32 = 335544726;
    pub const NET_WRITE_ERR: i32 = 335544727;
}

// =============================================================================
// Parameter Blocks
// =============================================================================

/// Database parameter block tags
#[allow(missing_docs)]
pub mod dpb {
    pub const VERSION1: u8 = 1;
    pub const PAGE_SIZE: u8 = 4;
    pub const NUM_BUFFERS: u8 = 5;
    pub const USER_NAME: u8 = 28;
    pub const PASSWORD: u8 = 29;
    pub const LC_CTYPE: u8 = 48;
    pub const SQL_ROLE_NAME: u8 = 60;
    pub const SQL_DIALECT: u8 = 63;
}

/// Transaction parameter block options
#[allow(missing_docs)]
pub mod tpb {
    pub const VERSION3: u8 = 3;
    pub const CONSISTENCY: u8 = 1;
    pub const CONCURRENCY: u8 = 2;
    pub const WAIT: u8 = 6;
    pub const NOWAIT: u8 = 7;
    pub const READ: u8 = 8;
    pub const WRITE: u8 = 9;
    pub const READ_COMMITTED: u8 = 15;
    pub const REC_VERSION: u8 = 17;
    pub const NO_REC_VERSION: u8 = 18;
}

/// Blob parameter block tags
#[allow(missing_docs)]
pub mod bpb {
    pub const VERSION1: u8 = 1;
    pub const SOURCE_TYPE: u8 = 1;
    pub const TARGET_TYPE: u8 = 2;
    pub const TYPE: u8 = 3;
    pub const TYPE_SEGMENTED: u8 = 0;
    pub const TYPE_STREAM: u8 = 1;
}

// =============================================================================
// Information Items
// =============================================================================

/// Database and blob information items
#[allow(missing_docs)]
pub mod info {
    pub const END: u8 = 1;
    pub const TRUNCATED: u8 = 2;
    pub const ISC_VERSION: u8 = 12;
    pub const ODS_VERSION: u8 = 32;
    pub const ODS_MINOR_VERSION: u8 = 33;
    pub const DB_SQL_DIALECT: u8 = 62;

    pub const BLOB_NUM_SEGMENTS: u8 = 4;
    pub const BLOB_MAX_SEGMENT: u8 = 5;
    pub const BLOB_TOTAL_LENGTH: u8 = 6;
    pub const BLOB_TYPE: u8 = 7;
}

/// Statement information items
#[allow(missing_docs)]
pub mod sql_info {
    pub const SELECT: u8 = 4;
    pub const BIND: u8 = 5;
    pub const DESCRIBE_VARS: u8 = 7;
    pub const DESCRIBE_END: u8 = 8;
    pub const SQLDA_SEQ: u8 = 9;
    pub const TYPE: u8 = 11;
    pub const SUB_TYPE: u8 = 12;
    pub const SCALE: u8 = 13;
    pub const LENGTH: u8 = 14;
    pub const FIELD: u8 = 16;
    pub const RELATION: u8 = 17;
    pub const OWNER: u8 = 18;
    pub const ALIAS: u8 = 19;
    pub const SQLDA_START: u8 = 20;
    pub const STMT_TYPE: u8 = 21;
    pub const RECORDS: u8 = 23;

    pub const REQ_SELECT_COUNT: u8 = 13;
    pub const REQ_INSERT_COUNT: u8 = 14;
    pub const REQ_UPDATE_COUNT: u8 = 15;
    pub const REQ_DELETE_COUNT: u8 = 16;
}

/// Buffer size requested for describe and database information
pub const INFO_BUFFER_SIZE: i32 = 1024;

/// Buffer size requested for statement counts
pub const COUNTS_BUFFER_SIZE: i32 = 128;

// =============================================================================
// SQL Types
// =============================================================================

/// SQL type codes (the low bit is the nullable flag)
#[allow(missing_docs)]
pub mod sql_type {
    pub const VARYING: i32 = 448;
    pub const TEXT: i32 = 452;
    pub const DOUBLE: i32 = 480;
    pub const FLOAT: i32 = 482;
    pub const LONG: i32 = 496;
    pub const SHORT: i32 = 500;
    pub const TIMESTAMP: i32 = 510;
    pub const BLOB: i32 = 520;
    pub const D_FLOAT: i32 = 530;
    pub const ARRAY: i32 = 540;
    pub const QUAD: i32 = 550;
    pub const TYPE_TIME: i32 = 560;
    pub const TYPE_DATE: i32 = 570;
    pub const INT64: i32 = 580;
}

// =============================================================================
// Row-shape bytecode (BLR)
// =============================================================================

/// Row-shape bytecode opcodes
#[allow(missing_docs)]
pub mod blr {
    pub const VERSION5: u8 = 5;
    pub const BEGIN: u8 = 2;
    pub const MESSAGE: u8 = 4;
    pub const SHORT: u8 = 7;
    pub const LONG: u8 = 8;
    pub const QUAD: u8 = 9;
    pub const FLOAT: u8 = 10;
    pub const D_FLOAT: u8 = 11;
    pub const SQL_DATE: u8 = 12;
    pub const SQL_TIME: u8 = 13;
    pub const TEXT: u8 = 14;
    pub const INT64: u8 = 16;
    pub const DOUBLE: u8 = 27;
    pub const TIMESTAMP: u8 = 35;
    pub const VARYING: u8 = 37;
    pub const END: u8 = 255;
    pub const EOC: u8 = 76;
}

// =============================================================================
// Statements and Blobs
// =============================================================================

/// Options for op_free_statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum FreeOption {
    /// Close the cursor, keep the prepared statement
    Close = 1,
    /// Release the statement entirely
    Drop = 2,
}

/// SQL dialects
#[allow(missing_docs)]
pub mod dialect {
    pub const V5: i32 = 1;
    pub const V6_TRANSITION: i32 = 2;
    pub const V6: i32 = 3;
}

/// Largest blob segment the 2-byte length prefix can carry
pub const MAX_SEGMENT_SIZE: usize = 32767;

/// Fetch status signalling the cursor is exhausted
pub const FETCH_NO_MORE_ROWS: i32 = 100;

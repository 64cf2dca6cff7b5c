//! Error types for the Firebird wire protocol engine
//!
//! This module defines every error the engine can surface, from low-level
//! framing problems to the chained status vectors reported by the server.

use std::fmt;
use std::io;
use thiserror::Error;

use crate::constants::{isc, status_arg};
use crate::transaction::TransactionState;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Firebird wire protocol engine
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Opcode value not known to this engine
    #[error("invalid opcode: {0}")]
    InvalidOpcode(i32),

    /// A different opcode arrived than the one the exchange requires
    #[error("unexpected opcode: expected {expected}, got {actual}")]
    UnexpectedOpcode { expected: i32, actual: i32 },

    /// Malformed or inconsistent information buffer
    #[error("malformed info buffer: {0}")]
    InfoBuffer(String),

    /// General protocol error
    #[error("protocol error: {0}")]
    Protocol(String),

    // =========================================================================
    // Buffer Errors
    // =========================================================================
    /// Buffer underflow - not enough data to read
    #[error("buffer underflow: need {needed} bytes but only {available} available")]
    BufferUnderflow { needed: usize, available: usize },

    /// Buffer overflow - not enough space to write
    #[error("buffer overflow: need {needed} bytes but only {available} available")]
    BufferOverflow { needed: usize, available: usize },

    /// Blob segment larger than the 2-byte length prefix allows
    #[error("segment of {0} bytes exceeds the maximum segment size")]
    SegmentTooLong(usize),

    /// Clumplet content longer than its length prefix allows
    #[error("clumplet {tag} content of {len} bytes does not fit its length prefix")]
    ClumpletTooLong { tag: u8, len: usize },

    // =========================================================================
    // Connection Errors
    // =========================================================================
    /// Server answered the handshake with something other than op_accept
    #[error("connection rejected by server (opcode {0})")]
    ConnectionRejected(i32),

    /// Connection closed unexpectedly
    #[error("connection closed unexpectedly")]
    ConnectionClosed,

    /// Connection timeout
    #[error("connection timeout after {0:?}")]
    ConnectionTimeout(std::time::Duration),

    /// Invalid connection string
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// Connection character set whose text is not UTF-8 on the wire
    #[error("unsupported connection character set: {0}")]
    UnsupportedCharset(String),

    /// The attachment was detached, dropped or never attached
    #[error("attachment is not attached")]
    NotAttached,

    // =========================================================================
    // State Errors (detected locally, nothing sent)
    // =========================================================================
    /// Transaction operation not legal in the current state
    #[error("cannot {operation} transaction in state {state:?}")]
    TransactionState {
        state: TransactionState,
        operation: &'static str,
    },

    /// Detach refused while transactions are open
    #[error("{0} transaction(s) still open")]
    OpenTransactions(usize),

    /// Statement operation not legal in the current state
    #[error("statement error: {0}")]
    StatementState(String),

    /// Fetch requested with a non-positive batch size
    #[error("invalid fetch size: {0}")]
    InvalidFetchSize(i32),

    /// Parameter count does not match the input descriptor
    #[error("expected {expected} parameters, got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    /// Blob handle was closed or its transaction ended
    #[error("invalid blob handle")]
    InvalidBlobHandle,

    // =========================================================================
    // Server Errors
    // =========================================================================
    /// Status vector reported by the server
    #[error("{0}")]
    Server(GdsError),

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Underlying network I/O error
    #[error("network error: {0}")]
    Io(#[from] io::Error),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Numeric engine error code for this condition, if one exists
    pub fn gds_code(&self) -> Option<i32> {
        match self {
            Error::Io(_) | Error::ConnectionClosed | Error::ConnectionTimeout(_) => {
                Some(isc::NETWORK_ERROR)
            }
            Error::ConnectionRejected(_) => Some(isc::CONNECT_REJECT),
            Error::UnsupportedCharset(_) => Some(isc::BAD_DPB_CONTENT),
            Error::NotAttached => Some(isc::BAD_DB_HANDLE),
            Error::TransactionState { .. } => Some(isc::TRA_STATE),
            Error::OpenTransactions(_) => Some(isc::OPEN_TRANS),
            Error::StatementState(_) => Some(isc::BAD_REQ_HANDLE),
            Error::InvalidBlobHandle => Some(isc::BAD_SEGSTR_HANDLE),
            Error::InvalidFetchSize(_) | Error::InfoBuffer(_) | Error::ParameterCount { .. } => {
                Some(isc::DSQL_SQLDA_ERR)
            }
            Error::Server(gds) => gds.error_code(),
            _ => None,
        }
    }

    /// Check if this is a transport fault, fatal to the attachment
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::ConnectionClosed | Error::ConnectionTimeout(_)
        )
    }

    /// Check if the byte stream can no longer be trusted after this error.
    ///
    /// Transport faults qualify, and so does any framing error found while
    /// decoding a reply: the rest of that reply is still unread.
    pub fn is_stream_fatal(&self) -> bool {
        self.is_network_error() || matches!(self, Error::UnexpectedOpcode { .. } | Error::Protocol(_))
    }

    /// Check if this is a local state violation (the connection stays usable)
    pub fn is_state_violation(&self) -> bool {
        matches!(
            self,
            Error::TransactionState { .. }
                | Error::OpenTransactions(_)
                | Error::StatementState(_)
                | Error::InvalidFetchSize(_)
                | Error::InvalidBlobHandle
        )
    }

    /// Check if this error was reported by the server
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Server(_))
    }

    /// The server status chain, if this is a server error
    pub fn as_gds(&self) -> Option<&GdsError> {
        match self {
            Error::Server(gds) => Some(gds),
            _ => None,
        }
    }
}

// =============================================================================
// Status vector chain
// =============================================================================

/// Kind of a status vector argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusArg {
    /// Engine error code
    Gds,
    /// Numeric message parameter
    Number,
    /// String message parameter
    String,
    /// Pre-interpreted message text
    Interpreted,
    /// Warning code
    Warning,
    /// Any other numeric argument tag
    Other(i32),
}

impl StatusArg {
    /// Map a wire tag to its kind
    pub fn from_tag(tag: i32) -> Self {
        match tag {
            status_arg::GDS => StatusArg::Gds,
            status_arg::NUMBER => StatusArg::Number,
            status_arg::STRING => StatusArg::String,
            status_arg::INTERPRETED => StatusArg::Interpreted,
            status_arg::WARNING => StatusArg::Warning,
            other => StatusArg::Other(other),
        }
    }
}

/// Payload carried by one status entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusValue {
    /// Numeric code or parameter
    Code(i32),
    /// Message parameter text
    Text(String),
}

/// One entry of a status vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Argument kind
    pub arg: StatusArg,
    /// Entry payload
    pub value: StatusValue,
}

impl StatusEntry {
    /// Create a numeric entry
    pub fn code(arg: StatusArg, code: i32) -> Self {
        Self {
            arg,
            value: StatusValue::Code(code),
        }
    }

    /// Create a string entry
    pub fn text(arg: StatusArg, text: impl Into<String>) -> Self {
        Self {
            arg,
            value: StatusValue::Text(text.into()),
        }
    }
}

/// An ordered chain of status entries reported by the server.
///
/// The chain is a warning when its head entry is a warning code. Warnings are
/// accumulated on the attachment instead of failing the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdsError {
    /// Entries in the order the server sent them
    pub entries: Vec<StatusEntry>,
    /// Whether the whole chain is a warning
    pub warning: bool,
}

impl GdsError {
    /// Build a chain from decoded entries
    pub fn new(entries: Vec<StatusEntry>) -> Self {
        let warning = matches!(entries.first(), Some(e) if e.arg == StatusArg::Warning);
        Self { entries, warning }
    }

    /// First engine error or warning code in the chain
    pub fn error_code(&self) -> Option<i32> {
        self.entries.iter().find_map(|e| match (e.arg, &e.value) {
            (StatusArg::Gds | StatusArg::Warning, StatusValue::Code(c)) => Some(*c),
            _ => None,
        })
    }

    /// All engine error and warning codes, in order
    pub fn codes(&self) -> Vec<i32> {
        self.entries
            .iter()
            .filter_map(|e| match (e.arg, &e.value) {
                (StatusArg::Gds | StatusArg::Warning, StatusValue::Code(c)) => Some(*c),
                _ => None,
            })
            .collect()
    }

    /// All string parameters, in order
    pub fn messages(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match &e.value {
                StatusValue::Text(s) => Some(s.as_str()),
                StatusValue::Code(_) => None,
            })
            .collect()
    }

    /// Whether the chain contains the given engine code
    pub fn has_code(&self, code: i32) -> bool {
        self.codes().contains(&code)
    }
}

impl fmt::Display for GdsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", if self.warning { "server warning" } else { "server error" })?;
        for entry in &self.entries {
            match (&entry.arg, &entry.value) {
                (StatusArg::Gds | StatusArg::Warning, StatusValue::Code(c)) => write!(f, "; code {}", c)?,
                (_, StatusValue::Code(c)) => write!(f, " {}", c)?,
                (_, StatusValue::Text(s)) => write!(f, " '{}'", s)?,
            }
        }
        Ok(())
    }
}

impl From<GdsError> for Error {
    fn from(gds: GdsError) -> Self {
        Error::Server(gds)
    }
}

//! GDS protocol messages
//!
//! Request builders write the fields that follow an opcode into the channel's
//! staging buffer; response readers decode what the server sends back.

mod blob;
mod connect;
mod describe;
mod execute;
mod fetch;
mod info;
mod response;

pub use blob::{segment_request_length, unpack_segments, BlobOpenMessage, SegmentStatus};
pub use connect::{AcceptMessage, ConnectMessage, ProtocolOffer};
pub use describe::{parse_sql_info, restart_items, DescribeProgress, DESCRIBE_BIND_ITEMS, DESCRIBE_SELECT_ITEMS};
pub use execute::{read_sql_response, ExecImmediateMessage, ExecuteMessage, InputRow};
pub use fetch::{read_fetch_rows, FetchMessage, FetchOutcome};
pub use info::{
    parse_blob_info, parse_database_info, parse_sql_counts, BlobInfo, DatabaseInfo, InfoMessage, ATTACH_INFO_ITEMS,
    BLOB_INFO_ITEMS, SQL_COUNTS_ITEMS,
};
pub use response::{read_status_vector, Response};

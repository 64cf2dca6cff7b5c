#![warn(missing_docs)]

//! # firebird-wire
//!
//! A pure Rust implementation of the Firebird/InterBase GDS wire protocol.
//! No native client library is required.
//!
//! The crate is the protocol engine under a database driver: it attaches to
//! a database, runs transactions, prepares and executes statements, fetches
//! rows and streams blob segments. Column values travel as raw wire bytes;
//! converting them to host types is left to the layer above.
//!
//! ## Features
//!
//! - **Pure Rust** - speaks the protocol directly over TCP
//! - **Async/await** - built on Tokio
//! - **Pluggable transport** - any [`transport::Transport`] can carry the protocol
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use firebird_wire::{Attachment, Config, FreeOption, TransactionParameters};
//!
//! #[tokio::main]
//! async fn main() -> firebird_wire::Result<()> {
//!     let mut config: Config = "localhost:/data/employee.fdb".parse()?;
//!     config.set_username("SYSDBA");
//!     config.set_password("masterkey");
//!     let db = Attachment::attach(&config).await?;
//!
//!     let mut tx = db.start_transaction(&TransactionParameters::default()).await?;
//!     let mut stmt = db.allocate_statement().await?;
//!     stmt.prepare(&tx, "SELECT EMP_NO, FIRST_NAME FROM EMPLOYEE", 3).await?;
//!     stmt.execute(&tx, &[]).await?;
//!
//!     while !stmt.all_rows_fetched() {
//!         stmt.fetch(100).await?;
//!         while let Some(row) = stmt.next_row() {
//!             println!("{:?}", row.get(1));
//!         }
//!     }
//!
//!     stmt.free(FreeOption::Drop).await?;
//!     tx.commit().await?;
//!     db.detach().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! One attachment is one ordered byte stream. Every call on the attachment
//! and on its transactions, statements and blobs takes the attachment's lock
//! for the whole request and response, so callers on different tasks queue.
//!
//! ## Errors
//!
//! Failures are reported as [`Error`]:
//!
//! - network faults invalidate the attachment ([`Error::is_network_error`])
//! - illegal state transitions are detected locally and send nothing
//!   ([`Error::is_state_violation`])
//! - server status vectors arrive as [`Error::Server`] with the full chain;
//!   warning-only chains are collected by [`Attachment::warnings`]

pub mod attachment;
pub mod blob;
pub mod buffer;
pub mod clumplet;
pub mod config;
pub mod constants;
pub mod descriptor;
pub mod error;
pub mod messages;
pub mod row;
pub mod statement;
pub mod transaction;
pub mod transport;

// Re-export commonly used types
pub use attachment::{Attachment, AttachmentState, ServerInfo};
pub use blob::{Blob, BlobParameters};
pub use clumplet::{BlockKind, Clumplet, ParameterBlock};
pub use config::Config;
pub use constants::FreeOption;
pub use descriptor::{FieldDescriptor, RowDescriptor};
pub use error::{Error, GdsError, Result};
pub use messages::{BlobInfo, InputRow};
pub use row::Row;
pub use statement::{SqlCounts, Statement, StatementState, StatementType};
pub use transaction::{Transaction, TransactionParameters, TransactionState};
pub use transport::{TcpTransport, Transport};

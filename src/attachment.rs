//! Database attachment
//!
//! This module provides the [`Attachment`] type: one server connection bound
//! to one database, and the factory for the transactions, statements and
//! blobs that run over it.
//!
//! # Example
//!
//! ```rust,no_run
//! use firebird_wire::{Attachment, Config, FreeOption, TransactionParameters};
//!
//! # async fn example() -> firebird_wire::Result<()> {
//! let config = Config::new("localhost", "employee", "SYSDBA", "masterkey");
//! let attachment = Attachment::attach(&config).await?;
//!
//! let mut tx = attachment.start_transaction(&TransactionParameters::concurrency()).await?;
//! let mut stmt = attachment.allocate_statement().await?;
//! stmt.prepare(&tx, "SELECT A, B FROM T", 3).await?;
//! stmt.execute(&tx, &[]).await?;
//! while !stmt.all_rows_fetched() {
//!     stmt.fetch(100).await?;
//!     while let Some(row) = stmt.next_row() {
//!         println!("{:?}", row.get(0));
//!     }
//! }
//! stmt.free(FreeOption::Drop).await?;
//! tx.commit().await?;
//! attachment.detach().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use indexmap::{IndexMap, IndexSet};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::blob::{Blob, BlobParameters};
use crate::buffer::WriteBuffer;
use crate::config::Config;
use crate::constants::{dpb, Opcode, INFO_BUFFER_SIZE};
use crate::descriptor::RowDescriptor;
use crate::error::{Error, GdsError, Result};
use crate::messages::{
    parse_database_info, read_sql_response, AcceptMessage, BlobOpenMessage, ConnectMessage, ExecImmediateMessage,
    InfoMessage, InputRow, Response, ATTACH_INFO_ITEMS,
};
use crate::row::Row;
use crate::statement::Statement;
use crate::transaction::{Transaction, TransactionParameters};
use crate::transport::{TcpTransport, Transport, WireChannel};

/// Attachment state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    /// Connected, database not yet attached
    Unattached,
    /// Attached and usable
    Attached,
    /// Detached, dropped or lost; terminal
    Detached,
}

/// Server and database properties learned while attaching
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    /// Negotiated protocol version
    pub protocol_version: i32,
    /// Negotiated architecture
    pub architecture: i32,
    /// SQL dialect of the database
    pub dialect: i32,
    /// Engine version string
    pub version: String,
    /// On-disk structure major version
    pub ods_major: i32,
    /// On-disk structure minor version
    pub ods_minor: i32,
}

/// Non-owning reference held by transactions, statements and blobs
pub(crate) type AttachmentRef = Weak<Mutex<AttachmentInner>>;

/// State shared by an attachment and its handles.
///
/// Every wire exchange holds the lock for the whole request and response.
pub(crate) struct AttachmentInner {
    channel: Option<WireChannel>,
    state: AttachmentState,
    object_id: i32,
    server_info: ServerInfo,
    /// Open transactions by object id, each with its open blobs
    transactions: IndexMap<i32, IndexSet<i32>>,
    warnings: Vec<GdsError>,
    /// A request went out and its reply is not fully read yet
    exchange_open: bool,
}

impl AttachmentInner {
    fn new(channel: WireChannel) -> Self {
        Self {
            channel: Some(channel),
            state: AttachmentState::Unattached,
            object_id: 0,
            server_info: ServerInfo::default(),
            transactions: IndexMap::new(),
            warnings: Vec::new(),
            exchange_open: false,
        }
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.state == AttachmentState::Attached && self.channel.is_some()
    }

    pub(crate) fn object_id(&self) -> i32 {
        self.object_id
    }

    pub(crate) fn channel(&mut self) -> Result<&mut WireChannel> {
        self.channel.as_mut().ok_or(Error::NotAttached)
    }

    /// Close an exchange: invalidate the attachment when `result` leaves the
    /// stream out of step, otherwise mark the stream idle again
    pub(crate) fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Err(e) if e.is_stream_fatal() => {
                tracing::warn!(error = %e, "stream fault, attachment invalidated");
                self.invalidate();
            }
            _ => self.exchange_open = false,
        }
        result
    }

    /// Invalidate the attachment if the last exchange never completed.
    ///
    /// A caller that drops a future mid-exchange leaves unread reply bytes on
    /// the stream; nothing after that can be decoded.
    pub(crate) fn settle(&mut self) {
        if self.exchange_open {
            tracing::warn!("exchange abandoned mid-flight, attachment invalidated");
            self.invalidate();
        }
    }

    /// Stage and send one request
    pub(crate) async fn send<F>(&mut self, op: Opcode, write: F) -> Result<()>
    where
        F: FnOnce(&mut WriteBuffer) -> Result<()>,
    {
        let channel = self.channel()?;
        write(channel.begin(op)?)?;
        self.exchange_open = true;
        // Stays open until the reply is read
        let result = self.channel()?.flush().await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => self.check(Err(e)),
        }
    }

    /// Read the generic response, recording any warning chain
    pub(crate) async fn receive(&mut self, op: Option<i32>) -> Result<Response> {
        let result = Response::read(self.channel()?, op).await;
        let mut response = self.check(result)?;
        if let Some(warning) = response.warning.take() {
            tracing::debug!(%warning, "server warning");
            self.warnings.push(warning);
        }
        Ok(response)
    }

    /// One request answered by one generic response
    pub(crate) async fn request<F>(&mut self, op: Opcode, write: F) -> Result<Response>
    where
        F: FnOnce(&mut WriteBuffer) -> Result<()>,
    {
        tracing::debug!(?op, "request");
        self.send(op, write).await?;
        self.receive(None).await
    }

    /// Release a server object identified only by its id
    pub(crate) async fn release(&mut self, op: Opcode, object_id: i32) -> Result<Response> {
        self.request(op, |buf| buf.write_i32(object_id)).await
    }

    /// Information round trip returning the raw buffer
    pub(crate) async fn info(&mut self, message: InfoMessage<'_>) -> Result<Bytes> {
        let response = self.request(message.opcode(), |buf| message.write_body(buf)).await?;
        Ok(response.data)
    }

    pub(crate) fn invalidate(&mut self) {
        self.exchange_open = false;
        self.channel = None;
        self.state = AttachmentState::Detached;
        self.transactions.clear();
    }

    /// Close the transport and invalidate, logging a failed close
    async fn shutdown(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                tracing::warn!(error = %e, "failed to close transport");
            }
        }
        self.invalidate();
    }

    // =========================================================================
    // Open transactions and blobs
    // =========================================================================

    pub(crate) fn register_transaction(&mut self, transaction_id: i32) {
        self.transactions.entry(transaction_id).or_default();
    }

    pub(crate) fn unregister_transaction(&mut self, transaction_id: i32) {
        if let Some(blobs) = self.transactions.shift_remove(&transaction_id) {
            if !blobs.is_empty() {
                tracing::debug!(transaction_id, open_blobs = blobs.len(), "transaction ended with open blobs");
            }
        }
    }

    pub(crate) fn register_blob(&mut self, transaction_id: i32, object_id: i32) {
        self.transactions.entry(transaction_id).or_default().insert(object_id);
    }

    pub(crate) fn unregister_blob(&mut self, transaction_id: i32, object_id: i32) {
        if let Some(blobs) = self.transactions.get_mut(&transaction_id) {
            blobs.shift_remove(&object_id);
        }
    }

    pub(crate) fn has_blob(&self, transaction_id: i32, object_id: i32) -> bool {
        self.transactions
            .get(&transaction_id)
            .is_some_and(|blobs| blobs.contains(&object_id))
    }
}

/// Lock the attachment behind a handle, failing fast when it is gone
pub(crate) async fn lock_attached(attachment: &AttachmentRef) -> Result<OwnedMutexGuard<AttachmentInner>> {
    let inner = attachment.upgrade().ok_or(Error::NotAttached)?;
    let mut guard = inner.lock_owned().await;
    guard.settle();
    if !guard.is_attached() {
        return Err(Error::NotAttached);
    }
    Ok(guard)
}

/// Send the connect request and read the server's answer
async fn handshake(channel: &mut WireChannel, config: &Config) -> Result<AcceptMessage> {
    let msg = ConnectMessage::new(&config.database, &config.client_user, &config.client_host);
    msg.write_body(channel.begin(Opcode::Connect)?)?;
    channel.flush().await?;

    let op = channel.next_operation().await?;
    if op != Opcode::Accept.code() {
        tracing::debug!(op, "connection rejected");
        if let Err(e) = channel.close().await {
            tracing::warn!(error = %e, "failed to close rejected transport");
        }
        return Err(Error::ConnectionRejected(op));
    }

    let accept = AcceptMessage::read(channel).await?;
    tracing::debug!(
        protocol_version = accept.protocol_version,
        architecture = accept.architecture,
        "op_accept"
    );
    Ok(accept)
}

/// A connection attached to one database.
///
/// All operations on the attachment and on the transactions, statements and
/// blobs it creates are serialized through one lock, because the transport is
/// a single ordered byte stream.
///
/// Handles hold a weak reference: once the attachment is detached, dropped or
/// loses its transport, every call on them fails with [`Error::NotAttached`]
/// without touching the wire.
///
/// Dropping a call's future after its request went out (for example through
/// `tokio::time::timeout`) abandons the reply mid-stream, so the attachment
/// is invalidated on the next call.
pub struct Attachment {
    inner: Arc<Mutex<AttachmentInner>>,
    id: u32,
}

// Attachment ID counter
static ATTACHMENT_ID_COUNTER: AtomicU32 = AtomicU32::new(1);

impl Attachment {
    /// Attach to an existing database over TCP
    pub async fn attach(config: &Config) -> Result<Self> {
        config.check_charset()?;
        let mut transport = TcpTransport::new();
        transport.connect_with_config(config).await?;
        Self::attach_with_transport(Box::new(transport), config).await
    }

    /// Create a database over TCP and attach to it
    pub async fn create(config: &Config) -> Result<Self> {
        config.check_charset()?;
        let mut transport = TcpTransport::new();
        transport.connect_with_config(config).await?;
        Self::create_with_transport(Box::new(transport), config).await
    }

    /// Attach over an already connected transport
    pub async fn attach_with_transport(transport: Box<dyn Transport>, config: &Config) -> Result<Self> {
        Self::open(transport, config, false).await
    }

    /// Create a database over an already connected transport
    pub async fn create_with_transport(transport: Box<dyn Transport>, config: &Config) -> Result<Self> {
        Self::open(transport, config, true).await
    }

    async fn open(transport: Box<dyn Transport>, config: &Config, create: bool) -> Result<Self> {
        config.check_charset()?;
        let id = ATTACHMENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut channel = WireChannel::new(transport);
        let accept = handshake(&mut channel, config).await?;

        let mut inner = AttachmentInner::new(channel);
        inner.server_info.protocol_version = accept.protocol_version;
        inner.server_info.architecture = accept.architecture;
        inner.server_info.dialect = config.dialect;

        if let Err(e) = Self::attach_database(&mut inner, config, create).await {
            inner.shutdown().await;
            return Err(e);
        }
        tracing::debug!(id, object_id = inner.object_id, database = %config.database, "attached");

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
            id,
        })
    }

    async fn attach_database(inner: &mut AttachmentInner, config: &Config, create: bool) -> Result<()> {
        let op = if create { Opcode::Create } else { Opcode::Attach };
        let parameters = config.database_parameters().to_bytes()?;
        let response = inner
            .request(op, |buf| {
                buf.write_i32(0)?;
                buf.write_string(&config.database)?;
                buf.write_typed(dpb::VERSION1, Some(&parameters))
            })
            .await?;
        inner.object_id = response.object;
        inner.state = AttachmentState::Attached;

        if !create {
            let object_id = inner.object_id;
            let data = inner
                .info(InfoMessage::database(object_id, &ATTACH_INFO_ITEMS, INFO_BUFFER_SIZE))
                .await?;
            let info = parse_database_info(&data)?;
            let server_info = &mut inner.server_info;
            if let Some(dialect) = info.dialect {
                server_info.dialect = dialect;
            }
            server_info.version = info.version.unwrap_or_default();
            server_info.ods_major = info.ods_major.unwrap_or_default();
            server_info.ods_minor = info.ods_minor.unwrap_or_default();
        }
        Ok(())
    }

    /// Get the attachment ID (local to this process)
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Get the current state
    pub async fn state(&self) -> AttachmentState {
        let mut inner = self.inner.lock().await;
        inner.settle();
        inner.state
    }

    /// Check if the attachment is usable
    pub async fn is_attached(&self) -> bool {
        let mut inner = self.inner.lock().await;
        inner.settle();
        inner.is_attached()
    }

    /// Server object id of the attachment
    pub async fn object_id(&self) -> i32 {
        self.inner.lock().await.object_id
    }

    /// Get server information
    pub async fn server_info(&self) -> ServerInfo {
        self.inner.lock().await.server_info.clone()
    }

    /// Warning chains reported by the server so far
    pub async fn warnings(&self) -> Vec<GdsError> {
        self.inner.lock().await.warnings.clone()
    }

    /// Forget recorded warnings
    pub async fn clear_warnings(&self) {
        self.inner.lock().await.warnings.clear();
    }

    /// Number of started transactions not yet committed or rolled back
    pub async fn open_transaction_count(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.settle();
        inner.transactions.len()
    }

    async fn lock(&self) -> Result<OwnedMutexGuard<AttachmentInner>> {
        let mut guard = self.inner.clone().lock_owned().await;
        guard.settle();
        if !guard.is_attached() {
            return Err(Error::NotAttached);
        }
        Ok(guard)
    }

    fn downgrade(&self) -> AttachmentRef {
        Arc::downgrade(&self.inner)
    }

    /// Detach from the database.
    ///
    /// Refused while transactions are open. Otherwise the transport is closed
    /// and the attachment invalidated even when the server reports an error.
    pub async fn detach(&self) -> Result<()> {
        let mut inner = self.lock().await?;
        let open = inner.transactions.len();
        if open > 0 {
            return Err(Error::OpenTransactions(open));
        }

        let object_id = inner.object_id;
        tracing::debug!(object_id, "op_detach");
        let result = inner.release(Opcode::Detach, object_id).await;
        inner.shutdown().await;
        result.map(drop)
    }

    /// Drop the database and invalidate the attachment
    pub async fn drop_database(&self) -> Result<()> {
        let mut inner = self.lock().await?;
        let object_id = inner.object_id;
        tracing::debug!(object_id, "op_drop_database");
        inner.release(Opcode::DropDatabase, object_id).await?;
        inner.shutdown().await;
        Ok(())
    }

    /// Raw database information request
    pub async fn database_info(&self, items: &[u8], max_len: i32) -> Result<Bytes> {
        let mut inner = self.lock().await?;
        let object_id = inner.object_id;
        inner.info(InfoMessage::database(object_id, items, max_len)).await
    }

    /// Alias of [`Attachment::database_info`]
    pub async fn info(&self, items: &[u8], max_len: i32) -> Result<Bytes> {
        self.database_info(items, max_len).await
    }

    // =========================================================================
    // Handles
    // =========================================================================

    /// A transaction handle in state `None`, ready to start
    pub fn transaction(&self) -> Transaction {
        Transaction::new(self.downgrade())
    }

    /// Start a transaction
    pub async fn start_transaction(&self, parameters: &TransactionParameters) -> Result<Transaction> {
        let mut transaction = self.transaction();
        transaction.start(parameters).await?;
        Ok(transaction)
    }

    /// Allocate a statement handle
    pub async fn allocate_statement(&self) -> Result<Statement> {
        let mut statement = Statement::new(self.downgrade());
        statement.allocate().await?;
        Ok(statement)
    }

    /// Open an existing blob for reading
    pub async fn open_blob(
        &self,
        transaction: &Transaction,
        blob_id: i64,
        parameters: Option<&BlobParameters>,
    ) -> Result<Blob> {
        let transaction_id = transaction.active_id(&self.downgrade(), "open blob in")?;
        let message = BlobOpenMessage::open(transaction_id, blob_id);
        self.open_blob_with(message, transaction_id, Some(blob_id), parameters).await
    }

    /// Create a new blob for writing
    pub async fn create_blob(&self, transaction: &Transaction, parameters: Option<&BlobParameters>) -> Result<Blob> {
        let transaction_id = transaction.active_id(&self.downgrade(), "create blob in")?;
        let message = BlobOpenMessage::create(transaction_id);
        self.open_blob_with(message, transaction_id, None, parameters).await
    }

    async fn open_blob_with(
        &self,
        message: BlobOpenMessage<'_>,
        transaction_id: i32,
        blob_id: Option<i64>,
        parameters: Option<&BlobParameters>,
    ) -> Result<Blob> {
        let encoded = parameters.map(|p| p.to_bytes()).transpose()?;
        let message = match &encoded {
            Some(bytes) => message.with_parameters(bytes),
            None => message,
        };

        let mut inner = self.lock().await?;
        let response = inner.request(message.opcode(), |buf| message.write_body(buf)).await?;
        inner.register_blob(transaction_id, response.object);
        // A created blob gets its id from the server
        let blob_id = blob_id.unwrap_or(response.blob_id);
        tracing::debug!(transaction_id, object_id = response.object, blob_id, "blob opened");
        Ok(Blob::new(self.downgrade(), transaction_id, response.object, blob_id))
    }

    /// Execute SQL text without preparing a statement
    pub async fn execute_immediate(&self, transaction: &Transaction, sql: &str, dialect: i32) -> Result<()> {
        self.execute_immediate2(transaction, sql, dialect, None, None)
            .await
            .map(drop)
    }

    /// Execute SQL text with an optional input row and an optional singleton
    /// output row
    pub async fn execute_immediate2(
        &self,
        transaction: &Transaction,
        sql: &str,
        dialect: i32,
        input: Option<InputRow<'_>>,
        output: Option<&RowDescriptor>,
    ) -> Result<Option<Row>> {
        let transaction_id = transaction.active_id(&self.downgrade(), "execute in")?;
        let mut message = ExecImmediateMessage::new(transaction_id, sql, dialect);
        if let Some(input) = input {
            message = message.with_input(input);
        }
        if let Some(output) = output {
            message = message.with_output(output);
        }

        let mut inner = self.lock().await?;
        tracing::debug!(transaction_id, op = ?message.opcode(), "execute immediate");
        inner.send(message.opcode(), |buf| message.write_body(buf)).await?;

        let result = async {
            let channel = inner.channel()?;
            let mut op = channel.next_operation().await?;
            let mut row = None;
            if op == Opcode::SqlResponse.code() {
                row = read_sql_response(channel, output).await?;
                op = channel.next_operation().await?;
            }
            inner.receive(Some(op)).await?;
            Ok::<_, Error>(row)
        }
        .await;
        inner.check(result)
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment").field("id", &self.id).finish()
    }
}

//! Transactions
//!
//! A [`Transaction`] walks a fixed state machine. Every operation checks the
//! current state before taking the attachment lock, so an illegal call fails
//! with [`Error::TransactionState`] and sends nothing.
//!
//! ```text
//! None --start--> Starting --> Started
//! Started --prepare--> Preparing --> Prepared
//! Started | Prepared --commit--> Committing --> None
//! Started | Prepared --rollback--> RollingBack --> None
//! Started | Prepared --commit_retaining / rollback_retaining--> Started
//! ```

use indexmap::IndexSet;

use crate::attachment::{lock_attached, AttachmentInner, AttachmentRef};
use crate::constants::{tpb, Opcode};
use crate::error::{Error, Result};

/// Transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// Not started, or ended by commit or rollback
    #[default]
    None,
    /// Start request in flight
    Starting,
    /// Active
    Started,
    /// Two-phase prepare in flight
    Preparing,
    /// Prepared for two-phase commit
    Prepared,
    /// Commit in flight
    Committing,
    /// Rollback in flight
    RollingBack,
}

/// Transaction parameter block: an ordered set of option codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionParameters {
    options: IndexSet<u8>,
}

impl TransactionParameters {
    /// An empty parameter set (server defaults)
    pub fn new() -> Self {
        Self {
            options: IndexSet::new(),
        }
    }

    /// Snapshot isolation, read-write, waiting on lock conflicts
    pub fn concurrency() -> Self {
        Self::from_options(&[tpb::WRITE, tpb::CONCURRENCY, tpb::WAIT])
    }

    /// Read committed with record versions, read-write, waiting
    pub fn read_committed() -> Self {
        Self::from_options(&[tpb::WRITE, tpb::READ_COMMITTED, tpb::REC_VERSION, tpb::WAIT])
    }

    /// Table-stability isolation, read-write, waiting
    pub fn consistency() -> Self {
        Self::from_options(&[tpb::WRITE, tpb::CONSISTENCY, tpb::WAIT])
    }

    /// Build from raw option codes, keeping the first occurrence of each
    pub fn from_options(options: &[u8]) -> Self {
        Self {
            options: options.iter().copied().collect(),
        }
    }

    /// Add an option code
    pub fn with(mut self, option: u8) -> Self {
        self.options.insert(option);
        self
    }

    /// Remove an option code
    pub fn without(mut self, option: u8) -> Self {
        self.options.shift_remove(&option);
        self
    }

    /// Check if an option is present
    pub fn contains(&self, option: u8) -> bool {
        self.options.contains(&option)
    }

    /// Option codes in insertion order
    pub fn to_vec(&self) -> Vec<u8> {
        self.options.iter().copied().collect()
    }
}

impl Default for TransactionParameters {
    fn default() -> Self {
        Self::concurrency()
    }
}

/// A transaction on an attachment
#[derive(Debug)]
pub struct Transaction {
    id: i32,
    state: TransactionState,
    attachment: AttachmentRef,
}

impl Transaction {
    pub(crate) fn new(attachment: AttachmentRef) -> Self {
        Self {
            id: 0,
            state: TransactionState::None,
            attachment,
        }
    }

    /// Server object id (0 until started)
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Current state
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Check if the transaction is started and not prepared
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Started
    }

    fn require(&self, allowed: &[TransactionState], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::TransactionState {
                state: self.state,
                operation,
            })
        }
    }

    /// Object id for work on `attachment`, which must own this transaction
    pub(crate) fn active_id(&self, attachment: &AttachmentRef, operation: &'static str) -> Result<i32> {
        self.require(&[TransactionState::Started], operation)?;
        if !self.attachment.ptr_eq(attachment) {
            return Err(Error::StatementState(
                "transaction belongs to a different attachment".to_string(),
            ));
        }
        Ok(self.id)
    }

    async fn lock(&self) -> Result<tokio::sync::OwnedMutexGuard<AttachmentInner>> {
        lock_attached(&self.attachment).await
    }

    /// Start the transaction
    pub async fn start(&mut self, parameters: &TransactionParameters) -> Result<()> {
        self.require(&[TransactionState::None], "start")?;
        let mut inner = self.lock().await?;

        self.state = TransactionState::Starting;
        let database_id = inner.object_id();
        let options = parameters.to_vec();
        let result = inner
            .request(Opcode::Transaction, |buf| {
                buf.write_i32(database_id)?;
                buf.write_set(tpb::VERSION3, &options)
            })
            .await;

        match result {
            Ok(response) => {
                self.id = response.object;
                self.state = TransactionState::Started;
                inner.register_transaction(self.id);
                tracing::debug!(transaction_id = self.id, "transaction started");
                Ok(())
            }
            Err(e) => {
                self.state = TransactionState::None;
                Err(e)
            }
        }
    }

    /// Commit and end the transaction
    pub async fn commit(&mut self) -> Result<()> {
        self.finish(Opcode::Commit, TransactionState::Committing, "commit").await
    }

    /// Roll back and end the transaction
    pub async fn rollback(&mut self) -> Result<()> {
        self.finish(Opcode::Rollback, TransactionState::RollingBack, "rollback").await
    }

    async fn finish(&mut self, op: Opcode, interim: TransactionState, operation: &'static str) -> Result<()> {
        self.require(&[TransactionState::Started, TransactionState::Prepared], operation)?;
        let mut inner = self.lock().await?;

        self.state = interim;
        let result = inner.release(op, self.id).await;
        // The transaction is gone from the open set whatever the outcome
        inner.unregister_transaction(self.id);
        self.state = TransactionState::None;
        tracing::debug!(transaction_id = self.id, ok = result.is_ok(), "transaction {}", operation);
        result.map(drop)
    }

    /// Commit and keep the transaction running
    pub async fn commit_retaining(&mut self) -> Result<()> {
        self.retain(Opcode::CommitRetaining, TransactionState::Committing, "commit_retaining")
            .await
    }

    /// Roll back and keep the transaction running
    pub async fn rollback_retaining(&mut self) -> Result<()> {
        self.retain(Opcode::RollbackRetaining, TransactionState::RollingBack, "rollback_retaining")
            .await
    }

    async fn retain(&mut self, op: Opcode, interim: TransactionState, operation: &'static str) -> Result<()> {
        self.require(&[TransactionState::Started, TransactionState::Prepared], operation)?;
        let mut inner = self.lock().await?;

        let prior = self.state;
        self.state = interim;
        match inner.release(op, self.id).await {
            Ok(_) => {
                self.state = TransactionState::Started;
                Ok(())
            }
            Err(e) => {
                self.state = prior;
                Err(e)
            }
        }
    }

    /// First phase of a two-phase commit
    pub async fn prepare(&mut self) -> Result<()> {
        self.require(&[TransactionState::Started], "prepare")?;
        let mut inner = self.lock().await?;

        self.state = TransactionState::Preparing;
        let result = inner.release(Opcode::Prepare, self.id).await;
        self.state = if result.is_ok() {
            TransactionState::Prepared
        } else {
            TransactionState::Started
        };
        result.map(drop)
    }

    /// First phase of a two-phase commit, recording `message` with the
    /// prepared transaction
    pub async fn prepare_with_message(&mut self, message: &[u8]) -> Result<()> {
        self.require(&[TransactionState::Started], "prepare")?;
        let mut inner = self.lock().await?;

        self.state = TransactionState::Preparing;
        let id = self.id;
        let result = inner
            .request(Opcode::Prepare2, |buf| {
                buf.write_i32(id)?;
                buf.write_buffer(message)
            })
            .await;
        self.state = if result.is_ok() {
            TransactionState::Prepared
        } else {
            TransactionState::Started
        };
        result.map(drop)
    }
}

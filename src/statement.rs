//! SQL statement handling
//!
//! This module provides the [`Statement`] handle and its lifecycle:
//! allocate, prepare, describe, execute, fetch and free.
//!
//! ```text
//! New --allocate--> Allocated --prepare--> Prepared --execute--> Executing
//! Executing --> CursorOpen (rows to fetch) | Prepared (no cursor) | Error
//! CursorOpen --free(close)--> Prepared
//! any --free(drop)--> Dropped
//! ```

use std::collections::VecDeque;

use bytes::Bytes;

use crate::attachment::{lock_attached, AttachmentInner, AttachmentRef};
use crate::constants::{FreeOption, Opcode, COUNTS_BUFFER_SIZE, INFO_BUFFER_SIZE};
use crate::descriptor::RowDescriptor;
use crate::error::{Error, Result};
use crate::messages::{
    parse_sql_counts, parse_sql_info, read_fetch_rows, read_sql_response, restart_items, DescribeProgress,
    ExecuteMessage, FetchMessage, FetchOutcome, InfoMessage, InputRow, DESCRIBE_BIND_ITEMS, DESCRIBE_SELECT_ITEMS,
    SQL_COUNTS_ITEMS,
};
use crate::row::Row;
use crate::transaction::Transaction;

/// Statement type reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementType {
    /// Not reported or not recognized
    #[default]
    Unknown,
    /// SELECT
    Select,
    /// INSERT
    Insert,
    /// UPDATE
    Update,
    /// DELETE
    Delete,
    /// Data definition
    Ddl,
    /// Blob segment read
    GetSegment,
    /// Blob segment write
    PutSegment,
    /// EXECUTE PROCEDURE
    ExecProcedure,
    /// SET TRANSACTION
    StartTransaction,
    /// COMMIT
    Commit,
    /// ROLLBACK
    Rollback,
    /// SELECT ... FOR UPDATE
    SelectForUpdate,
    /// SET GENERATOR
    SetGenerator,
}

impl StatementType {
    /// Decode the `isc_info_sql_stmt_type` value
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => StatementType::Select,
            2 => StatementType::Insert,
            3 => StatementType::Update,
            4 => StatementType::Delete,
            5 => StatementType::Ddl,
            6 => StatementType::GetSegment,
            7 => StatementType::PutSegment,
            8 => StatementType::ExecProcedure,
            9 => StatementType::StartTransaction,
            10 => StatementType::Commit,
            11 => StatementType::Rollback,
            12 => StatementType::SelectForUpdate,
            13 => StatementType::SetGenerator,
            _ => StatementType::Unknown,
        }
    }

    /// Check if the statement produces a cursor
    pub fn is_query(&self) -> bool {
        matches!(self, StatementType::Select | StatementType::SelectForUpdate)
    }
}

/// Affected-row counts and type of an executed statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqlCounts {
    /// Rows selected
    pub selected: i64,
    /// Rows inserted
    pub inserted: i64,
    /// Rows updated
    pub updated: i64,
    /// Rows deleted
    pub deleted: i64,
    /// Statement type
    pub statement_type: StatementType,
}

/// Statement lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementState {
    /// Handle not yet allocated on the server
    #[default]
    New,
    /// Allocated, no SQL prepared
    Allocated,
    /// Prepared and idle
    Prepared,
    /// Execute request in flight
    Executing,
    /// Executed with rows left to fetch
    CursorOpen,
    /// Last execute failed
    Error,
    /// Released with `free(Drop)`
    Dropped,
}

/// A statement handle on an attachment
#[derive(Debug)]
pub struct Statement {
    id: i32,
    state: StatementState,
    attachment: AttachmentRef,
    input: Option<RowDescriptor>,
    output: Option<RowDescriptor>,
    all_rows_fetched: bool,
    singleton: bool,
    rows: VecDeque<Row>,
}

impl Statement {
    pub(crate) fn new(attachment: AttachmentRef) -> Self {
        Self {
            id: 0,
            state: StatementState::New,
            attachment,
            input: None,
            output: None,
            all_rows_fetched: false,
            singleton: false,
            rows: VecDeque::new(),
        }
    }

    /// Server object id
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Current state
    pub fn state(&self) -> StatementState {
        self.state
    }

    /// Parameter descriptor, once described
    pub fn input(&self) -> Option<&RowDescriptor> {
        self.input.as_ref()
    }

    /// Result column descriptor, once prepared or described
    pub fn output(&self) -> Option<&RowDescriptor> {
        self.output.as_ref()
    }

    /// Check if the cursor is exhausted; further fetches send nothing
    pub fn all_rows_fetched(&self) -> bool {
        self.all_rows_fetched
    }

    /// Check if the last execute returned its row inline
    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    /// Number of rows buffered and not yet taken
    pub fn buffered_rows(&self) -> usize {
        self.rows.len()
    }

    /// Take the next buffered row
    pub fn next_row(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    /// Take all buffered rows
    pub fn take_rows(&mut self) -> Vec<Row> {
        self.rows.drain(..).collect()
    }

    fn require_handle(&self, operation: &str) -> Result<()> {
        match self.state {
            StatementState::New | StatementState::Dropped => Err(Error::StatementState(format!(
                "cannot {} a statement in state {:?}",
                operation, self.state
            ))),
            _ => Ok(()),
        }
    }

    fn require_prepared(&self, operation: &str) -> Result<()> {
        match self.state {
            StatementState::Prepared | StatementState::CursorOpen | StatementState::Error => Ok(()),
            _ => Err(Error::StatementState(format!(
                "cannot {} a statement in state {:?}",
                operation, self.state
            ))),
        }
    }

    /// Allocate the server-side handle
    pub(crate) async fn allocate(&mut self) -> Result<()> {
        if self.state != StatementState::New {
            return Err(Error::StatementState("statement already allocated".to_string()));
        }
        let mut inner = lock_attached(&self.attachment).await?;
        let database_id = inner.object_id();
        let response = inner
            .request(Opcode::AllocateStatement, |buf| buf.write_i32(database_id))
            .await?;
        self.id = response.object;
        self.state = StatementState::Allocated;
        tracing::debug!(statement_id = self.id, "statement allocated");
        Ok(())
    }

    /// Prepare SQL text and describe its result columns.
    ///
    /// Previous descriptors and buffered rows are discarded first. Parameter
    /// descriptors are discovered separately with [`Statement::describe_bind`].
    pub async fn prepare(&mut self, transaction: &Transaction, sql: &str, dialect: i32) -> Result<()> {
        self.require_handle("prepare")?;
        let transaction_id = transaction.active_id(&self.attachment, "prepare a statement in")?;
        let mut inner = lock_attached(&self.attachment).await?;

        // A failed prepare leaves an allocated handle with no descriptors
        self.state = StatementState::Allocated;
        self.input = None;
        self.output = None;
        self.rows.clear();
        self.all_rows_fetched = false;
        self.singleton = false;

        let statement_id = self.id;
        tracing::debug!(statement_id, transaction_id, sql, "op_prepare_statement");
        let response = inner
            .request(Opcode::PrepareStatement, |buf| {
                buf.write_i32(transaction_id)?;
                buf.write_i32(statement_id)?;
                buf.write_i32(dialect)?;
                buf.write_string(sql)?;
                buf.write_buffer(&DESCRIBE_SELECT_ITEMS)?;
                buf.write_i32(INFO_BUFFER_SIZE)
            })
            .await?;

        let output = discover(&mut inner, statement_id, &DESCRIBE_SELECT_ITEMS, response.data).await?;
        tracing::debug!(statement_id, columns = output.len(), "statement prepared");
        self.output = Some(output);
        self.state = StatementState::Prepared;
        Ok(())
    }

    /// Describe the result columns of the prepared statement
    pub async fn describe(&mut self) -> Result<&RowDescriptor> {
        self.require_prepared("describe")?;
        let mut inner = lock_attached(&self.attachment).await?;
        let data = inner
            .info(InfoMessage::statement(self.id, &DESCRIBE_SELECT_ITEMS, INFO_BUFFER_SIZE))
            .await?;
        let output = discover(&mut inner, self.id, &DESCRIBE_SELECT_ITEMS, data).await?;
        Ok(self.output.insert(output))
    }

    /// Describe the parameters of the prepared statement
    pub async fn describe_bind(&mut self) -> Result<&RowDescriptor> {
        self.require_prepared("describe")?;
        let mut inner = lock_attached(&self.attachment).await?;
        let data = inner
            .info(InfoMessage::statement(self.id, &DESCRIBE_BIND_ITEMS, INFO_BUFFER_SIZE))
            .await?;
        let input = discover(&mut inner, self.id, &DESCRIBE_BIND_ITEMS, data).await?;
        Ok(self.input.insert(input))
    }

    /// Execute the prepared statement.
    ///
    /// `params` are raw wire values, one per described parameter. A query
    /// leaves a cursor open for [`Statement::fetch`].
    pub async fn execute(&mut self, transaction: &Transaction, params: &[Option<Bytes>]) -> Result<()> {
        self.execute_inner(transaction, params, false).await
    }

    /// Execute and ask for the result row inline (EXECUTE PROCEDURE and
    /// other singleton statements). The row, if any, is buffered.
    pub async fn execute_singleton(&mut self, transaction: &Transaction, params: &[Option<Bytes>]) -> Result<()> {
        self.execute_inner(transaction, params, true).await
    }

    async fn execute_inner(&mut self, transaction: &Transaction, params: &[Option<Bytes>], with_output: bool) -> Result<()> {
        self.require_prepared("execute")?;
        let transaction_id = transaction.active_id(&self.attachment, "execute a statement in")?;

        let input = match &self.input {
            Some(descriptor) if !descriptor.is_empty() => Some(InputRow {
                descriptor,
                values: params,
            }),
            _ if params.is_empty() => None,
            _ => {
                return Err(Error::ParameterCount {
                    expected: 0,
                    actual: params.len(),
                })
            }
        };
        let output = if with_output { self.output.as_ref() } else { None };

        let mut message = ExecuteMessage::new(self.id, transaction_id);
        if let Some(input) = input {
            message = message.with_input(input);
        }
        if let Some(output) = output {
            message = message.with_output(output);
        }

        let mut inner = lock_attached(&self.attachment).await?;
        self.state = StatementState::Executing;
        if output.is_some() {
            self.rows.clear();
        }

        tracing::debug!(statement_id = self.id, transaction_id, op = ?message.opcode(), "execute");
        let result = match inner.send(message.opcode(), |buf| message.write_body(buf)).await {
            Ok(()) => {
                let result = execute_exchange(&mut inner, output).await;
                inner.check(result)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(Some(row)) => {
                self.singleton = true;
                self.all_rows_fetched = true;
                if let Some(row) = row {
                    self.rows.push_back(row);
                }
                self.state = StatementState::Prepared;
                Ok(())
            }
            Ok(None) => {
                self.singleton = false;
                self.all_rows_fetched = false;
                let has_columns = self.output.as_ref().is_some_and(|o| !o.is_empty());
                self.state = if has_columns && !with_output {
                    StatementState::CursorOpen
                } else {
                    StatementState::Prepared
                };
                Ok(())
            }
            Err(e) => {
                self.state = StatementState::Error;
                Err(e)
            }
        }
    }

    /// Fetch up to `batch_size` rows into the row buffer.
    ///
    /// Returns the number of rows added. Once the server reports the cursor
    /// exhausted, further calls return 0 without a request.
    pub async fn fetch(&mut self, batch_size: i32) -> Result<usize> {
        if batch_size <= 0 {
            return Err(Error::InvalidFetchSize(batch_size));
        }
        if self.all_rows_fetched {
            return Ok(0);
        }
        if self.state != StatementState::CursorOpen {
            return Err(Error::StatementState(format!(
                "cannot fetch from a statement in state {:?}",
                self.state
            )));
        }
        let output = self
            .output
            .as_ref()
            .ok_or_else(|| Error::StatementState("statement has no result columns".to_string()))?;

        let mut inner = lock_attached(&self.attachment).await?;
        let message = FetchMessage::new(self.id, output.blr(), batch_size);
        tracing::debug!(statement_id = self.id, batch_size, "op_fetch");
        inner.send(message.opcode(), |buf| message.write_body(buf)).await?;

        let before = self.rows.len();
        let result = fetch_exchange(&mut inner, output.io_lengths(), &mut self.rows).await;
        let outcome = inner.check(result)?;
        let fetched = self.rows.len() - before;
        if outcome == FetchOutcome::Exhausted {
            tracing::debug!(statement_id = self.id, "all rows fetched");
            self.all_rows_fetched = true;
        }
        Ok(fetched)
    }

    /// Release the cursor (`Close`) or the whole statement (`Drop`).
    ///
    /// Closing a singleton statement is a no-op, as is any free once the
    /// attachment is gone. Buffered rows are always discarded.
    pub async fn free(&mut self, option: FreeOption) -> Result<()> {
        self.rows.clear();
        if option == FreeOption::Close && self.singleton {
            return Ok(());
        }
        if matches!(self.state, StatementState::New | StatementState::Dropped) {
            return Ok(());
        }
        let mut inner = match lock_attached(&self.attachment).await {
            Ok(inner) => inner,
            Err(Error::NotAttached) => {
                tracing::debug!(statement_id = self.id, "free skipped, attachment gone");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let statement_id = self.id;
        tracing::debug!(statement_id, ?option, "op_free_statement");
        inner
            .request(Opcode::FreeStatement, |buf| {
                buf.write_i32(statement_id)?;
                buf.write_i32(option as i32)
            })
            .await?;

        match option {
            FreeOption::Close => {
                if self.state == StatementState::CursorOpen {
                    self.state = StatementState::Prepared;
                }
            }
            FreeOption::Drop => {
                self.input = None;
                self.output = None;
                self.state = StatementState::Dropped;
            }
        }
        Ok(())
    }

    /// Name the statement's cursor for positioned updates
    pub async fn set_cursor_name(&mut self, name: &str) -> Result<()> {
        self.require_handle("name the cursor of")?;
        let mut inner = lock_attached(&self.attachment).await?;
        let mut cursor = Vec::with_capacity(name.len() + 1);
        cursor.extend_from_slice(name.as_bytes());
        cursor.push(0);
        let statement_id = self.id;
        inner
            .request(Opcode::SetCursor, |buf| {
                buf.write_i32(statement_id)?;
                buf.write_buffer(&cursor)?;
                buf.write_i32(0)
            })
            .await?;
        Ok(())
    }

    /// Raw statement information request
    pub async fn info(&self, items: &[u8], max_len: i32) -> Result<Bytes> {
        self.require_handle("query")?;
        let mut inner = lock_attached(&self.attachment).await?;
        inner.info(InfoMessage::statement(self.id, items, max_len)).await
    }

    /// Affected-row counts and statement type
    pub async fn sql_counts(&self) -> Result<SqlCounts> {
        let data = self.info(&SQL_COUNTS_ITEMS, COUNTS_BUFFER_SIZE).await?;
        parse_sql_counts(&data)
    }
}

/// Build a descriptor from a describe response, re-requesting after
/// truncation until the server reports the end
async fn discover(inner: &mut AttachmentInner, statement_id: i32, items: &[u8], first: Bytes) -> Result<RowDescriptor> {
    let mut descriptor = RowDescriptor::new();
    let mut data = first;
    let mut last_index = 0;
    loop {
        match parse_sql_info(&data, &mut descriptor, last_index)? {
            DescribeProgress::Complete => break,
            DescribeProgress::Truncated { last_index: reached } => {
                if reached <= last_index {
                    return Err(Error::InfoBuffer(format!(
                        "describe truncated without progress after column {}",
                        last_index
                    )));
                }
                last_index = reached;
                tracing::debug!(statement_id, last_index, "describe truncated, requesting more");
                let restart = restart_items(last_index, items)?;
                data = inner
                    .info(InfoMessage::statement(statement_id, &restart, INFO_BUFFER_SIZE))
                    .await?;
            }
        }
    }
    descriptor.compile()?;
    Ok(descriptor)
}

/// Read the reply to an execute request. `Some` when the row came inline.
async fn execute_exchange(inner: &mut AttachmentInner, output: Option<&RowDescriptor>) -> Result<Option<Option<Row>>> {
    let channel = inner.channel()?;
    let mut op = channel.next_operation().await?;
    let mut singleton = None;
    if op == Opcode::SqlResponse.code() {
        singleton = Some(read_sql_response(channel, output).await?);
        op = channel.next_operation().await?;
    }
    inner.receive(Some(op)).await?;
    Ok(singleton)
}

async fn fetch_exchange(inner: &mut AttachmentInner, io_lengths: &[i32], rows: &mut VecDeque<Row>) -> Result<FetchOutcome> {
    let channel = inner.channel()?;
    let op = channel.next_operation().await?;
    if op == Opcode::FetchResponse.code() {
        read_fetch_rows(channel, io_lengths, rows).await
    } else {
        inner.receive(Some(op)).await?;
        Ok(FetchOutcome::More)
    }
}

//! Scripted transport shared by the integration tests
//!
//! A [`ScriptedTransport`] replays canned server bytes and records every
//! byte the client sends, so tests can check both sides of an exchange
//! without a server.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use firebird_wire::buffer::WriteBuffer;
use firebird_wire::constants::{info, sql_info, status_arg, Opcode};
use firebird_wire::transport::Transport;
use firebird_wire::{Attachment, Config, Error, Result};

/// Bytes the client has sent so far
#[derive(Debug, Clone, Default)]
pub struct SentLog(Arc<Mutex<Vec<u8>>>);

impl SentLog {
    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }

    /// Bytes sent after `mark`
    pub fn since(&self, mark: usize) -> Vec<u8> {
        self.0.lock().unwrap()[mark..].to_vec()
    }

    /// Big-endian i32 words sent after `mark`
    pub fn words_since(&self, mark: usize) -> Vec<i32> {
        self.since(mark)
            .chunks(4)
            .map(|c| {
                let mut word = [0u8; 4];
                word[..c.len()].copy_from_slice(c);
                i32::from_be_bytes(word)
            })
            .collect()
    }
}

/// Transport that serves a fixed byte script
pub struct ScriptedTransport {
    incoming: Bytes,
    sent: SentLog,
    connected: bool,
    /// Wait forever instead of failing once the script runs out
    stall: bool,
}

impl ScriptedTransport {
    pub fn new(script: ServerScript) -> (Self, SentLog) {
        let sent = SentLog::default();
        let transport = Self {
            incoming: script.into_bytes(),
            sent: sent.clone(),
            connected: true,
            stall: false,
        };
        (transport, sent)
    }

    /// A server that stops answering once the script is used up
    pub fn stalling(script: ServerScript) -> (Self, SentLog) {
        let (mut transport, sent) = Self::new(script);
        transport.stall = true;
        (transport, sent)
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::ConnectionClosed);
        }
        self.sent.0.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    async fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        if self.connected && self.stall && self.incoming.len() < n {
            std::future::pending::<()>().await;
        }
        if !self.connected || self.incoming.len() < n {
            return Err(Error::ConnectionClosed);
        }
        Ok(self.incoming.split_to(n))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }
}

/// Builder for the bytes a server would send
#[derive(Debug, Default)]
pub struct ServerScript {
    buf: WriteBuffer,
}

impl ServerScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn append(mut self, other: ServerScript) -> Self {
        self.buf.write_bytes(other.buf.as_slice()).unwrap();
        self
    }

    pub fn int(mut self, value: i32) -> Self {
        self.buf.write_i32(value).unwrap();
        self
    }

    pub fn raw(mut self, data: &[u8]) -> Self {
        self.buf.write_bytes(data).unwrap();
        self
    }

    pub fn buffer(mut self, data: &[u8]) -> Self {
        self.buf.write_buffer(data).unwrap();
        self
    }

    pub fn op(self, op: Opcode) -> Self {
        self.int(op.code())
    }

    pub fn dummy(self) -> Self {
        self.op(Opcode::Dummy)
    }

    /// `op_accept` for protocol 10
    pub fn accept(self) -> Self {
        self.op(Opcode::Accept).int(10).int(1).int(2)
    }

    /// Successful `op_response`
    pub fn ok(self, object: i32) -> Self {
        self.response(object, 0, &[])
    }

    /// Successful `op_response` with a blob id and data buffer
    pub fn response(self, object: i32, blob_id: i64, data: &[u8]) -> Self {
        let script = self.op(Opcode::Response).int(object);
        let script = script.int((blob_id >> 32) as i32).int(blob_id as i32);
        script.buffer(data).int(status_arg::END)
    }

    /// `op_response` carrying one error code
    pub fn error(self, code: i32) -> Self {
        self.op(Opcode::Response)
            .int(0)
            .int(0)
            .int(0)
            .int(0)
            .int(status_arg::GDS)
            .int(code)
            .int(status_arg::END)
    }

    /// `op_response` carrying one warning code
    pub fn warning(self, object: i32, code: i32) -> Self {
        self.op(Opcode::Response)
            .int(object)
            .int(0)
            .int(0)
            .int(0)
            .int(status_arg::WARNING)
            .int(code)
            .int(status_arg::END)
    }

    /// Attach answered, followed by an empty database info reply
    pub fn attached(self, object: i32) -> Self {
        self.ok(object).response(0, 0, &[1])
    }

    /// A fixed-width column value with its indicator
    pub fn fixed(mut self, value: &[u8]) -> Self {
        self.buf.write_bytes(value).unwrap();
        self.int(0)
    }

    /// A varying column value with its indicator
    pub fn varying(self, value: &[u8]) -> Self {
        self.buffer(value).int(0)
    }

    /// One `op_fetch_response` batch header
    pub fn fetch_header(self, status: i32, messages: i32) -> Self {
        self.op(Opcode::FetchResponse).int(status).int(messages)
    }
}

pub fn test_config() -> Config {
    Config::new("localhost", "/data/test.fdb", "SYSDBA", "masterkey").client("tester", "ws1")
}

/// Attach over a script that starts with the handshake and attach replies
pub async fn attach(script: ServerScript) -> (Attachment, SentLog) {
    let (transport, sent) = ScriptedTransport::new(ServerScript::new().accept().attached(1).append(script));
    let attachment = Attachment::attach_with_transport(Box::new(transport), &test_config())
        .await
        .expect("attach");
    (attachment, sent)
}

/// Like [`attach`], but the server goes silent after the script
pub async fn attach_stalling(script: ServerScript) -> (Attachment, SentLog) {
    let (transport, sent) = ScriptedTransport::stalling(ServerScript::new().accept().attached(1).append(script));
    let attachment = Attachment::attach_with_transport(Box::new(transport), &test_config())
        .await
        .expect("attach");
    (attachment, sent)
}

/// Header of a describe reply: select or bind item, describe_vars, count
pub fn describe_header(item: u8, count: u8) -> Vec<u8> {
    vec![item, sql_info::DESCRIBE_VARS, 1, 0, count]
}

/// One fully described column, `describe_end` included
pub fn describe_column(seq: u8, sql_type: i32, length: u8, name: &str) -> Vec<u8> {
    let ty = (sql_type as u16).to_le_bytes();
    let mut out = vec![sql_info::SQLDA_SEQ, 1, 0, seq];
    out.extend_from_slice(&[sql_info::TYPE, 2, 0, ty[0], ty[1]]);
    out.extend_from_slice(&[sql_info::SUB_TYPE, 1, 0, 0]);
    out.extend_from_slice(&[sql_info::SCALE, 1, 0, 0]);
    out.extend_from_slice(&[sql_info::LENGTH, 1, 0, length]);
    out.extend_from_slice(&[sql_info::FIELD, name.len() as u8, 0]);
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(&[sql_info::RELATION, 1, 0, b'T']);
    out.extend_from_slice(&[sql_info::OWNER, 6, 0]);
    out.extend_from_slice(b"SYSDBA");
    out.extend_from_slice(&[sql_info::ALIAS, name.len() as u8, 0]);
    out.extend_from_slice(name.as_bytes());
    out.push(sql_info::DESCRIBE_END);
    out
}

/// A complete describe reply
pub fn describe_reply(item: u8, columns: &[(i32, u8, &str)]) -> Vec<u8> {
    let mut out = describe_header(item, columns.len() as u8);
    for (i, (sql_type, length, name)) in columns.iter().enumerate() {
        out.extend(describe_column(i as u8 + 1, *sql_type, *length, name));
    }
    out.push(info::END);
    out
}

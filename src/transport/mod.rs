//! Transport layer for Firebird connections
//!
//! A [`Transport`] moves raw bytes to and from the server. [`WireChannel`]
//! layers the octet codec on top of it: requests are staged in a write buffer
//! and flushed as one write, responses are decoded field by field straight
//! from the transport.

mod channel;
mod tcp;

pub use channel::WireChannel;
pub use tcp::TcpTransport;

use bytes::Bytes;

use crate::error::Result;

/// Trait for transport implementations.
///
/// The engine only needs an ordered duplex byte stream. Implementations other
/// than [`TcpTransport`] can delegate to a native client library or replay
/// scripted bytes in tests.
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Send raw bytes to the server and flush them
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read exactly `n` bytes from the server
    async fn read_exact(&mut self, n: usize) -> Result<Bytes>;

    /// Check if the transport is connected
    fn is_connected(&self) -> bool;

    /// Close the connection
    async fn close(&mut self) -> Result<()>;
}

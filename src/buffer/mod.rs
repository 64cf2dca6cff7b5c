//! Octet codec for the GDS wire protocol
//!
//! This module provides buffer types for reading and writing the protocol's
//! XDR-style primitives: big-endian fixed-width integers and length-prefixed
//! byte buffers padded with zeros to a 4-byte boundary.

mod read;
mod write;

pub use read::ReadBuffer;
pub use write::WriteBuffer;

/// Number of zero bytes that follow a variable-length field of `len` bytes
#[inline]
pub fn padding(len: usize) -> usize {
    (4 - (len & 3)) & 3
}

/// Decode a little-endian "vax" integer of up to 4 bytes.
///
/// Information buffers (database, statement and blob info) encode their
/// values this way regardless of the XDR framing around them.
pub fn vax_integer(bytes: &[u8]) -> i32 {
    let mut value: i32 = 0;
    for (shift, byte) in bytes.iter().take(4).enumerate() {
        value |= (*byte as i32) << (shift * 8);
    }
    value
}

/// Decode a little-endian "vax" integer of up to 8 bytes
pub fn vax_integer_i64(bytes: &[u8]) -> i64 {
    let mut value: i64 = 0;
    for (shift, byte) in bytes.iter().take(8).enumerate() {
        value |= (*byte as i64) << (shift * 8);
    }
    value
}

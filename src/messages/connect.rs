//! Connect message and accept response
//!
//! The connect request names the database, identifies the client user and
//! host, and proposes the protocol versions the client speaks. The server
//! answers with `op_accept` and the version it picked.

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::clumplet::{BlockKind, Clumplet, ParameterBlock};
use crate::constants::{cnct, connect, Opcode};
use crate::error::Result;
use crate::transport::WireChannel;

/// One protocol version proposed by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolOffer {
    /// Protocol version number
    pub version: i32,
    /// Architecture tag
    pub architecture: i32,
    /// Lowest packet type supported
    pub min_type: i32,
    /// Highest packet type supported
    pub max_type: i32,
    /// Preference weight
    pub weight: i32,
}

impl Default for ProtocolOffer {
    fn default() -> Self {
        Self {
            version: connect::PROTOCOL_VERSION10,
            architecture: connect::ARCH_GENERIC,
            min_type: connect::PTYPE_RPC,
            max_type: connect::PTYPE_BATCH_SEND,
            weight: connect::PROTOCOL_WEIGHT,
        }
    }
}

/// Connect request sent when opening a connection
#[derive(Debug, Clone)]
pub struct ConnectMessage {
    database: String,
    user: String,
    host: String,
    offers: Vec<ProtocolOffer>,
}

impl ConnectMessage {
    /// Create a connect message proposing the default protocol
    pub fn new(database: impl Into<String>, user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            user: user.into(),
            host: host.into(),
            offers: vec![ProtocolOffer::default()],
        }
    }

    /// The user identification block: user name, client host and an empty
    /// verification entry
    pub fn user_identification(&self) -> Result<Bytes> {
        ParameterBlock::new(BlockKind::Tagged)
            .with(Clumplet::string(cnct::USER, &self.user))
            .with(Clumplet::string(cnct::HOST, &self.host))
            .with(Clumplet::flag(cnct::USER_VERIFICATION))
            .to_bytes()
    }

    /// Write the request fields that follow the opcode
    pub fn write_body(&self, buf: &mut WriteBuffer) -> Result<()> {
        buf.write_i32(Opcode::Attach.code())?;
        buf.write_i32(connect::CONNECT_VERSION2)?;
        buf.write_i32(connect::ARCH_GENERIC)?;
        buf.write_string(&self.database)?;
        buf.write_i32(self.offers.len() as i32)?;
        buf.write_buffer(&self.user_identification()?)?;
        for offer in &self.offers {
            buf.write_i32(offer.version)?;
            buf.write_i32(offer.architecture)?;
            buf.write_i32(offer.min_type)?;
            buf.write_i32(offer.max_type)?;
            buf.write_i32(offer.weight)?;
        }
        Ok(())
    }
}

/// Protocol parameters accepted by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcceptMessage {
    /// Negotiated protocol version
    pub protocol_version: i32,
    /// Negotiated architecture
    pub architecture: i32,
    /// Minimum packet type
    pub min_type: i32,
}

impl AcceptMessage {
    /// Read the accept fields that follow an `op_accept` opcode
    pub async fn read(channel: &mut WireChannel) -> Result<Self> {
        let protocol_version = channel.read_i32().await?;
        let architecture = channel.read_i32().await?;
        let min_type = channel.read_i32().await?;
        Ok(Self {
            protocol_version,
            architecture,
            min_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_identification() {
        let msg = ConnectMessage::new("/db/test.fdb", "bob", "ws1");
        assert_eq!(
            &msg.user_identification().unwrap()[..],
            &[1, 3, b'b', b'o', b'b', 4, 3, b'w', b's', b'1', 6, 0]
        );
    }

    #[test]
    fn test_connect_layout() {
        let msg = ConnectMessage::new("ab", "u", "h");
        let mut buf = WriteBuffer::new();
        msg.write_body(&mut buf).unwrap();

        let expected: Vec<u8> = [
            vec![0, 0, 0, 19], // op_attach
            vec![0, 0, 0, 2],  // connect version
            vec![0, 0, 0, 1],  // arch_generic
            vec![0, 0, 0, 2, b'a', b'b', 0, 0],
            vec![0, 0, 0, 1], // one offer
            vec![0, 0, 0, 8, 1, 1, b'u', 4, 1, b'h', 6, 0],
            vec![0, 0, 0, 10, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 2],
        ]
        .concat();
        assert_eq!(buf.as_slice(), &expected[..]);
    }
}

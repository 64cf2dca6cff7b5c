//! Parameter blocks (clumplets)
//!
//! Database and blob parameter blocks are ordered sequences of
//! tag-length-value entries called clumplets. The version byte that opens a
//! block on the wire is written by [`WriteBuffer::write_typed`], so the bytes
//! produced here carry only the entries.
//!
//! # Example
//!
//! ```rust
//! use firebird_wire::clumplet::{BlockKind, Clumplet, ParameterBlock};
//! use firebird_wire::constants::dpb;
//!
//! let mut block = ParameterBlock::new(BlockKind::Tagged);
//! block
//!     .push(Clumplet::string(dpb::USER_NAME, "SYSDBA"))
//!     .push(Clumplet::int(dpb::SQL_DIALECT, 3));
//!
//! let bytes = block.to_bytes().unwrap();
//! let parsed = ParameterBlock::parse(BlockKind::Tagged, &bytes).unwrap();
//! assert_eq!(parsed, block);
//! ```

use bytes::Bytes;

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::error::{Error, Result};

/// How entry lengths are encoded in a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockKind {
    /// One length byte per entry (DPB, BPB)
    #[default]
    Tagged,
    /// Four-byte little-endian length per entry
    Wide,
}

impl BlockKind {
    fn max_content(self) -> usize {
        match self {
            BlockKind::Tagged => u8::MAX as usize,
            BlockKind::Wide => i32::MAX as usize,
        }
    }
}

/// One tagged entry of a parameter block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clumplet {
    tag: u8,
    content: Bytes,
}

impl Clumplet {
    /// An entry with no content
    pub fn flag(tag: u8) -> Self {
        Self {
            tag,
            content: Bytes::new(),
        }
    }

    /// An entry holding a 4-byte little-endian integer
    pub fn int(tag: u8, value: i32) -> Self {
        Self {
            tag,
            content: Bytes::copy_from_slice(&value.to_le_bytes()),
        }
    }

    /// An entry holding string bytes
    pub fn string(tag: u8, value: &str) -> Self {
        Self {
            tag,
            content: Bytes::copy_from_slice(value.as_bytes()),
        }
    }

    /// An entry holding raw bytes
    pub fn bytes(tag: u8, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            content: value.into(),
        }
    }

    /// An entry whose content is another encoded block
    pub fn nested(tag: u8, block: &ParameterBlock) -> Result<Self> {
        Ok(Self {
            tag,
            content: block.to_bytes()?,
        })
    }

    /// The entry tag
    #[inline]
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// The raw entry content
    #[inline]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Content read as a little-endian integer of up to 4 bytes
    pub fn as_int(&self) -> Option<i32> {
        if self.content.len() > 4 {
            return None;
        }
        Some(crate::buffer::vax_integer(&self.content))
    }

    /// Content read as UTF-8 text
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }

    /// Content decoded as a nested block
    pub fn as_block(&self, kind: BlockKind) -> Result<ParameterBlock> {
        ParameterBlock::parse(kind, &self.content)
    }
}

/// An ordered sequence of clumplets
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParameterBlock {
    kind: BlockKind,
    items: Vec<Clumplet>,
}

impl ParameterBlock {
    /// Create an empty block
    pub fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
        }
    }

    /// Append an entry
    pub fn push(&mut self, clumplet: Clumplet) -> &mut Self {
        self.items.push(clumplet);
        self
    }

    /// Append an entry, builder style
    pub fn with(mut self, clumplet: Clumplet) -> Self {
        self.items.push(clumplet);
        self
    }

    /// Length encoding of this block
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the block has no entries
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate entries in order
    pub fn iter(&self) -> impl Iterator<Item = &Clumplet> {
        self.items.iter()
    }

    /// First entry with the given tag
    pub fn get(&self, tag: u8) -> Option<&Clumplet> {
        self.items.iter().find(|c| c.tag == tag)
    }

    /// Check whether any entry has the given tag
    pub fn contains(&self, tag: u8) -> bool {
        self.get(tag).is_some()
    }

    /// Remove every entry with the given tag
    pub fn remove(&mut self, tag: u8) {
        self.items.retain(|c| c.tag != tag);
    }

    /// Encode the entries
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(self.encoded_len());
        for item in &self.items {
            if item.content.len() > self.kind.max_content() {
                return Err(Error::ClumpletTooLong {
                    tag: item.tag,
                    len: item.content.len(),
                });
            }
            buf.write_u8(item.tag)?;
            match self.kind {
                BlockKind::Tagged => buf.write_u8(item.content.len() as u8)?,
                BlockKind::Wide => buf.write_bytes(&(item.content.len() as u32).to_le_bytes())?,
            }
            buf.write_bytes(&item.content)?;
        }
        Ok(buf.freeze())
    }

    fn encoded_len(&self) -> usize {
        let header = match self.kind {
            BlockKind::Tagged => 2,
            BlockKind::Wide => 5,
        };
        self.items.iter().map(|c| header + c.content.len()).sum()
    }

    /// Decode entries previously produced by [`ParameterBlock::to_bytes`]
    pub fn parse(kind: BlockKind, data: &[u8]) -> Result<Self> {
        let mut buf = ReadBuffer::from_slice(data);
        let mut items = Vec::new();
        while buf.remaining() > 0 {
            let tag = buf.read_u8()?;
            let len = match kind {
                BlockKind::Tagged => buf.read_u8()? as usize,
                BlockKind::Wide => buf.read_vax(4)? as u32 as usize,
            };
            let content = buf.read_bytes(len)?;
            items.push(Clumplet { tag, content });
        }
        Ok(Self { kind, items })
    }
}

impl<'a> IntoIterator for &'a ParameterBlock {
    type Item = &'a Clumplet;
    type IntoIter = std::slice::Iter<'a, Clumplet>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_encoding() {
        let block = ParameterBlock::new(BlockKind::Tagged)
            .with(Clumplet::string(28, "ab"))
            .with(Clumplet::int(63, 3))
            .with(Clumplet::flag(7));
        assert_eq!(
            &block.to_bytes().unwrap()[..],
            &[28, 2, b'a', b'b', 63, 4, 3, 0, 0, 0, 7, 0]
        );
    }

    #[test]
    fn test_wide_encoding() {
        let block = ParameterBlock::new(BlockKind::Wide).with(Clumplet::bytes(5, vec![1u8, 2]));
        assert_eq!(&block.to_bytes().unwrap()[..], &[5, 2, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn test_tagged_content_too_long() {
        let block = ParameterBlock::new(BlockKind::Tagged).with(Clumplet::bytes(1, vec![0u8; 256]));
        assert!(matches!(
            block.to_bytes(),
            Err(Error::ClumpletTooLong { tag: 1, len: 256 })
        ));
    }

    #[test]
    fn test_parse_truncated() {
        assert!(ParameterBlock::parse(BlockKind::Tagged, &[28, 5, b'a']).is_err());
    }

    #[test]
    fn test_nested_block() {
        let inner = ParameterBlock::new(BlockKind::Tagged).with(Clumplet::int(2, 10));
        let outer = ParameterBlock::new(BlockKind::Tagged)
            .with(Clumplet::nested(90, &inner).unwrap());
        let parsed = ParameterBlock::parse(BlockKind::Tagged, &outer.to_bytes().unwrap()).unwrap();
        let nested = parsed.get(90).unwrap().as_block(BlockKind::Tagged).unwrap();
        assert_eq!(nested, inner);
        assert_eq!(nested.get(2).unwrap().as_int(), Some(10));
    }

    #[test]
    fn test_accessors() {
        let mut block = ParameterBlock::new(BlockKind::Tagged);
        block.push(Clumplet::string(28, "SYSDBA")).push(Clumplet::int(63, -1));
        assert_eq!(block.get(28).unwrap().as_str(), Some("SYSDBA"));
        assert_eq!(block.get(63).unwrap().as_int(), Some(-1));
        block.remove(28);
        assert!(!block.contains(28));
        assert_eq!(block.len(), 1);
    }
}

//! Blob segment channel
//!
//! A [`Blob`] is opened or created through
//! [`Attachment::open_blob`](crate::Attachment::open_blob) and
//! [`Attachment::create_blob`](crate::Attachment::create_blob). It stays
//! usable until it is closed, cancelled, or its transaction ends.

use bytes::{Bytes, BytesMut};

use crate::attachment::{lock_attached, AttachmentInner, AttachmentRef};
use crate::clumplet::{BlockKind, Clumplet, ParameterBlock};
use crate::constants::{bpb, Opcode, INFO_BUFFER_SIZE, MAX_SEGMENT_SIZE};
use crate::error::{Error, Result};
use crate::messages::{
    parse_blob_info, segment_request_length, unpack_segments, BlobInfo, InfoMessage, SegmentStatus, BLOB_INFO_ITEMS,
};

/// Blob parameter block
#[derive(Debug, Clone)]
pub struct BlobParameters {
    block: ParameterBlock,
}

impl BlobParameters {
    /// An empty parameter block
    pub fn new() -> Self {
        Self {
            block: ParameterBlock::new(BlockKind::Tagged),
        }
    }

    /// Request a stream blob instead of a segmented one
    pub fn stream() -> Self {
        Self::new().with(Clumplet::int(bpb::TYPE, bpb::TYPE_STREAM as i32))
    }

    /// Blob subtype of the stored data
    pub fn source_type(self, sub_type: i32) -> Self {
        self.with(Clumplet::int(bpb::SOURCE_TYPE, sub_type))
    }

    /// Blob subtype the server should convert to
    pub fn target_type(self, sub_type: i32) -> Self {
        self.with(Clumplet::int(bpb::TARGET_TYPE, sub_type))
    }

    /// Add an entry, replacing any existing entry with the same tag
    pub fn with(mut self, clumplet: Clumplet) -> Self {
        self.block.remove(clumplet.tag());
        self.block.push(clumplet);
        self
    }

    /// The underlying parameter block
    pub fn block(&self) -> &ParameterBlock {
        &self.block
    }

    /// Encoded entries, without the version byte
    pub fn to_bytes(&self) -> Result<Bytes> {
        self.block.to_bytes()
    }
}

impl Default for BlobParameters {
    fn default() -> Self {
        Self::new()
    }
}

/// An open blob
#[derive(Debug)]
pub struct Blob {
    attachment: AttachmentRef,
    transaction_id: i32,
    object_id: i32,
    blob_id: i64,
    eof: bool,
    /// The last segment read continues in the next response
    partial: bool,
}

impl Blob {
    pub(crate) fn new(attachment: AttachmentRef, transaction_id: i32, object_id: i32, blob_id: i64) -> Self {
        Self {
            attachment,
            transaction_id,
            object_id,
            blob_id,
            eof: false,
            partial: false,
        }
    }

    /// Blob id, to be stored in a blob column
    pub fn blob_id(&self) -> i64 {
        self.blob_id
    }

    /// Server object id
    pub fn object_id(&self) -> i32 {
        self.object_id
    }

    /// Id of the owning transaction
    pub fn transaction_id(&self) -> i32 {
        self.transaction_id
    }

    /// Check if the server reported the end of the blob
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Check if the last segment read was cut short and continues
    pub fn is_partial_segment(&self) -> bool {
        self.partial
    }

    async fn lock(&self) -> Result<tokio::sync::OwnedMutexGuard<AttachmentInner>> {
        let inner = lock_attached(&self.attachment).await?;
        if !inner.has_blob(self.transaction_id, self.object_id) {
            return Err(Error::InvalidBlobHandle);
        }
        Ok(inner)
    }

    /// Read up to `max_len` bytes.
    ///
    /// Several short segments may arrive in one response; they are joined.
    /// Once the end of the blob was reported, returns empty without a request.
    pub async fn get_segment(&mut self, max_len: usize) -> Result<Bytes> {
        if self.eof {
            return Ok(Bytes::new());
        }
        let mut inner = self.lock().await?;
        let object_id = self.object_id;
        let requested = segment_request_length(max_len);
        let response = inner
            .request(Opcode::GetSegment, |buf| {
                buf.write_i32(object_id)?;
                buf.write_i32(requested)?;
                buf.write_buffer(&[])
            })
            .await?;

        let status = SegmentStatus::from_object(response.object);
        self.partial = status == SegmentStatus::Segment;
        if status == SegmentStatus::EofPending {
            tracing::debug!(object_id, "blob eof");
            self.eof = true;
        }
        unpack_segments(&response.data)
    }

    /// Read everything left in the blob
    pub async fn read_to_end(&mut self) -> Result<Bytes> {
        let mut out = BytesMut::new();
        while !self.eof {
            let chunk = self.get_segment(MAX_SEGMENT_SIZE - 2).await?;
            out.extend_from_slice(&chunk);
        }
        Ok(out.freeze())
    }

    /// Write one segment
    pub async fn put_segment(&mut self, segment: &[u8]) -> Result<()> {
        if segment.len() > MAX_SEGMENT_SIZE {
            return Err(Error::SegmentTooLong(segment.len()));
        }
        let mut inner = self.lock().await?;
        let object_id = self.object_id;
        inner
            .request(Opcode::PutSegment, |buf| {
                buf.write_i32(object_id)?;
                buf.write_i32(segment.len() as i32)?;
                buf.write_buffer(segment)
            })
            .await?;
        Ok(())
    }

    /// Write one segment in batch framing
    pub async fn batch_segments(&mut self, segment: &[u8]) -> Result<()> {
        if segment.len() > MAX_SEGMENT_SIZE {
            return Err(Error::SegmentTooLong(segment.len()));
        }
        let mut inner = self.lock().await?;
        let object_id = self.object_id;
        inner
            .request(Opcode::BatchSegments, |buf| {
                buf.write_i32(object_id)?;
                buf.write_blob_buffer(segment)
            })
            .await?;
        Ok(())
    }

    /// Write `data`, split into maximum-size segments
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(MAX_SEGMENT_SIZE) {
            self.put_segment(chunk).await?;
        }
        Ok(())
    }

    /// Raw blob information request
    pub async fn info(&self, items: &[u8], max_len: i32) -> Result<Bytes> {
        let mut inner = self.lock().await?;
        inner.info(InfoMessage::blob(self.object_id, items, max_len)).await
    }

    /// Segment count, sizes and type
    pub async fn blob_info(&self) -> Result<BlobInfo> {
        let data = self.info(&BLOB_INFO_ITEMS, INFO_BUFFER_SIZE).await?;
        parse_blob_info(&data)
    }

    /// Close the blob, committing what was written
    pub async fn close(self) -> Result<()> {
        self.release(Opcode::CloseBlob).await
    }

    /// Discard the blob
    pub async fn cancel(self) -> Result<()> {
        self.release(Opcode::CancelBlob).await
    }

    async fn release(self, op: Opcode) -> Result<()> {
        let mut inner = self.lock().await?;
        let result = inner.release(op, self.object_id).await;
        inner.unregister_blob(self.transaction_id, self.object_id);
        tracing::debug!(object_id = self.object_id, ?op, ok = result.is_ok(), "blob released");
        result.map(drop)
    }
}

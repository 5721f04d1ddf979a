//! Outgoing side of a transfer.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::file::{split_chunks, FileDescriptor};
use crate::protocol::FileOffer;

/// Sender state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// No outgoing file
    Idle,
    /// Offer sent, no chunk requested yet
    Offered,
    /// At least one chunk served
    Sending,
}

/// The one file currently being sent.
#[derive(Debug, Clone)]
pub struct OutgoingTransfer {
    id: Uuid,
    name: String,
    size: u64,
    mime_tag: String,
    chunks: Vec<Vec<u8>>,
    bytes_sent: u64,
    state: SenderState,
}

/// Result of serving one chunk request.
#[derive(Debug)]
pub(crate) struct ServedChunk {
    pub payload: Vec<u8>,
    pub is_last: bool,
}

impl OutgoingTransfer {
    /// Slice a file into chunks of `chunk_size` bytes.
    pub(crate) fn new(file: FileDescriptor, chunk_size: usize) -> Self {
        let chunks = split_chunks(&file.bytes, chunk_size);
        Self {
            id: Uuid::new_v4(),
            name: file.name,
            size: file.size,
            mime_tag: file.mime_tag,
            chunks,
            bytes_sent: 0,
            state: SenderState::Offered,
        }
    }

    /// Transfer id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// File name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared size.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// MIME type or category tag.
    #[must_use]
    pub fn mime_tag(&self) -> &str {
        &self.mime_tag
    }

    /// Number of chunks.
    #[must_use]
    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Bytes served so far.
    #[must_use]
    pub const fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SenderState {
        self.state
    }

    /// The `file_offer` announcing this transfer.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk count does not fit the wire format.
    pub fn offer(&self) -> Result<FileOffer> {
        let total_chunks = u32::try_from(self.chunks.len())
            .map_err(|_| Error::Internal(format!("'{}' has too many chunks", self.name)))?;

        Ok(FileOffer {
            transfer_id: self.id,
            name: self.name.clone(),
            size: self.size,
            mime_tag: self.mime_tag.clone(),
            total_chunks,
        })
    }

    /// Serve a chunk request.
    pub(crate) fn serve(&mut self, chunk_index: u32) -> Result<ServedChunk> {
        let index = chunk_index as usize;
        let total = self.chunks.len();

        let payload = self.chunks.get(index).cloned().ok_or_else(|| {
            Error::ProtocolViolation(format!(
                "chunk {chunk_index} requested, '{}' has {total} chunks",
                self.name
            ))
        })?;

        self.state = SenderState::Sending;
        self.bytes_sent += payload.len() as u64;

        Ok(ServedChunk {
            payload,
            is_last: index + 1 == total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(len: usize) -> OutgoingTransfer {
        let bytes: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
        OutgoingTransfer::new(FileDescriptor::new("data.bin", bytes), 8192)
    }

    #[test]
    fn test_offer_describes_chunks() {
        let outgoing = transfer(20_000);
        let offer = outgoing.offer().expect("offer");

        assert_eq!(offer.transfer_id, outgoing.id());
        assert_eq!(offer.size, 20_000);
        assert_eq!(offer.total_chunks, 3);
        assert_eq!(outgoing.state(), SenderState::Offered);
    }

    #[test]
    fn test_serve_counts_bytes() {
        let mut outgoing = transfer(20_000);

        let first = outgoing.serve(0).expect("serve");
        assert_eq!(first.payload.len(), 8192);
        assert!(!first.is_last);
        assert_eq!(outgoing.state(), SenderState::Sending);

        let last = outgoing.serve(2).expect("serve");
        assert_eq!(last.payload.len(), 3616);
        assert!(last.is_last);
        assert_eq!(outgoing.bytes_sent(), 8192 + 3616);
    }

    #[test]
    fn test_serve_out_of_range() {
        let mut outgoing = transfer(100);
        assert!(matches!(
            outgoing.serve(1),
            Err(Error::ProtocolViolation(_))
        ));
        assert_eq!(outgoing.bytes_sent(), 0);
        assert_eq!(outgoing.state(), SenderState::Offered);
    }
}

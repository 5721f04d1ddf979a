//! Incoming side of a transfer.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::FileOffer;

/// Receiver state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// No incoming file
    Idle,
    /// Offer accepted, chunks arriving
    Awaiting,
    /// Every chunk is in; the file is being written
    Assembling,
}

/// The one file currently being received.
///
/// Chunks live in a fixed-size slot array indexed by chunk number, so a
/// stray or repeated chunk can never shift or replace data already stored.
#[derive(Debug, Clone)]
pub struct IncomingTransfer {
    id: Uuid,
    name: String,
    size: u64,
    mime_tag: String,
    chunks: Vec<Option<Vec<u8>>>,
    received: usize,
    bytes_received: u64,
    outstanding: Option<u32>,
    state: ReceiverState,
}

/// What to do after storing a chunk.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Stored {
    /// Ask the sender for this chunk next
    Request(u32),
    /// Kept for later; the outstanding request is still in flight
    Buffered,
    /// Every slot is filled
    Complete,
}

impl IncomingTransfer {
    pub(crate) fn from_offer(offer: &FileOffer) -> Self {
        Self {
            id: offer.transfer_id,
            name: offer.name.clone(),
            size: offer.size,
            mime_tag: offer.mime_tag.clone(),
            chunks: vec![None; offer.total_chunks as usize],
            received: 0,
            bytes_received: 0,
            outstanding: None,
            state: ReceiverState::Awaiting,
        }
    }

    /// Transfer id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// File name from the offer.
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

    /// Number of chunks announced by the sender.
    #[must_use]
    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Number of distinct chunks stored.
    #[must_use]
    pub const fn received_chunks(&self) -> usize {
        self.received
    }

    /// Bytes stored so far.
    #[must_use]
    pub const fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Index of the request currently in flight.
    #[must_use]
    pub const fn outstanding(&self) -> Option<u32> {
        self.outstanding
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ReceiverState {
        self.state
    }

    /// Whether every chunk has arrived.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.received == self.chunks.len()
    }

    /// First request to issue after accepting the offer.
    pub(crate) fn first_request(&mut self) -> Stored {
        if self.is_complete() {
            return Stored::Complete;
        }
        self.outstanding = Some(0);
        Stored::Request(0)
    }

    /// Store one chunk.
    pub(crate) fn store(&mut self, chunk_index: u32, payload: Vec<u8>) -> Result<Stored> {
        if self.state != ReceiverState::Awaiting {
            return Err(Error::ProtocolViolation(format!(
                "chunk {chunk_index} for '{}' arrived while assembling",
                self.name
            )));
        }

        let total = self.chunks.len();
        let slot = self
            .chunks
            .get_mut(chunk_index as usize)
            .ok_or_else(|| {
                Error::ProtocolViolation(format!(
                    "chunk {chunk_index} is out of range for '{}' ({total} chunks)",
                    self.name
                ))
            })?;

        if slot.is_some() {
            return Err(Error::ProtocolViolation(format!(
                "chunk {chunk_index} of '{}' was already received",
                self.name
            )));
        }

        let len = payload.len() as u64;
        if self.bytes_received + len > self.size {
            return Err(Error::ProtocolViolation(format!(
                "chunk {chunk_index} of '{}' overruns the declared {} bytes",
                self.name, self.size
            )));
        }

        self.bytes_received += len;
        *slot = Some(payload);
        self.received += 1;

        if self.is_complete() {
            self.outstanding = None;
            return Ok(Stored::Complete);
        }

        if self.outstanding != Some(chunk_index) {
            tracing::debug!(
                "Buffered out-of-order chunk {} of '{}' (waiting for {:?})",
                chunk_index,
                self.name,
                self.outstanding
            );
            return Ok(Stored::Buffered);
        }

        let next = self
            .chunks
            .iter()
            .position(Option::is_none)
            .and_then(|i| u32::try_from(i).ok())
            .ok_or_else(|| Error::Internal("incomplete transfer has no free slot".to_string()))?;
        self.outstanding = Some(next);
        Ok(Stored::Request(next))
    }

    /// Concatenate every chunk in index order and enter `Assembling`.
    pub(crate) fn assemble(&mut self) -> Vec<u8> {
        self.state = ReceiverState::Assembling;
        self.chunks.drain(..).flatten().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(size: u64, total_chunks: u32) -> FileOffer {
        FileOffer {
            transfer_id: Uuid::new_v4(),
            name: "data.bin".to_string(),
            size,
            mime_tag: "application/octet-stream".to_string(),
            total_chunks,
        }
    }

    #[test]
    fn test_in_order_requests() {
        let mut incoming = IncomingTransfer::from_offer(&offer(5, 3));

        assert_eq!(incoming.first_request(), Stored::Request(0));
        assert_eq!(incoming.store(0, vec![1, 2]).expect("store"), Stored::Request(1));
        assert_eq!(incoming.store(1, vec![3, 4]).expect("store"), Stored::Request(2));
        assert_eq!(incoming.store(2, vec![5]).expect("store"), Stored::Complete);

        assert_eq!(incoming.bytes_received(), 5);
        assert_eq!(incoming.assemble(), vec![1, 2, 3, 4, 5]);
        assert_eq!(incoming.state(), ReceiverState::Assembling);
    }

    #[test]
    fn test_stray_chunk_is_buffered() {
        let mut incoming = IncomingTransfer::from_offer(&offer(4, 4));
        incoming.first_request();

        assert_eq!(incoming.store(2, vec![30]).expect("store"), Stored::Buffered);
        assert_eq!(incoming.outstanding(), Some(0));

        assert_eq!(incoming.store(0, vec![10]).expect("store"), Stored::Request(1));
        assert_eq!(incoming.store(1, vec![20]).expect("store"), Stored::Request(3));
        assert_eq!(incoming.store(3, vec![40]).expect("store"), Stored::Complete);

        assert_eq!(incoming.assemble(), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_duplicate_chunk_does_not_overwrite() {
        let mut incoming = IncomingTransfer::from_offer(&offer(2, 2));
        incoming.first_request();
        incoming.store(0, vec![1]).expect("store");

        assert!(matches!(
            incoming.store(0, vec![9]),
            Err(Error::ProtocolViolation(_))
        ));
        assert_eq!(incoming.received_chunks(), 1);
        assert_eq!(incoming.bytes_received(), 1);

        incoming.store(1, vec![2]).expect("store");
        assert_eq!(incoming.assemble(), vec![1, 2]);
    }

    #[test]
    fn test_out_of_range_chunk() {
        let mut incoming = IncomingTransfer::from_offer(&offer(2, 2));
        incoming.first_request();

        assert!(matches!(
            incoming.store(5, vec![1]),
            Err(Error::ProtocolViolation(_))
        ));
        assert_eq!(incoming.received_chunks(), 0);
    }

    #[test]
    fn test_chunk_past_declared_size_is_rejected() {
        let mut incoming = IncomingTransfer::from_offer(&offer(10, 2));
        incoming.first_request();

        assert!(matches!(
            incoming.store(0, vec![0; 4 * 1024 * 1024]),
            Err(Error::ProtocolViolation(_))
        ));
        assert_eq!(incoming.received_chunks(), 0);
        assert_eq!(incoming.bytes_received(), 0);

        assert_eq!(incoming.store(0, vec![1; 8]).expect("store"), Stored::Request(1));
        assert!(matches!(
            incoming.store(1, vec![2; 3]),
            Err(Error::ProtocolViolation(_))
        ));
        assert_eq!(incoming.store(1, vec![2; 2]).expect("store"), Stored::Complete);
        assert_eq!(incoming.bytes_received(), 10);
    }

    #[test]
    fn test_zero_chunk_offer_is_complete() {
        let mut incoming = IncomingTransfer::from_offer(&offer(0, 0));
        assert_eq!(incoming.first_request(), Stored::Complete);
        assert!(incoming.assemble().is_empty());
    }
}

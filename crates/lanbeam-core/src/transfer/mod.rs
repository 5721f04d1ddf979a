//! File transfer engine for LanBeam.
//!
//! Two independent state machines share one connection: a sender that
//! serves chunks of the outgoing file and a receiver that pulls chunks of
//! the incoming file. Neither touches the network. [`TransferEngine`]
//! consumes decoded [`Message`]s and returns the [`EngineAction`]s the
//! connection layer should carry out.
//!
//! ## Transfer Protocol
//!
//! ```text
//! sender                          receiver
//!   │ ── file_offer ─────────────────▶ │
//!   │ ◀──────────── chunk_request{0} ─ │
//!   │ ── chunk_data{0} ──────────────▶ │
//!   │ ◀──────────── chunk_request{1} ─ │
//!   │            ...                   │
//!   │ ── chunk_data{n-1} ────────────▶ │  assemble, write
//! ```
//!
//! - Default chunk size: 8 KiB
//! - One chunk in flight; the sender never pushes unrequested data
//! - At most one outgoing and one incoming file at a time
//! - A receiver that is still busy answers an offer with `busy`

mod receiver;
mod sender;

pub use receiver::{IncomingTransfer, ReceiverState};
pub use sender::{OutgoingTransfer, SenderState};

use std::path::PathBuf;

use uuid::Uuid;

use receiver::Stored;

use crate::config::MIN_CHUNK_SIZE;
use crate::error::{Error, Result};
use crate::file::FileDescriptor;
use crate::history::{FileRecord, SessionHistory, TransferDirection};
use crate::protocol::{FileOffer, Message};

/// Largest file a receiver accepts by default (2 GB). Incoming files are
/// buffered in memory until assembled.
pub const DEFAULT_MAX_INCOMING_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Progress of one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferProgress {
    /// Transfer id
    pub id: Uuid,
    /// Which way the file is moving
    pub direction: TransferDirection,
    /// File name
    pub name: String,
    /// Bytes moved so far
    pub bytes: u64,
    /// Declared size
    pub total_bytes: u64,
    /// Chunks moved so far
    pub chunks: usize,
    /// Total chunk count
    pub total_chunks: usize,
}

impl TransferProgress {
    /// Get progress as a percentage (0.0 - 100.0).
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            100.0
        } else {
            (self.bytes as f64 / self.total_bytes as f64) * 100.0
        }
    }
}

/// Why an incoming offer was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalReason {
    /// Another file is still being received
    Busy,
    /// Larger than the configured limit
    TooLarge,
    /// Chunk count does not match the declared size
    Invalid,
}

impl std::fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Busy => write!(f, "busy receiving another file"),
            Self::TooLarge => write!(f, "file too large"),
            Self::Invalid => write!(f, "invalid offer"),
        }
    }
}

/// Something the UI may want to know about.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// Our offer went out
    OfferSent(FileRecord),
    /// The peer offered a file and we accepted it
    OfferAccepted(FileRecord),
    /// The peer offered a file and we refused it
    OfferRefused {
        /// The refused offer
        offer: FileOffer,
        /// Why
        reason: RefusalReason,
    },
    /// Bytes moved
    Progress(TransferProgress),
    /// Last chunk of an outgoing file served
    SendCompleted(FileRecord),
    /// Incoming file written
    ReceiveCompleted(FileRecord),
    /// A transfer ended early
    Aborted {
        /// The affected record
        record: FileRecord,
        /// Direction of the transfer
        direction: TransferDirection,
        /// Why
        reason: String,
    },
}

/// A fully received file waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFile {
    /// Transfer id
    pub id: Uuid,
    /// Name from the offer
    pub name: String,
    /// MIME type or category tag
    pub mime_tag: String,
    /// File contents in chunk order
    pub bytes: Vec<u8>,
}

/// Work the connection layer must carry out after the engine handled input.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    /// Write this message to the peer
    Send(Message),
    /// Publish this event
    Emit(TransferEvent),
    /// Write this file to storage, then call
    /// [`TransferEngine::complete_incoming`] or
    /// [`TransferEngine::fail_incoming`]
    Assemble(AssembledFile),
}

/// Sender and receiver state for one peer session.
#[derive(Debug)]
pub struct TransferEngine {
    chunk_size: usize,
    max_incoming_size: u64,
    outgoing: Option<OutgoingTransfer>,
    incoming: Option<IncomingTransfer>,
    history: SessionHistory,
    bytes_sent: u64,
    bytes_received: u64,
}

impl TransferEngine {
    /// Create an idle engine slicing outgoing files into `chunk_size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is below [`MIN_CHUNK_SIZE`]; peers refuse
    /// offers sliced finer than that.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        assert!(
            chunk_size >= MIN_CHUNK_SIZE,
            "chunk size must be at least {MIN_CHUNK_SIZE} bytes"
        );
        Self {
            chunk_size,
            max_incoming_size: DEFAULT_MAX_INCOMING_SIZE,
            outgoing: None,
            incoming: None,
            history: SessionHistory::default(),
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    /// Change the largest incoming file accepted.
    #[must_use]
    pub const fn with_max_incoming_size(mut self, max: u64) -> Self {
        self.max_incoming_size = max;
        self
    }

    /// Chunk size for outgoing files.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Where the sender state machine stands.
    #[must_use]
    pub fn sender_state(&self) -> SenderState {
        self.outgoing
            .as_ref()
            .map_or(SenderState::Idle, OutgoingTransfer::state)
    }

    /// Where the receiver state machine stands.
    #[must_use]
    pub fn receiver_state(&self) -> ReceiverState {
        self.incoming
            .as_ref()
            .map_or(ReceiverState::Idle, IncomingTransfer::state)
    }

    /// The file being sent, if any.
    #[must_use]
    pub const fn outgoing(&self) -> Option<&OutgoingTransfer> {
        self.outgoing.as_ref()
    }

    /// The file being received, if any.
    #[must_use]
    pub const fn incoming(&self) -> Option<&IncomingTransfer> {
        self.incoming.as_ref()
    }

    /// Sent and received records.
    #[must_use]
    pub const fn history(&self) -> &SessionHistory {
        &self.history
    }

    /// Total bytes served to the peer this session.
    #[must_use]
    pub const fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Total bytes received from the peer this session.
    #[must_use]
    pub const fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Start sending a file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransferBusy`] if a file is already being sent; the
    /// running transfer is left untouched.
    pub fn initiate_send(&mut self, file: FileDescriptor) -> Result<Vec<EngineAction>> {
        if self.outgoing.is_some() {
            return Err(Error::TransferBusy);
        }

        let outgoing = OutgoingTransfer::new(file, self.chunk_size);
        let offer = outgoing.offer()?;
        let record = FileRecord::pending(
            offer.transfer_id,
            &offer.name,
            offer.size,
            &offer.mime_tag,
        );
        self.history.push(TransferDirection::Sent, record.clone());

        tracing::info!(
            "Offering '{}' ({} bytes, {} chunks)",
            offer.name,
            offer.size,
            offer.total_chunks
        );

        let mut actions = vec![
            EngineAction::Send(Message::FileOffer(offer)),
            EngineAction::Emit(TransferEvent::OfferSent(record)),
        ];

        if outgoing.total_chunks() == 0 {
            actions.extend(self.finish_outgoing(outgoing.id()));
        } else {
            self.outgoing = Some(outgoing);
        }

        Ok(actions)
    }

    /// Handle one message from the peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] for messages that make no sense
    /// in the current state. Such messages change nothing and the session
    /// may continue.
    pub fn handle(&mut self, message: Message) -> Result<Vec<EngineAction>> {
        match message {
            Message::FileOffer(offer) => Ok(self.on_offer(offer)),
            Message::ChunkRequest { chunk_index } => self.on_chunk_request(chunk_index),
            Message::ChunkData {
                chunk_index,
                payload,
            } => self.on_chunk_data(chunk_index, payload),
            Message::Busy { transfer_id } => self.on_busy(transfer_id),
            Message::Connect { .. } => Err(Error::ProtocolViolation(
                "connect frame after the handshake".to_string(),
            )),
        }
    }

    /// Record that the assembled file was written to `location`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] if `id` is not the file being
    /// assembled.
    pub fn complete_incoming(&mut self, id: Uuid, location: PathBuf) -> Result<FileRecord> {
        self.take_assembling(id)?;

        tracing::info!("Received '{}'", location.display());
        self.history
            .mark_available(TransferDirection::Received, id, Some(location))
            .ok_or_else(|| Error::Internal(format!("no record for transfer {id}")))
    }

    /// Record that writing the assembled file failed. The receiver returns
    /// to idle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] if `id` is not the file being
    /// assembled.
    pub fn fail_incoming(&mut self, id: Uuid, reason: &str) -> Result<FileRecord> {
        self.take_assembling(id)?;

        tracing::warn!("Dropping incoming transfer {}: {}", id, reason);
        self.history
            .mark_failed(TransferDirection::Received, id, reason)
            .ok_or_else(|| Error::Internal(format!("no record for transfer {id}")))
    }

    /// Discard both transfers and all counters, returning the history.
    pub fn reset(&mut self) -> SessionHistory {
        if let Some(outgoing) = self.outgoing.take() {
            tracing::debug!("Discarding outgoing transfer '{}'", outgoing.name());
        }
        if let Some(incoming) = self.incoming.take() {
            tracing::debug!("Discarding incoming transfer '{}'", incoming.name());
        }
        self.bytes_sent = 0;
        self.bytes_received = 0;
        std::mem::take(&mut self.history)
    }

    fn on_offer(&mut self, offer: FileOffer) -> Vec<EngineAction> {
        if let Some(reason) = self.refusal_reason(&offer) {
            tracing::warn!("Refusing offer for '{}': {}", offer.name, reason);
            return vec![
                EngineAction::Send(Message::Busy {
                    transfer_id: offer.transfer_id,
                }),
                EngineAction::Emit(TransferEvent::OfferRefused { offer, reason }),
            ];
        }

        let record = FileRecord::pending(
            offer.transfer_id,
            &offer.name,
            offer.size,
            &offer.mime_tag,
        );
        self.history.push(TransferDirection::Received, record.clone());

        tracing::info!(
            "Accepting '{}' ({} bytes, {} chunks)",
            offer.name,
            offer.size,
            offer.total_chunks
        );

        let mut incoming = IncomingTransfer::from_offer(&offer);
        let first = incoming.first_request();
        self.incoming = Some(incoming);

        let mut actions = vec![EngineAction::Emit(TransferEvent::OfferAccepted(record))];
        actions.extend(self.after_store(first));
        actions
    }

    fn refusal_reason(&self, offer: &FileOffer) -> Option<RefusalReason> {
        if self.incoming.is_some() {
            return Some(RefusalReason::Busy);
        }
        if offer.size > self.max_incoming_size {
            return Some(RefusalReason::TooLarge);
        }
        let chunks = u64::from(offer.total_chunks);
        let most_chunks = offer.size.div_ceil(MIN_CHUNK_SIZE as u64);
        if (offer.size == 0) != (chunks == 0) || chunks > most_chunks {
            return Some(RefusalReason::Invalid);
        }
        None
    }

    fn on_chunk_request(&mut self, chunk_index: u32) -> Result<Vec<EngineAction>> {
        let outgoing = self.outgoing.as_mut().ok_or_else(|| {
            Error::ProtocolViolation(format!("chunk {chunk_index} requested while idle"))
        })?;

        let served = outgoing.serve(chunk_index)?;
        self.bytes_sent += served.payload.len() as u64;

        let progress = TransferProgress {
            id: outgoing.id(),
            direction: TransferDirection::Sent,
            name: outgoing.name().to_string(),
            bytes: outgoing.bytes_sent(),
            total_bytes: outgoing.size(),
            chunks: chunk_index as usize + 1,
            total_chunks: outgoing.total_chunks(),
        };
        let id = outgoing.id();

        tracing::debug!("Serving chunk {} of '{}'", chunk_index, outgoing.name());

        let mut actions = vec![
            EngineAction::Send(Message::ChunkData {
                chunk_index,
                payload: served.payload,
            }),
            EngineAction::Emit(TransferEvent::Progress(progress)),
        ];

        if served.is_last {
            self.outgoing = None;
            actions.extend(self.finish_outgoing(id));
        }

        Ok(actions)
    }

    fn finish_outgoing(&mut self, id: Uuid) -> Option<EngineAction> {
        let record = self
            .history
            .mark_available(TransferDirection::Sent, id, None)?;
        tracing::info!("Sent '{}'", record.name);
        Some(EngineAction::Emit(TransferEvent::SendCompleted(record)))
    }

    fn on_chunk_data(&mut self, chunk_index: u32, payload: Vec<u8>) -> Result<Vec<EngineAction>> {
        let incoming = self.incoming.as_mut().ok_or_else(|| {
            Error::ProtocolViolation(format!("chunk {chunk_index} arrived while idle"))
        })?;

        let len = payload.len() as u64;
        let stored = incoming.store(chunk_index, payload)?;
        self.bytes_received += len;

        let progress = TransferProgress {
            id: incoming.id(),
            direction: TransferDirection::Received,
            name: incoming.name().to_string(),
            bytes: incoming.bytes_received(),
            total_bytes: incoming.size(),
            chunks: incoming.received_chunks(),
            total_chunks: incoming.total_chunks(),
        };

        let mut actions = vec![EngineAction::Emit(TransferEvent::Progress(progress))];
        actions.extend(self.after_store(stored));
        Ok(actions)
    }

    fn after_store(&mut self, stored: Stored) -> Vec<EngineAction> {
        match stored {
            Stored::Request(chunk_index) => {
                vec![EngineAction::Send(Message::ChunkRequest { chunk_index })]
            }
            Stored::Buffered => Vec::new(),
            Stored::Complete => {
                let Some(incoming) = self.incoming.as_mut() else {
                    return Vec::new();
                };
                let bytes = incoming.assemble();
                if bytes.len() as u64 != incoming.size() {
                    let id = incoming.id();
                    let reason = format!(
                        "declared {} bytes but {} arrived",
                        incoming.size(),
                        bytes.len()
                    );
                    return match self.fail_incoming(id, &reason) {
                        Ok(record) => vec![EngineAction::Emit(TransferEvent::Aborted {
                            record,
                            direction: TransferDirection::Received,
                            reason,
                        })],
                        Err(e) => {
                            tracing::error!("Could not drop short transfer {}: {}", id, e);
                            Vec::new()
                        }
                    };
                }
                vec![EngineAction::Assemble(AssembledFile {
                    id: incoming.id(),
                    name: incoming.name().to_string(),
                    mime_tag: incoming.mime_tag().to_string(),
                    bytes,
                })]
            }
        }
    }

    fn on_busy(&mut self, transfer_id: Uuid) -> Result<Vec<EngineAction>> {
        // A zero-byte send is complete as soon as it is offered.
        if self
            .history
            .get(TransferDirection::Sent, transfer_id)
            .is_some_and(|r| r.available)
        {
            return Err(Error::ProtocolViolation(format!(
                "busy for completed transfer {transfer_id}"
            )));
        }

        if self.outgoing.as_ref().map(OutgoingTransfer::id) == Some(transfer_id) {
            self.outgoing = None;
        }

        let record = self
            .history
            .mark_failed(TransferDirection::Sent, transfer_id, "peer is busy")
            .ok_or_else(|| {
                Error::ProtocolViolation(format!("busy for unknown transfer {transfer_id}"))
            })?;

        tracing::warn!("Peer refused '{}'", record.name);

        Ok(vec![EngineAction::Emit(TransferEvent::Aborted {
            record,
            direction: TransferDirection::Sent,
            reason: "peer is busy".to_string(),
        })])
    }

    fn take_assembling(&mut self, id: Uuid) -> Result<IncomingTransfer> {
        match self.incoming.take() {
            Some(incoming)
                if incoming.id() == id && incoming.state() == ReceiverState::Assembling =>
            {
                Ok(incoming)
            }
            other => {
                self.incoming = other;
                Err(Error::ProtocolViolation(format!(
                    "transfer {id} is not being assembled"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(len: usize) -> FileDescriptor {
        let bytes: Vec<u8> = (0..len).map(|i| (i * 7 % 256) as u8).collect();
        FileDescriptor::new("photo.jpg", bytes)
    }

    fn sent(actions: &[EngineAction]) -> Vec<Message> {
        actions
            .iter()
            .filter_map(|a| match a {
                EngineAction::Send(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    fn assembled(actions: &[EngineAction]) -> Option<AssembledFile> {
        actions.iter().find_map(|a| match a {
            EngineAction::Assemble(f) => Some(f.clone()),
            _ => None,
        })
    }

    /// Shuttle messages between two engines until both go quiet.
    fn run_exchange(
        sender: &mut TransferEngine,
        receiver: &mut TransferEngine,
        initial: Vec<EngineAction>,
    ) -> (Option<AssembledFile>, Vec<u32>) {
        let mut to_receiver = sent(&initial);
        let mut requests = Vec::new();
        let mut result = None;

        while !to_receiver.is_empty() {
            let mut to_sender = Vec::new();
            for message in to_receiver.drain(..) {
                let actions = receiver.handle(message).expect("receiver handle");
                if let Some(file) = assembled(&actions) {
                    result = Some(file);
                }
                to_sender.extend(sent(&actions));
            }
            for message in to_sender {
                if let Message::ChunkRequest { chunk_index } = message {
                    requests.push(chunk_index);
                }
                let actions = sender.handle(message).expect("sender handle");
                to_receiver.extend(sent(&actions));
            }
        }

        (result, requests)
    }

    #[test]
    fn test_full_exchange_reproduces_bytes() {
        let mut sender = TransferEngine::new(8192);
        let mut receiver = TransferEngine::new(8192);
        let original = file(20_000);

        let actions = sender.initiate_send(original.clone()).expect("send");
        let offer = match &sent(&actions)[0] {
            Message::FileOffer(offer) => offer.clone(),
            other => panic!("expected offer, got {other:?}"),
        };
        assert_eq!(offer.total_chunks, 3);

        let (result, requests) = run_exchange(&mut sender, &mut receiver, actions);
        let result = result.expect("assembled");

        assert_eq!(requests, [0, 1, 2]);
        assert_eq!(result.bytes, original.bytes);
        assert_eq!(result.name, "photo.jpg");

        assert_eq!(sender.sender_state(), SenderState::Idle);
        assert_eq!(sender.bytes_sent(), 20_000);
        assert!(sender.history().sent[0].available);

        assert_eq!(receiver.receiver_state(), ReceiverState::Assembling);
        assert_eq!(receiver.bytes_received(), 20_000);
        assert!(!receiver.history().received[0].available);

        let record = receiver
            .complete_incoming(result.id, PathBuf::from("/tmp/photo.jpg"))
            .expect("complete");
        assert!(record.available);
        assert_eq!(receiver.receiver_state(), ReceiverState::Idle);
    }

    #[test]
    fn test_exact_multiple_of_chunk_size() {
        let mut sender = TransferEngine::new(1024);
        let mut receiver = TransferEngine::new(1024);
        let original = file(4096);

        let actions = sender.initiate_send(original.clone()).expect("send");
        let (result, requests) = run_exchange(&mut sender, &mut receiver, actions);

        assert_eq!(requests, [0, 1, 2, 3]);
        assert_eq!(result.expect("assembled").bytes, original.bytes);
    }

    #[test]
    fn test_zero_byte_file() {
        let mut sender = TransferEngine::new(8192);
        let mut receiver = TransferEngine::new(8192);

        let actions = sender.initiate_send(file(0)).expect("send");
        assert_eq!(sender.sender_state(), SenderState::Idle);
        assert!(actions
            .iter()
            .any(|a| matches!(a, EngineAction::Emit(TransferEvent::SendCompleted(_)))));

        let (result, requests) = run_exchange(&mut sender, &mut receiver, actions);
        assert!(requests.is_empty());
        assert!(result.expect("assembled").bytes.is_empty());
    }

    #[test]
    fn test_second_send_is_busy() {
        let mut engine = TransferEngine::new(8192);
        engine.initiate_send(file(20_000)).expect("first");
        let first_id = engine.outgoing().expect("outgoing").id();

        assert!(matches!(
            engine.initiate_send(file(10)),
            Err(Error::TransferBusy)
        ));
        assert_eq!(engine.outgoing().expect("outgoing").id(), first_id);
        assert_eq!(engine.history().sent.len(), 1);
    }

    #[test]
    fn test_offer_while_receiving_is_refused() {
        let mut receiver = TransferEngine::new(8192);
        let mut first = TransferEngine::new(8192);
        let mut second = TransferEngine::new(8192);

        let offer_a = sent(&first.initiate_send(file(20_000)).expect("a"))[0].clone();
        let offer_b = sent(&second.initiate_send(file(100)).expect("b"))[0].clone();

        receiver.handle(offer_a).expect("accept");
        let actions = receiver.handle(offer_b.clone()).expect("refuse");

        let Message::FileOffer(offer_b) = offer_b else {
            panic!("expected offer");
        };
        assert_eq!(
            sent(&actions),
            [Message::Busy {
                transfer_id: offer_b.transfer_id
            }]
        );
        assert_eq!(receiver.history().received.len(), 1);
        assert_eq!(receiver.incoming().expect("incoming").outstanding(), Some(0));

        let aborted = second
            .handle(Message::Busy {
                transfer_id: offer_b.transfer_id,
            })
            .expect("busy");
        assert_eq!(second.sender_state(), SenderState::Idle);
        assert!(second.history().sent[0].is_failed());
        assert!(matches!(
            aborted[0],
            EngineAction::Emit(TransferEvent::Aborted { .. })
        ));
    }

    #[test]
    fn test_invalid_offers_are_refused() {
        let mut receiver = TransferEngine::new(8192).with_max_incoming_size(1000);
        let base = FileOffer {
            transfer_id: Uuid::new_v4(),
            name: "x".to_string(),
            size: 100,
            mime_tag: "text/plain".to_string(),
            total_chunks: 1,
        };

        for (offer, reason) in [
            (
                FileOffer {
                    size: 5000,
                    ..base.clone()
                },
                RefusalReason::TooLarge,
            ),
            (
                FileOffer {
                    total_chunks: 0,
                    ..base.clone()
                },
                RefusalReason::Invalid,
            ),
            (
                FileOffer {
                    total_chunks: 101,
                    ..base.clone()
                },
                RefusalReason::Invalid,
            ),
            (
                FileOffer {
                    size: 1000,
                    total_chunks: 2,
                    ..base.clone()
                },
                RefusalReason::Invalid,
            ),
        ] {
            let actions = receiver.handle(Message::FileOffer(offer)).expect("handle");
            assert!(actions.iter().any(|a| matches!(
                a,
                EngineAction::Emit(TransferEvent::OfferRefused { reason: r, .. }) if *r == reason
            )));
        }
        assert_eq!(receiver.receiver_state(), ReceiverState::Idle);
    }

    #[test]
    fn test_offer_with_huge_chunk_count_is_refused() {
        let mut receiver = TransferEngine::new(8192);
        let offer = FileOffer {
            transfer_id: Uuid::new_v4(),
            name: "big.iso".to_string(),
            size: 2_000_000_000,
            mime_tag: "application/octet-stream".to_string(),
            total_chunks: 2_000_000_000,
        };

        let actions = receiver.handle(Message::FileOffer(offer)).expect("handle");
        assert!(actions.iter().any(|a| matches!(
            a,
            EngineAction::Emit(TransferEvent::OfferRefused {
                reason: RefusalReason::Invalid,
                ..
            })
        )));
        assert!(receiver.incoming().is_none());
    }

    #[test]
    fn test_protocol_violations_change_nothing() {
        let mut engine = TransferEngine::new(8192);

        assert!(matches!(
            engine.handle(Message::ChunkRequest { chunk_index: 0 }),
            Err(Error::ProtocolViolation(_))
        ));
        assert!(matches!(
            engine.handle(Message::ChunkData {
                chunk_index: 0,
                payload: vec![1]
            }),
            Err(Error::ProtocolViolation(_))
        ));

        engine.initiate_send(file(100)).expect("send");
        assert!(matches!(
            engine.handle(Message::ChunkRequest { chunk_index: 9 }),
            Err(Error::ProtocolViolation(_))
        ));
        assert_eq!(engine.sender_state(), SenderState::Offered);
        assert_eq!(engine.bytes_sent(), 0);
    }

    #[test]
    fn test_stray_chunk_data_keeps_requests_monotonic() {
        let mut sender = TransferEngine::new(1024);
        let mut receiver = TransferEngine::new(1024);
        let original = file(4096);

        let offer = sent(&sender.initiate_send(original.clone()).expect("send"))[0].clone();
        let first = sent(&receiver.handle(offer).expect("offer"));
        assert_eq!(first, [Message::ChunkRequest { chunk_index: 0 }]);

        let stray = receiver
            .handle(Message::ChunkData {
                chunk_index: 2,
                payload: original.bytes[2048..3072].to_vec(),
            })
            .expect("stray");
        assert!(sent(&stray).is_empty());

        let mut requests = vec![0];
        let mut next = sender.handle(first[0].clone()).expect("serve");
        let result = loop {
            let message = sent(&next).remove(0);
            let actions = receiver.handle(message).expect("receive");
            if let Some(file) = assembled(&actions) {
                break file;
            }
            let request = sent(&actions).remove(0);
            if let Message::ChunkRequest { chunk_index } = request {
                requests.push(chunk_index);
            }
            next = sender.handle(request).expect("serve");
        };

        assert_eq!(requests, [0, 1, 3]);
        assert_eq!(result.bytes, original.bytes);
    }

    #[test]
    fn test_oversized_chunk_is_not_stored() {
        let mut receiver = TransferEngine::new(8192).with_max_incoming_size(1000);
        let offer = FileOffer {
            transfer_id: Uuid::new_v4(),
            name: "small.txt".to_string(),
            size: 10,
            mime_tag: "text/plain".to_string(),
            total_chunks: 1,
        };
        receiver.handle(Message::FileOffer(offer)).expect("offer");

        assert!(matches!(
            receiver.handle(Message::ChunkData {
                chunk_index: 0,
                payload: vec![0; 4 * 1024 * 1024],
            }),
            Err(Error::ProtocolViolation(_))
        ));
        assert_eq!(receiver.bytes_received(), 0);
        assert_eq!(receiver.receiver_state(), ReceiverState::Awaiting);
        assert_eq!(receiver.incoming().expect("incoming").received_chunks(), 0);
    }

    #[test]
    fn test_short_file_is_dropped_not_assembled() {
        let mut receiver = TransferEngine::new(1024);
        let offer = FileOffer {
            transfer_id: Uuid::new_v4(),
            name: "short.bin".to_string(),
            size: 3000,
            mime_tag: "application/octet-stream".to_string(),
            total_chunks: 3,
        };
        receiver.handle(Message::FileOffer(offer)).expect("offer");

        for (chunk_index, len) in [(0, 1024), (1, 1024)] {
            receiver
                .handle(Message::ChunkData {
                    chunk_index,
                    payload: vec![7; len],
                })
                .expect("chunk");
        }
        let actions = receiver
            .handle(Message::ChunkData {
                chunk_index: 2,
                payload: vec![7; 100],
            })
            .expect("last chunk");

        assert!(assembled(&actions).is_none());
        assert!(actions.iter().any(|a| matches!(
            a,
            EngineAction::Emit(TransferEvent::Aborted {
                direction: TransferDirection::Received,
                ..
            })
        )));
        assert_eq!(receiver.receiver_state(), ReceiverState::Idle);
        assert!(receiver.history().received[0].is_failed());
        assert!(!receiver.history().received[0].available);
    }

    #[test]
    fn test_late_busy_keeps_zero_byte_send_complete() {
        let mut sender = TransferEngine::new(8192);
        let actions = sender.initiate_send(file(0)).expect("send");
        let Message::FileOffer(offer) = sent(&actions)[0].clone() else {
            panic!("expected offer");
        };

        assert!(matches!(
            sender.handle(Message::Busy {
                transfer_id: offer.transfer_id,
            }),
            Err(Error::ProtocolViolation(_))
        ));
        assert!(sender.history().sent[0].available);
        assert!(!sender.history().sent[0].is_failed());
    }

    #[test]
    fn test_fail_incoming_returns_to_idle() {
        let mut sender = TransferEngine::new(8192);
        let mut receiver = TransferEngine::new(8192);

        let actions = sender.initiate_send(file(10)).expect("send");
        let (result, _) = run_exchange(&mut sender, &mut receiver, actions);
        let result = result.expect("assembled");

        assert!(receiver
            .complete_incoming(Uuid::new_v4(), PathBuf::from("/x"))
            .is_err());

        let record = receiver.fail_incoming(result.id, "disk full").expect("fail");
        assert!(record.is_failed());
        assert!(!record.available);
        assert_eq!(receiver.receiver_state(), ReceiverState::Idle);
    }

    #[test]
    fn test_reset_discards_everything() {
        let mut sender = TransferEngine::new(8192);
        let mut receiver = TransferEngine::new(8192);

        let offer = sent(&sender.initiate_send(file(20_000)).expect("send"))[0].clone();
        let request = sent(&receiver.handle(offer).expect("offer"))[0].clone();
        let data = sent(&sender.handle(request).expect("serve"))[0].clone();
        receiver.handle(data).expect("data");

        assert_eq!(sender.sender_state(), SenderState::Sending);
        assert_eq!(receiver.receiver_state(), ReceiverState::Awaiting);

        let history = sender.reset();
        assert_eq!(history.sent.len(), 1);
        assert_eq!(sender.sender_state(), SenderState::Idle);
        assert_eq!(sender.bytes_sent(), 0);
        assert!(sender.history().is_empty());

        receiver.reset();
        assert_eq!(receiver.receiver_state(), ReceiverState::Idle);
        assert_eq!(receiver.bytes_received(), 0);

        receiver.reset();
        assert!(receiver.history().is_empty());
    }
}

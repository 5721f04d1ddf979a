//! Per-session record of sent and received files.
//!
//! A [`FileRecord`] is created the moment a transfer starts and flipped to
//! available once the last chunk has been served (sender) or the assembled
//! file has been written (receiver). Records are never removed while the
//! peer session lives; the whole history is handed upward when the session
//! ends.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// File was sent to the peer
    Sent,
    /// File was received from the peer
    Received,
}

impl std::fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sent => write!(f, "Sent"),
            Self::Received => write!(f, "Received"),
        }
    }
}

/// One row in the sent or received list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Transfer id
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Declared size in bytes
    pub size: u64,
    /// MIME type or category tag
    pub mime_tag: String,
    /// Where the received file was stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
    /// True once the transfer finished
    pub available: bool,
    /// Why the transfer stopped early, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the transfer started
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Create a pending record.
    pub fn pending(id: Uuid, name: impl Into<String>, size: u64, mime_tag: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            size,
            mime_tag: mime_tag.into(),
            location: None,
            available: false,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the transfer stopped without completing.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Sent and received records for one peer session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHistory {
    /// Files sent to the peer, oldest first
    pub sent: Vec<FileRecord>,
    /// Files received from the peer, oldest first
    pub received: Vec<FileRecord>,
}

impl SessionHistory {
    /// Append a record to the list for `direction`.
    pub fn push(&mut self, direction: TransferDirection, record: FileRecord) {
        self.list_mut(direction).push(record);
    }

    /// Look up a record by transfer id.
    #[must_use]
    pub fn get(&self, direction: TransferDirection, id: Uuid) -> Option<&FileRecord> {
        self.list(direction).iter().find(|r| r.id == id)
    }

    /// Mark a record available, optionally with its storage location.
    ///
    /// Returns the updated record.
    pub fn mark_available(
        &mut self,
        direction: TransferDirection,
        id: Uuid,
        location: Option<PathBuf>,
    ) -> Option<FileRecord> {
        let record = self.find_mut(direction, id)?;
        record.available = true;
        record.location = location;
        Some(record.clone())
    }

    /// Record why a transfer stopped. The record becomes unavailable.
    pub fn mark_failed(
        &mut self,
        direction: TransferDirection,
        id: Uuid,
        reason: impl Into<String>,
    ) -> Option<FileRecord> {
        let record = self.find_mut(direction, id)?;
        record.available = false;
        record.error = Some(reason.into());
        Some(record.clone())
    }

    /// Number of records in both lists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sent.len() + self.received.len()
    }

    /// Whether both lists are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sent.is_empty() && self.received.is_empty()
    }

    fn list(&self, direction: TransferDirection) -> &[FileRecord] {
        match direction {
            TransferDirection::Sent => &self.sent,
            TransferDirection::Received => &self.received,
        }
    }

    fn list_mut(&mut self, direction: TransferDirection) -> &mut Vec<FileRecord> {
        match direction {
            TransferDirection::Sent => &mut self.sent,
            TransferDirection::Received => &mut self.received,
        }
    }

    fn find_mut(&mut self, direction: TransferDirection, id: Uuid) -> Option<&mut FileRecord> {
        self.list_mut(direction).iter_mut().find(|r| r.id == id)
    }
}

//! Common test utilities for `LanBeam` integration tests.
//!
//! This module provides shared functionality for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lanbeam_core::connection::{
    ConnectionManager, ConnectionState, ManagerConfig, SessionEvent,
};
use lanbeam_core::crypto::PinnedCredential;
use lanbeam_core::file::DirectorySink;
use tokio::sync::broadcast;

/// How long a test waits for an event before failing.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect timeout used by tests, in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Create a temporary directory for test files.
///
/// The directory will be automatically cleaned up when the returned
/// `TempDir` is dropped.
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create a test file with the given content.
pub fn create_test_file(dir: &std::path::Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Generate random bytes for testing.
pub fn random_bytes(size: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Build a manager that writes received files into `output`.
pub fn create_manager(
    credential: &PinnedCredential,
    name: &str,
    chunk_size: usize,
    output: &std::path::Path,
) -> ConnectionManager {
    let config = ManagerConfig {
        device_name: name.to_string(),
        chunk_size,
        handshake_timeout: Duration::from_secs(5),
        ..ManagerConfig::default()
    };
    ConnectionManager::new(config, credential, Arc::new(DirectorySink::new(output)))
        .expect("Failed to create manager")
}

/// Wait for the first event matching `predicate`, skipping the rest.
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<SessionEvent>,
    mut predicate: F,
) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    tokio::time::timeout(EVENT_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("Timed out waiting for event")
}

/// Wait until the manager reports `state`.
pub async fn wait_for_state(manager: &ConnectionManager, state: ConnectionState) {
    let mut snapshot = manager.snapshot();
    tokio::time::timeout(EVENT_TIMEOUT, snapshot.wait_for(|s| s.state == state))
        .await
        .expect("Timed out waiting for state")
        .expect("Snapshot channel closed");
}

//! End-to-end tests for peer sessions over loopback TLS.

mod common;

use std::time::Duration;

use common::{create_manager, create_temp_dir, random_bytes, wait_for_event, wait_for_state};
use lanbeam_core::connection::{ConnectionState, Role, SessionEvent};
use lanbeam_core::crypto::PinnedCredential;
use lanbeam_core::file::PickedFile;
use lanbeam_core::pairing::{decode_address, PeerAddress};
use lanbeam_core::transfer::{ReceiverState, SenderState, TransferEvent};
use lanbeam_core::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn picked(name: &str, bytes: Vec<u8>) -> PickedFile {
    PickedFile::File {
        name: name.to_string(),
        size: bytes.len() as u64,
        mime_type: None,
        bytes,
    }
}

#[tokio::test]
async fn test_host_sends_file_to_client() {
    let credential = PinnedCredential::generate().expect("credential");
    let host_dir = create_temp_dir();
    let client_dir = create_temp_dir();

    let host = create_manager(&credential, "Laptop", 8192, host_dir.path());
    let client = create_manager(&credential, "Phone-A", 8192, client_dir.path());
    let mut host_events = host.subscribe();
    let mut client_events = client.subscribe();

    let addr = host.listen(0).await.expect("listen");
    client
        .connect("127.0.0.1", addr.port(), CONNECT_TIMEOUT)
        .await
        .expect("connect");

    let connected = wait_for_event(&mut host_events, |e| {
        matches!(e, SessionEvent::Connected { .. })
    })
    .await;
    assert!(matches!(
        connected,
        SessionEvent::Connected { role: Role::Host, ref peer_name, .. }
            if peer_name.as_deref() == Some("Phone-A")
    ));
    wait_for_state(&host, ConnectionState::Connected).await;

    let original = random_bytes(20_000);
    let id = host
        .initiate_send(picked("photo.bin", original.clone()))
        .await
        .expect("initiate send");

    let mut progress = Vec::new();
    let completed = wait_for_event(&mut host_events, |e| match e {
        SessionEvent::Transfer(TransferEvent::Progress(p)) => {
            progress.push(p.bytes);
            false
        }
        SessionEvent::Transfer(TransferEvent::SendCompleted(_)) => true,
        _ => false,
    })
    .await;
    assert_eq!(progress, [8192, 16_384, 20_000]);

    let SessionEvent::Transfer(TransferEvent::SendCompleted(sent)) = completed else {
        panic!("expected send completion");
    };
    assert_eq!(sent.id, id);
    assert!(sent.available);

    let received = wait_for_event(&mut client_events, |e| {
        matches!(e, SessionEvent::Transfer(TransferEvent::ReceiveCompleted(_)))
    })
    .await;
    let SessionEvent::Transfer(TransferEvent::ReceiveCompleted(record)) = received else {
        panic!("expected receive completion");
    };
    assert!(record.available);
    assert_eq!(record.name, "photo.bin");

    let path = record.location.expect("location");
    assert!(path.starts_with(client_dir.path()));
    assert_eq!(std::fs::read(&path).expect("read"), original);

    let mut snapshot = client.snapshot();
    let snapshot = tokio::time::timeout(
        Duration::from_secs(5),
        snapshot.wait_for(|s| s.bytes_received == 20_000),
    )
    .await
    .expect("timeout")
    .expect("snapshot")
    .clone();
    assert_eq!(snapshot.history.received.len(), 1);
    assert!(snapshot.history.received[0].available);

    client.disconnect().await;
}

#[tokio::test]
async fn test_files_move_both_ways_at_once() {
    let credential = PinnedCredential::generate().expect("credential");
    let host_dir = create_temp_dir();
    let client_dir = create_temp_dir();

    let host = create_manager(&credential, "Laptop", 4096, host_dir.path());
    let client = create_manager(&credential, "Phone", 4096, client_dir.path());
    let mut host_events = host.subscribe();
    let mut client_events = client.subscribe();

    let addr = host.listen(0).await.expect("listen");
    client
        .connect("127.0.0.1", addr.port(), CONNECT_TIMEOUT)
        .await
        .expect("connect");
    wait_for_state(&host, ConnectionState::Connected).await;

    let to_client = random_bytes(50_000);
    let to_host = random_bytes(30_000);

    host.initiate_send(picked("a.bin", to_client.clone()))
        .await
        .expect("host send");
    client
        .initiate_send(picked("b.bin", to_host.clone()))
        .await
        .expect("client send");

    for (events, expected) in [(&mut client_events, &to_client), (&mut host_events, &to_host)] {
        let event = wait_for_event(events, |e| {
            matches!(e, SessionEvent::Transfer(TransferEvent::ReceiveCompleted(_)))
        })
        .await;
        let SessionEvent::Transfer(TransferEvent::ReceiveCompleted(record)) = event else {
            panic!("expected receive completion");
        };
        let path = record.location.expect("location");
        assert_eq!(&std::fs::read(path).expect("read"), expected);
    }

    host.shutdown().await;
    client.shutdown().await;
}

#[tokio::test]
async fn test_zero_byte_file() {
    let credential = PinnedCredential::generate().expect("credential");
    let host_dir = create_temp_dir();
    let client_dir = create_temp_dir();

    let host = create_manager(&credential, "Laptop", 8192, host_dir.path());
    let client = create_manager(&credential, "Phone", 8192, client_dir.path());
    let mut host_events = host.subscribe();

    let addr = host.listen(0).await.expect("listen");
    client
        .connect("127.0.0.1", addr.port(), CONNECT_TIMEOUT)
        .await
        .expect("connect");
    wait_for_state(&host, ConnectionState::Connected).await;

    client
        .initiate_send(picked("empty.txt", Vec::new()))
        .await
        .expect("send");

    let event = wait_for_event(&mut host_events, |e| {
        matches!(e, SessionEvent::Transfer(TransferEvent::ReceiveCompleted(_)))
    })
    .await;
    let SessionEvent::Transfer(TransferEvent::ReceiveCompleted(record)) = event else {
        panic!("expected receive completion");
    };
    let path = record.location.expect("location");
    assert!(std::fs::read(path).expect("read").is_empty());
}

#[tokio::test]
async fn test_remote_disconnect_resets_session() {
    let credential = PinnedCredential::generate().expect("credential");
    let host_dir = create_temp_dir();
    let client_dir = create_temp_dir();

    let host = create_manager(&credential, "Laptop", 8192, host_dir.path());
    let client = create_manager(&credential, "Phone", 8192, client_dir.path());
    let mut client_events = client.subscribe();

    let addr = host.listen(0).await.expect("listen");
    client
        .connect("127.0.0.1", addr.port(), CONNECT_TIMEOUT)
        .await
        .expect("connect");
    wait_for_state(&host, ConnectionState::Connected).await;

    host.disconnect().await;
    assert_eq!(host.snapshot().borrow().state, ConnectionState::Closed);

    let event = wait_for_event(&mut client_events, |e| {
        matches!(e, SessionEvent::Disconnected { .. })
    })
    .await;
    assert!(matches!(event, SessionEvent::Disconnected { .. }));
    wait_for_state(&client, ConnectionState::Closed).await;

    assert!(matches!(
        client.send(lanbeam_core::protocol::Message::ChunkRequest { chunk_index: 0 }).await,
        Err(Error::NotConnected)
    ));

    host.disconnect().await;
    assert_eq!(host.snapshot().borrow().state, ConnectionState::Closed);

    // the acceptor survives a disconnect
    client
        .connect("127.0.0.1", addr.port(), CONNECT_TIMEOUT)
        .await
        .expect("reconnect");
    wait_for_state(&host, ConnectionState::Connected).await;
}

#[tokio::test]
async fn test_disconnect_mid_transfer_discards_both_sides() {
    let credential = PinnedCredential::generate().expect("credential");
    let host_dir = create_temp_dir();
    let client_dir = create_temp_dir();

    let host = create_manager(&credential, "Laptop", 1024, host_dir.path());
    let client = create_manager(&credential, "Phone", 1024, client_dir.path());
    let mut host_events = host.subscribe();
    let mut client_events = client.subscribe();

    let addr = host.listen(0).await.expect("listen");
    client
        .connect("127.0.0.1", addr.port(), CONNECT_TIMEOUT)
        .await
        .expect("connect");
    wait_for_state(&host, ConnectionState::Connected).await;

    // 8192 round trips; the session is torn down after the first one
    let id = host
        .initiate_send(picked("large.bin", random_bytes(8 * 1024 * 1024)))
        .await
        .expect("initiate send");
    wait_for_event(&mut host_events, |e| {
        matches!(e, SessionEvent::Transfer(TransferEvent::Progress(_)))
    })
    .await;

    host.disconnect().await;

    let host_snapshot = host.snapshot().borrow().clone();
    assert_eq!(host_snapshot.state, ConnectionState::Closed);
    assert_eq!(host_snapshot.sender_state, SenderState::Idle);
    assert_eq!(host_snapshot.receiver_state, ReceiverState::Idle);

    let event = wait_for_event(&mut host_events, |e| {
        matches!(e, SessionEvent::Disconnected { .. })
    })
    .await;
    let SessionEvent::Disconnected { history, .. } = event else {
        panic!("expected disconnect");
    };
    let record = history.sent.iter().find(|r| r.id == id).expect("sent record");
    assert!(!record.available);

    wait_for_event(&mut client_events, |e| {
        matches!(e, SessionEvent::Disconnected { .. })
    })
    .await;
    wait_for_state(&client, ConnectionState::Closed).await;
    let client_snapshot = client.snapshot().borrow().clone();
    assert_eq!(client_snapshot.sender_state, SenderState::Idle);
    assert_eq!(client_snapshot.receiver_state, ReceiverState::Idle);

    let written = std::fs::read_dir(client_dir.path()).expect("read dir").count();
    assert_eq!(written, 0, "half-received file must not be written");

    host.disconnect().await;
    assert_eq!(*host.snapshot().borrow(), host_snapshot);
}

#[tokio::test]
async fn test_host_refuses_second_peer() {
    let credential = PinnedCredential::generate().expect("credential");
    let dir = create_temp_dir();

    let host = create_manager(&credential, "Laptop", 8192, dir.path());
    let first = create_manager(&credential, "Phone-A", 8192, dir.path());
    let second = create_manager(&credential, "Phone-B", 8192, dir.path());

    let addr = host.listen(0).await.expect("listen");
    first
        .connect("127.0.0.1", addr.port(), CONNECT_TIMEOUT)
        .await
        .expect("connect");
    wait_for_state(&host, ConnectionState::Connected).await;

    let result = second
        .connect("127.0.0.1", addr.port(), CONNECT_TIMEOUT)
        .await;
    assert!(result.is_err());

    let snapshot = host.snapshot().borrow().clone();
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert_eq!(snapshot.peer_name.as_deref(), Some("Phone-A"));
}

#[tokio::test]
async fn test_connect_with_pairing_address() {
    let credential = PinnedCredential::generate().expect("credential");
    let dir = create_temp_dir();

    let host = create_manager(&credential, "Laptop", 8192, dir.path());
    let client = create_manager(&credential, "Phone", 8192, dir.path());

    let addr = host.listen(0).await.expect("listen");
    let text = PeerAddress::new("127.0.0.1", addr.port(), "Laptop").to_string();
    let address = decode_address(&text).expect("decode");

    client
        .connect_peer(&address, CONNECT_TIMEOUT)
        .await
        .expect("connect");

    let snapshot = client.snapshot().borrow().clone();
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert_eq!(snapshot.peer_name.as_deref(), Some("Laptop"));
    assert_eq!(snapshot.role, Some(Role::Client));
}

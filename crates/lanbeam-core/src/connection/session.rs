//! The actor running one peer session.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_rustls::TlsStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{Inner, SessionEvent};
use crate::error::{Error, Result};
use crate::file::FileDescriptor;
use crate::history::TransferDirection;
use crate::protocol::{self, Message};
use crate::transfer::{AssembledFile, EngineAction, TransferEngine, TransferEvent};

const CHANNEL_CAPACITY: usize = 32;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type Stream = TlsStream<TcpStream>;

/// A request from the manager to the actor.
pub(super) enum Command {
    Send {
        message: Message,
        reply: oneshot::Sender<Result<()>>,
    },
    InitiateSend {
        file: FileDescriptor,
        reply: oneshot::Sender<Result<Uuid>>,
    },
}

pub(super) struct SessionHandle {
    pub id: u64,
    pub commands: mpsc::Sender<Command>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

enum Inbound {
    Message(Message),
    Closed(String),
}

/// Start the reader and actor tasks for an established stream.
pub(super) fn spawn(
    inner: Arc<Inner>,
    id: u64,
    stream: Stream,
    cancel: CancellationToken,
) -> SessionHandle {
    let (reader, writer) = tokio::io::split(stream);
    let (frames_tx, frames_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (commands_tx, commands_rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(read_loop(reader, frames_tx, cancel.child_token()));

    let engine = TransferEngine::new(inner.config.chunk_size)
        .with_max_incoming_size(inner.config.max_incoming_size);

    let actor = SessionActor {
        inner,
        id,
        writer,
        engine,
        frames: frames_rx,
        commands: commands_rx,
        cancel: cancel.clone(),
    };

    SessionHandle {
        id,
        commands: commands_tx,
        cancel,
        task: tokio::spawn(actor.run()),
    }
}

async fn read_loop(
    mut reader: ReadHalf<Stream>,
    frames: mpsc::Sender<Inbound>,
    cancel: CancellationToken,
) {
    loop {
        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = protocol::read_frame(&mut reader) => result,
        };

        let inbound = match result.and_then(|body| protocol::decode_body(&body)) {
            Ok(message) => {
                tracing::debug!("Received {} frame", message.kind());
                Inbound::Message(message)
            }
            Err(e) if e.is_frame_local() => {
                tracing::warn!("Dropping malformed frame: {}", e);
                continue;
            }
            Err(e) => Inbound::Closed(close_reason(&e)),
        };

        let closed = matches!(inbound, Inbound::Closed(_));
        if frames.send(inbound).await.is_err() || closed {
            break;
        }
    }
}

fn close_reason(error: &Error) -> String {
    match error {
        Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            "peer closed the connection".to_string()
        }
        other => other.to_string(),
    }
}

struct SessionActor {
    inner: Arc<Inner>,
    id: u64,
    writer: WriteHalf<Stream>,
    engine: TransferEngine,
    frames: mpsc::Receiver<Inbound>,
    commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
}

impl SessionActor {
    async fn run(mut self) {
        let reason = loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break "disconnected".to_string(),
                inbound = self.frames.recv() => match inbound {
                    Some(Inbound::Message(message)) => {
                        if let Err(e) = self.on_message(message).await {
                            break e.to_string();
                        }
                    }
                    Some(Inbound::Closed(reason)) => break reason,
                    None => break "reader stopped".to_string(),
                },
                Some(command) = self.commands.recv() => {
                    if let Err(e) = self.on_command(command).await {
                        break e.to_string();
                    }
                }
            }
        };

        self.close(reason).await;
    }

    async fn on_message(&mut self, message: Message) -> Result<()> {
        match self.engine.handle(message) {
            Ok(actions) => self.apply(actions).await,
            Err(e) if e.is_frame_local() => {
                tracing::warn!("Ignoring frame: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn on_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Send { message, reply } => {
                tracing::debug!("Sending {} frame", message.kind());
                match protocol::write_message(&mut self.writer, &message).await {
                    Ok(()) => {
                        let _ = reply.send(Ok(()));
                        Ok(())
                    }
                    Err(e) => {
                        let _ = reply.send(Err(Error::ConnectionLost(e.to_string())));
                        Err(e)
                    }
                }
            }
            Command::InitiateSend { file, reply } => {
                let actions = match self.engine.initiate_send(file) {
                    Ok(actions) => actions,
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        return Ok(());
                    }
                };

                let id = offered_id(&actions);
                match self.apply(actions).await {
                    Ok(()) => {
                        let _ = reply.send(
                            id.ok_or_else(|| Error::Internal("offer was not sent".to_string())),
                        );
                        Ok(())
                    }
                    Err(e) => {
                        let _ = reply.send(Err(Error::ConnectionLost(e.to_string())));
                        Err(e)
                    }
                }
            }
        }
    }

    async fn apply(&mut self, actions: Vec<EngineAction>) -> Result<()> {
        for action in actions {
            match action {
                EngineAction::Send(message) => {
                    tracing::debug!("Sending {} frame", message.kind());
                    protocol::write_message(&mut self.writer, &message).await?;
                }
                EngineAction::Emit(event) => self.inner.emit(SessionEvent::Transfer(event)),
                EngineAction::Assemble(file) => self.store(file).await,
            }
        }

        self.publish_counters();
        Ok(())
    }

    /// Hand an assembled file to the sink. A failed write only ends that
    /// transfer.
    async fn store(&mut self, file: AssembledFile) {
        let written = self.inner.sink.write_file(&file.name, &file.bytes).await;

        let event = match written {
            Ok(path) => self
                .engine
                .complete_incoming(file.id, path)
                .map(TransferEvent::ReceiveCompleted),
            Err(e) => {
                tracing::error!("Failed to store '{}': {}", file.name, e);
                let reason = e.to_string();
                self.engine
                    .fail_incoming(file.id, &reason)
                    .map(|record| TransferEvent::Aborted {
                        record,
                        direction: TransferDirection::Received,
                        reason,
                    })
            }
        };

        match event {
            Ok(event) => self.inner.emit(SessionEvent::Transfer(event)),
            Err(e) => tracing::error!("Lost track of transfer {}: {}", file.id, e),
        }
    }

    fn publish_counters(&self) {
        let engine = &self.engine;
        self.inner.snapshot.send_modify(|s| {
            s.sender_state = engine.sender_state();
            s.receiver_state = engine.receiver_state();
            s.bytes_sent = engine.bytes_sent();
            s.bytes_received = engine.bytes_received();
            s.history = engine.history().clone();
        });
    }

    async fn close(mut self, reason: String) {
        self.cancel.cancel();

        match tokio::time::timeout(CLOSE_TIMEOUT, self.writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("Error closing stream: {}", e),
            Err(_) => tracing::debug!("Timed out closing stream"),
        }

        let history = self.engine.reset();
        tracing::info!("Session closed: {}", reason);
        self.inner.finish_session(self.id, reason, history).await;
    }
}

fn offered_id(actions: &[EngineAction]) -> Option<Uuid> {
    actions.iter().find_map(|action| match action {
        EngineAction::Send(Message::FileOffer(offer)) => Some(offer.transfer_id),
        _ => None,
    })
}

//! LanBeam frame protocol.
//!
//! Every message travels as one length-prefixed frame over the TLS stream.
//! The body is a JSON object discriminated by its `type` field.
//!
//! ## Frame Format
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                    LanBeam Frame                      │
//! ├────────────┬────────────┬─────────────────────────────┤
//! │   Magic    │  Version   │         Length              │
//! │  4 bytes   │  2 bytes   │         4 bytes             │
//! ├────────────┴────────────┴─────────────────────────────┤
//! │                   JSON body                           │
//! │               (variable length)                       │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! - Magic: `0x4C 0x42 0x46 0x50` ("LBFP")
//! - Version: `0x01 0x00` (1.0)
//! - Length: Body length in bytes (big-endian)
//!
//! A bad header desynchronizes the stream and is fatal to it
//! ([`Error::InvalidHeader`]). A bad body is reported as
//! [`Error::Framing`] and only costs that one frame.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::PROTOCOL_VERSION;

/// Protocol magic bytes: "LBFP"
pub const MAGIC: [u8; 4] = *b"LBFP";

/// Frame header size in bytes
pub const HEADER_SIZE: usize = 10;

/// Maximum body size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// A protocol frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Protocol version (major, minor)
    pub version: (u8, u8),
    /// Body length
    pub body_length: u32,
}

impl FrameHeader {
    /// Encode the header to bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4] = self.version.0;
        buf[5] = self.version.1;
        buf[6..10].copy_from_slice(&self.body_length.to_be_bytes());
        buf
    }

    /// Decode a header from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the magic, major version or length is invalid.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Result<Self> {
        if buf[0..4] != MAGIC {
            return Err(Error::InvalidHeader("invalid magic bytes".to_string()));
        }

        let version = (buf[4], buf[5]);
        if version.0 != PROTOCOL_VERSION.0 {
            return Err(Error::UnsupportedVersion {
                major: version.0,
                minor: version.1,
            });
        }

        let body_length = u32::from_be_bytes([buf[6], buf[7], buf[8], buf[9]]);
        if body_length as usize > MAX_FRAME_SIZE {
            return Err(Error::InvalidHeader(format!(
                "frame too large: {body_length} bytes"
            )));
        }

        Ok(Self {
            version,
            body_length,
        })
    }
}

/// Metadata announcing a file the sender is about to stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOffer {
    /// Transfer id chosen by the sender
    pub transfer_id: Uuid,
    /// Display name of the file
    pub name: String,
    /// Declared size in bytes
    pub size: u64,
    /// MIME type or category tag
    pub mime_tag: String,
    /// Number of chunks the sender split the file into
    pub total_chunks: u32,
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// First frame from the connecting side
    Connect {
        /// Human-readable name of the connecting device
        device_name: String,
    },
    /// Sender announces a file
    FileOffer(FileOffer),
    /// Receiver asks for one chunk
    ChunkRequest {
        /// Zero-based chunk index
        chunk_index: u32,
    },
    /// Sender answers a chunk request
    ChunkData {
        /// Zero-based chunk index
        chunk_index: u32,
        /// Raw chunk bytes (base64 on the wire)
        #[serde(with = "base64_bytes")]
        payload: Vec<u8>,
    },
    /// Receiver refuses an offer because it is still receiving another file
    Busy {
        /// Id of the refused offer
        transfer_id: Uuid,
    },
}

impl Message {
    /// Short name of the message kind, as it appears in the `type` field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::FileOffer(_) => "file_offer",
            Self::ChunkRequest { .. } => "chunk_request",
            Self::ChunkData { .. } => "chunk_data",
            Self::Busy { .. } => "busy",
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Encode a message body to JSON bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_body(message: &Message) -> Result<Vec<u8>> {
    serde_json::to_vec(message).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a message body from JSON bytes.
///
/// # Errors
///
/// Returns [`Error::Framing`] if the body is not a known message.
pub fn decode_body(body: &[u8]) -> Result<Message> {
    serde_json::from_slice(body).map_err(|e| Error::Framing(e.to_string()))
}

/// Encode a message into a complete frame (header and body).
///
/// # Errors
///
/// Returns an error if serialization fails or the body exceeds
/// [`MAX_FRAME_SIZE`].
pub fn encode(message: &Message) -> Result<Vec<u8>> {
    let body = encode_body(message)?;
    let header = header_for(&body)?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode one complete frame.
///
/// # Errors
///
/// Returns [`Error::InvalidHeader`] or [`Error::UnsupportedVersion`] for a
/// bad header and [`Error::Framing`] for a truncated frame or a bad body.
pub fn decode(frame: &[u8]) -> Result<Message> {
    let Some((header_bytes, body)) = frame.split_first_chunk::<HEADER_SIZE>() else {
        return Err(Error::Framing(format!(
            "truncated frame: {} bytes",
            frame.len()
        )));
    };

    let header = FrameHeader::decode(header_bytes)?;
    if body.len() != header.body_length as usize {
        return Err(Error::Framing(format!(
            "body length mismatch: header says {}, got {}",
            header.body_length,
            body.len()
        )));
    }

    decode_body(body)
}

fn header_for(body: &[u8]) -> Result<FrameHeader> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(Error::InvalidHeader(format!(
            "frame too large: {} bytes",
            body.len()
        )));
    }

    #[allow(clippy::cast_possible_truncation)]
    Ok(FrameHeader {
        version: PROTOCOL_VERSION,
        body_length: body.len() as u32,
    })
}

/// Read one frame body from a stream.
///
/// # Errors
///
/// Returns an error if reading fails or the header is invalid.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncReadExt + Unpin,
{
    let mut header_buf = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_buf).await?;

    let header = FrameHeader::decode(&header_buf)?;

    let mut body = vec![0u8; header.body_length as usize];
    if header.body_length > 0 {
        reader.read_exact(&mut body).await?;
    }

    Ok(body)
}

/// Write one frame with the given body to a stream.
///
/// # Errors
///
/// Returns an error if writing fails.
pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    let header = header_for(body)?;

    writer.write_all(&header.encode()).await?;
    if !body.is_empty() {
        writer.write_all(body).await?;
    }
    writer.flush().await?;

    Ok(())
}

/// Encode a message and write it as one frame.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    let body = encode_body(message)?;
    write_frame(writer, &body).await
}

/// Read one frame body from a stream with a timeout.
///
/// # Errors
///
/// Returns `Error::Timeout` if the operation exceeds the specified duration.
/// Returns an error if reading fails or the header is invalid.
pub async fn read_frame_with_timeout<R>(reader: &mut R, duration: Duration) -> Result<Vec<u8>>
where
    R: AsyncReadExt + Unpin,
{
    timeout(duration, read_frame(reader))
        .await
        .map_err(|_| Error::Timeout(duration))?
}

/// Encode and write a message with a timeout.
///
/// # Errors
///
/// Returns `Error::Timeout` if the operation exceeds the specified duration.
/// Returns an error if writing fails.
pub async fn write_message_with_timeout<W>(
    writer: &mut W,
    message: &Message,
    duration: Duration,
) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    timeout(duration, write_message(writer, message))
        .await
        .map_err(|_| Error::Timeout(duration))?
}

//! File handling at the edges of a transfer.
//!
//! This module covers everything the transfer engine needs from storage:
//! turning a picked file into a [`FileDescriptor`], slicing it into chunks,
//! writing an assembled file through a [`FileSink`], and listing what has
//! already been received.

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tag used when nothing better is known about a file's type.
pub const DEFAULT_MIME_TAG: &str = "application/octet-stream";

/// A file handed over by a picker, before it enters the transfer engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickedFile {
    /// A generic document
    File {
        /// File name
        name: String,
        /// Size reported by the picker
        size: u64,
        /// MIME type reported by the picker, if any
        mime_type: Option<String>,
        /// File contents
        bytes: Vec<u8>,
    },
    /// A photo or other image from a gallery
    Image {
        /// File name
        file_name: String,
        /// Size reported by the picker
        file_size: u64,
        /// Image contents
        bytes: Vec<u8>,
    },
}

/// The shape every outgoing file takes inside the transfer engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Display name
    pub name: String,
    /// Size in bytes; always the length of `bytes`
    pub size: u64,
    /// MIME type or category tag
    pub mime_tag: String,
    /// File contents
    pub bytes: Vec<u8>,
}

impl FileDescriptor {
    /// Create a descriptor, guessing the MIME tag from the name.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_tag = guess_mime(&name, DEFAULT_MIME_TAG);
        Self {
            size: bytes.len() as u64,
            name,
            mime_tag,
            bytes,
        }
    }
}

impl From<PickedFile> for FileDescriptor {
    fn from(picked: PickedFile) -> Self {
        match picked {
            PickedFile::File {
                name,
                size,
                mime_type,
                bytes,
            } => {
                if size != bytes.len() as u64 {
                    tracing::debug!(
                        "Picker reported {} bytes for '{}', read {}",
                        size,
                        name,
                        bytes.len()
                    );
                }
                let mime_tag = mime_type.unwrap_or_else(|| guess_mime(&name, DEFAULT_MIME_TAG));
                Self {
                    size: bytes.len() as u64,
                    name,
                    mime_tag,
                    bytes,
                }
            }
            PickedFile::Image {
                file_name, bytes, ..
            } => Self {
                size: bytes.len() as u64,
                mime_tag: guess_mime(&file_name, "image/jpeg"),
                name: file_name,
                bytes,
            },
        }
    }
}

fn guess_mime(name: &str, fallback: &str) -> String {
    mime_guess::from_path(name)
        .first()
        .map_or_else(|| fallback.to_string(), |m| m.to_string())
}

/// Read a file from disk the way a picker would hand it over.
///
/// Files with an `image/*` type become [`PickedFile::Image`].
///
/// # Errors
///
/// Returns [`Error::Read`] if the file cannot be read or has no file name.
pub async fn read_picked_file(path: &Path) -> Result<PickedFile> {
    let read_error = |reason: String| Error::Read {
        name: path.display().to_string(),
        reason,
    };

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| read_error("path has no file name".to_string()))?
        .to_string();

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| read_error(e.to_string()))?;
    let size = bytes.len() as u64;

    let mime_type = mime_guess::from_path(path).first();
    match mime_type {
        Some(mime) if mime.type_() == mime_guess::mime::IMAGE => Ok(PickedFile::Image {
            file_name: name,
            file_size: size,
            bytes,
        }),
        mime => Ok(PickedFile::File {
            name,
            size,
            mime_type: mime.map(|m| m.to_string()),
            bytes,
        }),
    }
}

/// Number of chunks a file of `size` bytes is split into.
///
/// # Panics
///
/// Panics if `chunk_size` is zero.
#[must_use]
pub fn chunk_count(size: u64, chunk_size: usize) -> u64 {
    size.div_ceil(chunk_size as u64)
}

/// Slice file contents into fixed-size chunks; only the last may be shorter.
#[must_use]
pub fn split_chunks(bytes: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    bytes.chunks(chunk_size).map(<[u8]>::to_vec).collect()
}

/// Destination for fully assembled incoming files.
pub trait FileSink: Send + Sync {
    /// Persist `bytes` under `name` and return where they were stored.
    fn write_file<'a>(&'a self, name: &'a str, bytes: &'a [u8]) -> BoxFuture<'a, Result<PathBuf>>;
}

/// A [`FileSink`] writing into one directory.
///
/// Names are reduced to their final path component, and an existing file
/// is never overwritten: `photo.jpg` becomes `photo (1).jpg`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create a sink for `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let write_error = |reason: String| Error::Write {
            name: name.to_string(),
            reason,
        };

        let file_name = Path::new(name)
            .file_name()
            .ok_or_else(|| write_error("invalid file name".to_string()))?;
        let path = sanitize_path(&self.dir, Path::new(file_name))
            .ok_or_else(|| write_error("invalid file name".to_string()))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| write_error(e.to_string()))?;

        let path = unique_path(path).await;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| write_error(e.to_string()))?;

        tracing::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}

impl FileSink for DirectorySink {
    fn write_file<'a>(&'a self, name: &'a str, bytes: &'a [u8]) -> BoxFuture<'a, Result<PathBuf>> {
        Box::pin(self.write(name, bytes))
    }
}

async fn unique_path(path: PathBuf) -> PathBuf {
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return path;
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1u32;
    loop {
        let candidate = path.with_file_name(format!("{stem} ({n}){extension}"));
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

/// A file found in the receive directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedFile {
    /// File name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type guessed from the extension
    pub mime_tag: String,
    /// Full path
    pub path: PathBuf,
}

/// List the regular files directly inside `dir`, sorted by name.
///
/// A missing directory yields an empty list.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be read.
pub fn list_directory(dir: &Path) -> Result<Vec<ListedFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = entry
            .metadata()
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        let name = entry.file_name().to_string_lossy().into_owned();

        files.push(ListedFile {
            mime_tag: guess_mime(&name, DEFAULT_MIME_TAG),
            size: metadata.len(),
            path: entry.into_path(),
            name,
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Sanitize a path to prevent directory traversal attacks.
///
/// # Arguments
///
/// * `base` - Base directory
/// * `relative` - Relative path from base
///
/// # Returns
///
/// The sanitized absolute path, or None if the path is invalid.
#[must_use]
pub fn sanitize_path(base: &Path, relative: &Path) -> Option<PathBuf> {
    for component in relative.components() {
        if component == std::path::Component::ParentDir {
            return None;
        }
    }

    let full_path = base.join(relative);

    if full_path.starts_with(base) {
        Some(full_path)
    } else {
        None
    }
}

/// Format a file size for display.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

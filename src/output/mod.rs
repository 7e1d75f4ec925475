//! JSON persistence
//!
//! Every document is written through [`write_json_atomic`]: a temporary file
//! in the destination directory is filled, synced and renamed over the
//! target, so a reader never observes a truncated or half-written file and
//! a failed write leaves the previous content in place.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

pub mod layout;

pub use layout::DataDir;

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Path exists but is not a directory
    #[error("not a directory: {0}")]
    NotADirectory(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Serialize `value` with 4-space indentation.
///
/// Objects keep `serde_json`'s sorted key order; non-ASCII text is written
/// as UTF-8 rather than escaped.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> OutputResult<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| OutputError::SerializationError(e.to_string()))?;
    Ok(buf)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Check that [`write_json_atomic`] will be able to write `path` later.
///
/// Creates the parent directory if it is missing and verifies it accepts a
/// temporary file. Nothing is left behind.
pub fn ensure_writable(path: &Path) -> OutputResult<()> {
    let parent_dir = parent_dir(path);
    DataDir::prepare(parent_dir)?;
    tempfile::NamedTempFile::new_in(parent_dir).map_err(|e| {
        OutputError::IoError(format!("{} is not writable: {e}", parent_dir.display()))
    })?;
    Ok(())
}

/// Atomically replace `path` with the pretty-printed `value`.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> OutputResult<()> {
    let bytes = to_pretty_json(value)?;
    let parent_dir = parent_dir(path);

    let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
        .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;

    temp_file
        .write_all(&bytes)
        .map_err(|e| OutputError::IoError(format!("Failed to write to temp file: {e}")))?;
    temp_file
        .flush()
        .map_err(|e| OutputError::IoError(format!("Failed to flush temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync temp file: {e}")))?;

    temp_file
        .persist(path)
        .map_err(|e| OutputError::IoError(format!("Failed to persist {}: {e}", path.display())))?;

    // Make the rename durable
    if let Ok(dir) = std::fs::File::open(parent_dir) {
        let _ = dir.sync_all();
    }

    debug!(path = %path.display(), bytes = bytes.len(), "Document persisted");
    info!(path = %path.display(), "Wrote JSON document");
    crate::metrics::record_file_written();
    Ok(())
}

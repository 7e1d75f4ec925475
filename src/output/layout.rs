//! Data directory layout
//!
//! Reference downloads always land under fixed file names:
//!
//! ```text
//! data/
//!   dictionary.json
//!   stop_info.json
//!   routes.json
//!   <poll output>.json
//! ```

use super::{OutputError, OutputResult};
use std::path::{Path, PathBuf};
use tracing::info;

/// Dictionary file name
pub const DICTIONARY_FILE: &str = "dictionary.json";

/// Stop metadata file name
pub const STOPS_INFO_FILE: &str = "stop_info.json";

/// Routes file name
pub const ROUTES_FILE: &str = "routes.json";

/// Existing, writable destination directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Create `root` (and parents) if missing.
    ///
    /// Fails with [`OutputError::NotADirectory`] if `root` exists as a file.
    pub fn prepare(root: impl Into<PathBuf>) -> OutputResult<Self> {
        let root = root.into();

        if root.exists() && !root.is_dir() {
            return Err(OutputError::NotADirectory(root.display().to_string()));
        }

        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|e| {
                OutputError::IoError(format!("Failed to create {}: {e}", root.display()))
            })?;
            info!(path = %root.display(), "Created data directory");
        }

        Ok(Self { root })
    }

    /// Directory root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `name` inside the directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Destination of the dictionary download.
    pub fn dictionary(&self) -> PathBuf {
        self.file(DICTIONARY_FILE)
    }

    /// Destination of the stop metadata download.
    pub fn stops_info(&self) -> PathBuf {
        self.file(STOPS_INFO_FILE)
    }

    /// Destination of the routes download.
    pub fn routes(&self) -> PathBuf {
        self.file(ROUTES_FILE)
    }
}

//! Storage layer - JSON files under the Lyss base directory
//!
//! Both durable stores (chat history and response cache) are whole-file JSON
//! documents. They are read once at startup and replaced once at the end of
//! a successful turn.
//!
//! # Layout
//!
//! ```text
//! <base>/
//! ├── cache.json
//! └── save/
//!     └── chat_history.json
//! ```

mod file;
pub mod timestamp;

pub use file::{read_json, write_json_atomic};

use std::path::{Path, PathBuf};

/// History file location relative to the base directory
pub const HISTORY_FILE: &str = "save/chat_history.json";

/// Cache file location relative to the base directory
pub const CACHE_FILE: &str = "cache.json";

/// Resolved locations of the durable stores
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    base_dir: PathBuf,
}

impl StoragePaths {
    /// Create paths rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the chat history file
    pub fn history(&self) -> PathBuf {
        self.base_dir.join(HISTORY_FILE)
    }

    /// Path of the response cache file
    pub fn cache(&self) -> PathBuf {
        self.base_dir.join(CACHE_FILE)
    }
}

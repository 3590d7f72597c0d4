//! Persistent chat history
//!
//! This module provides:
//! - [`Message`] and [`Role`], the stored conversation records
//! - [`ChatHistory`], the ordered message log plus its reset counter
//! - [`WindowPolicy`], which picks the recent messages sent with a request
//!
//! The history is loaded once per run, mutated in memory and written back
//! once after a turn completes.

mod message;
mod window;

pub use message::{Message, Role};
pub use window::{DEFAULT_MAX_SINCE_RESET, WindowPolicy};

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::storage::{read_json, write_json_atomic};

/// One conversation's stored messages.
///
/// `turns_since_reset` counts `add_message` calls since the last [`reset`].
/// It only drives the default window size; resetting it never drops
/// stored messages.
///
/// [`reset`]: ChatHistory::reset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistory {
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    turns_since_reset: usize,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the history stored at `path`.
    ///
    /// A missing or empty file yields an empty history. Malformed content is
    /// an error rather than a silent reset.
    pub fn load(path: &Path) -> Result<Self> {
        let history: Self = read_json(path)?.unwrap_or_default();
        debug!(
            path = %path.display(),
            messages = history.messages.len(),
            turns_since_reset = history.turns_since_reset,
            "Loaded chat history"
        );
        Ok(history)
    }

    /// Replace the file at `path` with this history
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(self, path)?;
        info!(path = %path.display(), messages = self.messages.len(), "Saved chat history");
        Ok(())
    }

    /// Append a message and count the turn
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.turns_since_reset += 1;
    }

    /// Zero the turn counter; stored messages are kept
    pub fn reset(&mut self) {
        self.turns_since_reset = 0;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn turns_since_reset(&self) -> usize {
        self.turns_since_reset
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent `n` messages in chronological order
    pub fn last(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}

impl std::fmt::Display for ChatHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, message) in self.messages.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", message)?;
        }
        Ok(())
    }
}

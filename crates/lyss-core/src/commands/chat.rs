//! Conversational turns with persistent context
//!
//! A turn loads the stored history, appends the user's message, sends the
//! configured instructions plus a window of recent messages, and streams
//! the reply through the summary filter. The history file is written once,
//! after the reply has fully arrived; an empty, failed or interrupted reply
//! leaves it untouched.

use std::io::Write;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{TurnOutcome, open_stream, pump};
use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::history::{ChatHistory, Message, Role, WindowPolicy};
use crate::llm::{ChatMessage, CompletionRequest, CompletionSource};
use crate::summary::SummaryFilter;

/// Per-invocation switches for a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChatOptions {
    /// Which stored messages accompany the request
    pub window: WindowPolicy,
    /// Show the summary region instead of hiding it
    pub with_summary: bool,
    /// Zero the turn counter before this turn
    pub reset: bool,
}

/// A chat history bound to its file
#[derive(Debug)]
pub struct ChatSession {
    history: ChatHistory,
    path: PathBuf,
}

impl ChatSession {
    /// Load the history stored at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let history = ChatHistory::load(&path)?;
        Ok(Self { history, path })
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build the request messages: instructions first, then the window
    pub fn request_messages(
        config: &ChatConfig,
        history: &ChatHistory,
        window: &WindowPolicy,
    ) -> Vec<ChatMessage> {
        let instructions = config
            .instructions
            .iter()
            .map(|text| ChatMessage::system(text.trim()));
        let recent = window
            .select(history)
            .iter()
            .filter_map(ChatMessage::from_stored);
        instructions.chain(recent).collect()
    }

    /// Run one turn for `message`, streaming visible text to `out`.
    ///
    /// The in-memory history and the file only change when the reply
    /// produced at least one fragment.
    pub async fn turn<S, W>(
        &mut self,
        source: &S,
        config: &ChatConfig,
        message: &str,
        options: ChatOptions,
        cancel: &CancellationToken,
        out: &mut W,
    ) -> Result<TurnOutcome>
    where
        S: CompletionSource + ?Sized,
        W: Write,
    {
        if message.trim().is_empty() {
            return Err(Error::InvalidInput("message is empty".to_string()));
        }

        let mut working = self.history.clone();
        if options.reset {
            info!(turns = working.turns_since_reset(), "Resetting turn counter");
            working.reset();
        }
        working.add_message(Message::user(message));

        let messages = Self::request_messages(config, &working, &options.window);
        debug!(
            model = %config.model,
            window = options.window.size(working.turns_since_reset()),
            messages = messages.len(),
            "Starting chat turn"
        );

        let stream = open_stream(source, CompletionRequest::new(&config.model, messages), cancel).await?;
        let filter = SummaryFilter::new(config.markers.clone(), options.with_summary)
            .resume_after_close(config.resume_after_summary);
        let (role, output) = pump(stream, filter, cancel, out).await?;

        if output.is_empty() {
            info!("Empty reply; history left unchanged");
            return Ok(TurnOutcome::from_output(output, false));
        }

        working.add_message(Message::new(Some(role.unwrap_or(Role::Assistant)), &output.full));
        working.save(&self.path)?;
        self.history = working;

        Ok(TurnOutcome::from_output(output, true))
    }
}

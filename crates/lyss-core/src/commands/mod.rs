//! Command implementations
//!
//! - `chat`: conversational turn with windowed history and hidden summary
//! - `quick`: single-turn request answered from the response cache when possible
//!
//! Both stream the reply fragment by fragment to the caller's writer and
//! persist their store once, after the whole reply has arrived.

pub mod chat;
pub mod quick;

pub use chat::{ChatOptions, ChatSession};
pub use quick::QuickSession;

use std::io::Write;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::history::Role;
use crate::llm::{CompletionRequest, CompletionSource, FragmentStream};
use crate::summary::{FilterOutput, SummaryFilter};

/// What a completed turn produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Text shown to the user
    pub visible: String,
    /// Text stored for the turn
    pub full: String,
    /// Whether the store was written
    pub persisted: bool,
}

impl TurnOutcome {
    fn from_output(output: FilterOutput, persisted: bool) -> Self {
        Self {
            visible: output.visible,
            full: output.full,
            persisted,
        }
    }
}

/// Open the completion stream, giving up if the turn is cancelled first
async fn open_stream<S>(
    source: &S,
    request: CompletionRequest,
    cancel: &CancellationToken,
) -> Result<FragmentStream>
where
    S: CompletionSource + ?Sized,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::StreamInterrupted),
        stream = source.stream(request) => stream,
    }
}

/// Drive a reply through `filter`, writing visible text to `out` as it arrives.
///
/// Returns the role announced by the stream, if any, and the filter output.
/// Cancellation or a stream error discards everything received so far.
async fn pump<W: Write>(
    mut stream: FragmentStream,
    mut filter: SummaryFilter,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<(Option<Role>, FilterOutput)> {
    let mut role = None;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(received = filter.full().len(), "Turn cancelled mid-stream");
                return Err(Error::StreamInterrupted);
            }
            next = stream.next() => next,
        };

        let delta = match next {
            Some(delta) => delta?,
            None => break,
        };

        if role.is_none() {
            role = delta.role;
        }

        let Some(content) = delta.content.filter(|c| !c.is_empty()) else {
            continue;
        };

        if let Some(text) = filter.push(&content) {
            out.write_all(text.as_bytes())?;
            out.flush()?;
        }
    }

    let (tail, output) = filter.finish();
    if let Some(text) = tail {
        out.write_all(text.as_bytes())?;
    }
    writeln!(out)?;
    out.flush()?;

    debug!(
        fragments = output.fragments,
        visible = output.visible.len(),
        full = output.full.len(),
        summary_closed = output.summary_closed,
        "Stream complete"
    );
    Ok((role, output))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted completion source for command tests

    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::llm::StreamDelta;

    /// Replays a fixed list of deltas and records every request
    pub struct ScriptedSource {
        deltas: Vec<Result<StreamDelta>>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedSource {
        pub fn new(fragments: &[&str]) -> Self {
            let mut deltas: Vec<Result<StreamDelta>> =
                fragments.iter().map(|f| Ok(StreamDelta::content(*f))).collect();
            if let Some(Ok(first)) = deltas.first_mut() {
                first.role = Some(Role::Assistant);
            }
            Self {
                deltas,
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Append a stream error after the scripted fragments
        pub fn failing(mut self, message: &str) -> Self {
            self.deltas.push(Err(Error::LLMError(message.to_string())));
            self
        }

        pub fn last_request(&self) -> CompletionRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionSource for ScriptedSource {
        async fn stream(&self, request: CompletionRequest) -> Result<FragmentStream> {
            self.requests.lock().unwrap().push(request);
            let deltas: Vec<Result<StreamDelta>> = self
                .deltas
                .iter()
                .map(|d| match d {
                    Ok(delta) => Ok(delta.clone()),
                    Err(e) => Err(Error::LLMError(e.to_string())),
                })
                .collect();
            Ok(Box::pin(futures_util::stream::iter(deltas)))
        }
    }
}

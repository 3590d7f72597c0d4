//! LLM integration - OpenAI-compatible chat completions
//!
//! This module provides:
//! - [`CompletionSource`], the seam between the orchestrator and the model
//! - An HTTP client streaming chat completions over Server-Sent Events
//! - Request types matching the OpenAI chat completions API

mod client;
mod streaming;
mod types;

pub use client::LlmClient;
pub use streaming::{SseDecoder, StreamDelta, StreamEvent, parse_sse_line};
pub use types::{ChatMessage, FinishReason};

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::Result;

/// Incremental deltas of one streamed reply
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<StreamDelta>> + Send>>;

/// What the orchestrator asks the model for
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
        }
    }
}

/// Anything that can stream a chat completion
#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Start a streaming completion.
    ///
    /// The returned stream yields deltas in arrival order and ends when the
    /// reply is complete.
    async fn stream(&self, request: CompletionRequest) -> Result<FragmentStream>;
}

//! Lyss Core Library
//!
//! This crate provides the core functionality for Lyss, a terminal client
//! for chat completion models:
//! - Commands (chat with persistent context, quick cached questions)
//! - Message store with a windowed view of recent turns
//! - Streaming filter that hides the model's running summary
//! - Response cache with time-based expiry
//! - LLM integration (OpenAI-compatible streaming API)
//! - JSON file storage with atomic replacement

pub mod cache;
pub mod commands;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod storage;
pub mod summary;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::ResponseCache;
    pub use crate::commands::{ChatOptions, ChatSession, QuickSession};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::history::{ChatHistory, Message, Role, WindowPolicy};
    pub use crate::llm::{CompletionSource, LlmClient};
}

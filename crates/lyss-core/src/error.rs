//! Error types for Lyss

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using Lyss's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Lyss error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Storage errors (E100-E199)
    #[error("Could not parse {}: {source}. Fix or move the file aside to start fresh.", path.display())]
    StorageRead {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not write {}: {source}", path.display())]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Stream errors (E200-E299)
    #[error("Response interrupted before completion")]
    StreamInterrupted,

    // Network errors (E300-E399)
    #[error("Could not reach the model endpoint: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Model request failed: {0}")]
    LLMError(String),

    #[error("Rate limited by the provider; retry in {0} seconds")]
    RateLimited(u64),

    // Config errors (E600-E699)
    #[error("Bad configuration: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Everything else
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable code printed alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            Self::StorageRead { .. } => "E100",
            Self::StorageWrite { .. } => "E101",
            Self::StreamInterrupted => "E200",
            Self::NetworkError(_) => "E300",
            Self::LLMError(_) => "E301",
            Self::RateLimited(_) => "E302",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Command or action likely to fix the problem
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::StorageRead { path, .. } => Some(format!("mv {0} {0}.bak", path.display())),
            Self::StorageWrite { path, .. } => path
                .parent()
                .map(|dir| format!("Check permissions on {}", dir.display())),
            Self::NetworkError(_) | Self::RateLimited(_) => Some("Try again in a moment".to_string()),
            Self::LLMError(_) => Some("lyss doctor".to_string()),
            Self::ConfigError(_) => Some("lyss config list".to_string()),
            _ => None,
        }
    }

    /// Whether this error means the user aborted the turn
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::StreamInterrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::StreamInterrupted.code(), "E200");
        assert_eq!(Error::LLMError("x".into()).code(), "E301");
        assert_eq!(Error::Other("x".into()).code(), "E9999");
    }

    #[test]
    fn test_storage_read_suggestion_names_file() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::StorageRead {
            path: PathBuf::from("/tmp/lyss/save/chat_history.json"),
            source,
        };

        assert!(err.to_string().contains("chat_history.json"));
        assert_eq!(
            err.suggestion().as_deref(),
            Some("mv /tmp/lyss/save/chat_history.json /tmp/lyss/save/chat_history.json.bak")
        );
    }

    #[test]
    fn test_is_interrupted() {
        assert!(Error::StreamInterrupted.is_interrupted());
        assert!(!Error::InvalidInput("empty".into()).is_interrupted());
    }
}

//! Single-turn requests backed by the response cache
//!
//! A quick request carries no history. When the exact same request text was
//! answered less than a TTL ago, the cached answer is returned without
//! touching the network; otherwise the answer is streamed in full and
//! cached.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{TurnOutcome, open_stream, pump};
use crate::cache::{CachedAnswer, ResponseCache};
use crate::config::QuickConfig;
use crate::error::{Error, Result};
use crate::llm::{ChatMessage, CompletionRequest, CompletionSource};
use crate::summary::{SummaryFilter, SummaryMarkers};

/// A response cache bound to its file
#[derive(Debug)]
pub struct QuickSession {
    cache: ResponseCache,
    path: PathBuf,
}

impl QuickSession {
    /// Load the cache stored at `path`, expiring entries after `ttl_days`
    pub fn open(path: impl Into<PathBuf>, ttl_days: i64) -> Result<Self> {
        let path = path.into();
        let cache = ResponseCache::load(&path)?.with_ttl(Duration::days(ttl_days));
        Ok(Self { cache, path })
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fresh cached answer for the exact request text, if any
    pub fn lookup(&self, message: &str) -> Option<&CachedAnswer> {
        let hit = self.cache.lookup(message);
        debug!(hit = hit.is_some(), "Cache lookup");
        hit
    }

    /// Ask the model, streaming every fragment to `out`, and cache the answer.
    ///
    /// Does not consult the cache; call [`lookup`](Self::lookup) first.
    pub async fn ask<S, W>(
        &mut self,
        source: &S,
        config: &QuickConfig,
        message: &str,
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

        let messages = config
            .instructions
            .iter()
            .map(|text| ChatMessage::system(text.trim()))
            .chain(std::iter::once(ChatMessage::user(message)))
            .collect();

        let stream = open_stream(source, CompletionRequest::new(&config.model, messages), cancel).await?;
        // Quick answers carry no summary; show everything
        let filter = SummaryFilter::new(SummaryMarkers::default(), true);
        let (_, output) = pump(stream, filter, cancel, out).await?;

        if output.is_empty() {
            info!("Empty reply; cache left unchanged");
            return Ok(TurnOutcome::from_output(output, false));
        }

        self.cache.store(message, output.full.clone());
        self.cache.save(&self.path)?;

        Ok(TurnOutcome::from_output(output, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::ScriptedSource;
    use crate::history::Role;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        (dir, path)
    }

    async fn ask(session: &mut QuickSession, source: &ScriptedSource, message: &str) -> (Result<TurnOutcome>, String) {
        let mut out = Vec::new();
        let result = session
            .ask(source, &QuickConfig::default(), message, &CancellationToken::new(), &mut out)
            .await;
        (result, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (_dir, path) = setup();
        let source = ScriptedSource::new(&["Rust is ", "a language."]);

        let mut session = QuickSession::open(&path, 30).unwrap();
        assert!(session.lookup("What is Rust?").is_none());
        let (result, printed) = ask(&mut session, &source, "What is Rust?").await;
        assert!(result.unwrap().persisted);
        assert_eq!(printed, "Rust is a language.\n");

        let reopened = QuickSession::open(&path, 30).unwrap();
        let hit = reopened.lookup("What is Rust?").unwrap();
        assert_eq!(hit.content, "Rust is a language.");
        assert!(reopened.lookup("what is rust?").is_none());
    }

    #[tokio::test]
    async fn test_request_is_instructions_plus_message() {
        let (_dir, path) = setup();
        let source = ScriptedSource::new(&["ok"]);
        let mut session = QuickSession::open(&path, 30).unwrap();

        ask(&mut session, &source, "  spaced  ").await.0.unwrap();

        let request = source.last_request();
        let config = QuickConfig::default();
        assert_eq!(request.model, config.model);
        assert_eq!(request.messages.len(), config.instructions.len() + 1);
        let last = request.messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "  spaced  ");
        assert!(session.cache().lookup("  spaced  ").is_some());
    }

    #[tokio::test]
    async fn test_markers_are_not_hidden() {
        let (_dir, path) = setup();
        let source = ScriptedSource::new(&["say ", "BEGIN", "_SUM"]);
        let mut session = QuickSession::open(&path, 30).unwrap();

        let (_, printed) = ask(&mut session, &source, "q").await;
        assert_eq!(printed, "say BEGIN_SUM\n");
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let (_dir, path) = setup();
        let mut cache = ResponseCache::new();
        cache.store_at("old question", "old answer", Utc::now() - Duration::days(31));
        cache.save(&path).unwrap();

        let session = QuickSession::open(&path, 30).unwrap();
        assert!(session.lookup("old question").is_none());

        let lenient = QuickSession::open(&path, 60).unwrap();
        assert!(lenient.lookup("old question").is_some());
    }

    #[tokio::test]
    async fn test_empty_reply_is_not_cached() {
        let (_dir, path) = setup();
        let source = ScriptedSource::new(&[]);
        let mut session = QuickSession::open(&path, 30).unwrap();

        let (result, _) = ask(&mut session, &source, "anything").await;
        assert!(!result.unwrap().persisted);
        assert!(!path.exists());
        assert!(session.cache().is_empty());
    }

    #[tokio::test]
    async fn test_failed_reply_is_not_cached() {
        let (_dir, path) = setup();
        fs::write(&path, "").unwrap();
        let source = ScriptedSource::new(&["half"]).failing("timeout");
        let mut session = QuickSession::open(&path, 30).unwrap();

        let (result, _) = ask(&mut session, &source, "anything").await;
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        assert!(session.cache().is_empty());
    }
}

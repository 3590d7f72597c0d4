//! Server-Sent Events decoding for streamed completions
//!
//! The endpoint sends one `data:` line per chunk and a final
//! `data: [DONE]`. Network reads do not respect line boundaries, so bytes
//! are buffered until a full line is available; a multi-byte character split
//! across two reads is reassembled before decoding.

use serde::Deserialize;

use super::types::FinishReason;
use crate::error::{Error, Result};
use crate::history::Role;

/// Incremental piece of the reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamDelta {
    /// Announced on the first chunk only
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub content: Option<String>,
}

impl StreamDelta {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            role: None,
            content: Some(content.into()),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

#[derive(Debug, Deserialize)]
struct ChunkBody {
    #[serde(default)]
    choices: Vec<ChoiceBody>,
}

#[derive(Debug, Deserialize)]
struct ChoiceBody {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<FinishReason>,
}

/// One decoded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Content for the first choice; `finish` is set on the last chunk
    Delta {
        delta: StreamDelta,
        finish: Option<FinishReason>,
    },
    /// The server signalled the end of the reply
    Done,
}

/// Decode a single SSE line.
///
/// Blank lines, comments and non-data fields yield `None`. A data line that
/// is not a valid chunk is an error.
pub fn parse_sse_line(line: &str) -> Option<Result<StreamEvent>> {
    let data = line.trim().strip_prefix("data:")?.trim_start();

    if data == "[DONE]" {
        return Some(Ok(StreamEvent::Done));
    }

    let event = serde_json::from_str::<ChunkBody>(data)
        .map_err(|e| Error::LLMError(format!("Malformed stream chunk: {}", e)))
        .map(|chunk| {
            let choice = chunk.choices.into_iter().next();
            let (delta, finish) = choice
                .map(|c| (c.delta, c.finish_reason))
                .unwrap_or_default();
            StreamEvent::Delta { delta, finish }
        });
    Some(event)
}

/// Line buffer sitting between the byte stream and [`parse_sse_line`]
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes and decode every line they complete
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<StreamEvent>> {
        self.buf.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(end) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=end).collect();
            if let Some(event) = parse_sse_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Decode whatever is left once the connection closes
    pub fn flush(&mut self) -> Option<Result<StreamEvent>> {
        let rest = std::mem::take(&mut self.buf);
        parse_sse_line(&String::from_utf8_lossy(&rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_of(event: Option<Result<StreamEvent>>) -> (StreamDelta, Option<FinishReason>) {
        match event.unwrap().unwrap() {
            StreamEvent::Delta { delta, finish } => (delta, finish),
            other => panic!("expected delta, got {:?}", other),
        }
    }

    #[test]
    fn test_content_chunk() {
        let line = r#"data: {"id":"chatcmpl-1","object":"chat.completion.chunk","created":1,"model":"gpt-4","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let (delta, finish) = delta_of(parse_sse_line(line));
        assert_eq!(delta, StreamDelta::content("Hello"));
        assert!(finish.is_none());
    }

    #[test]
    fn test_role_chunk() {
        let line = r#"data:{"choices":[{"delta":{"role":"assistant","content":""}}]}"#;
        let (delta, _) = delta_of(parse_sse_line(line));
        assert_eq!(delta, StreamDelta::content("").with_role(Role::Assistant));
    }

    #[test]
    fn test_final_chunk() {
        let line = r#"data: {"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#;
        let (delta, finish) = delta_of(parse_sse_line(line));
        assert_eq!(delta.content, None);
        assert_eq!(finish, Some(FinishReason::Stop));
    }

    #[test]
    fn test_done_and_ignored_lines() {
        assert_eq!(parse_sse_line("data: [DONE]").unwrap().unwrap(), StreamEvent::Done);
        assert!(parse_sse_line("").is_none());
        assert!(parse_sse_line(": keep-alive").is_none());
        assert!(parse_sse_line("event: ping").is_none());
    }

    #[test]
    fn test_malformed_chunk_is_error() {
        assert!(matches!(
            parse_sse_line("data: {oops"),
            Some(Err(Error::LLMError(_)))
        ));
    }

    #[test]
    fn test_decoder_joins_split_lines() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"choices\":[{\"delta\":{\"con").is_empty());

        let events = decoder.feed(b"tent\":\"Hi\"}}]}\n\ndata: [DONE]\n");
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Ok(StreamEvent::Done)));
        assert!(decoder.flush().is_none());
    }

    #[test]
    fn test_decoder_keeps_multibyte_chars_intact() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9}\"}}]}\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xc3).unwrap() + 1;

        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(&line[..split]).is_empty());
        let mut events = decoder.feed(&line[split..]);

        let (delta, _) = delta_of(events.pop());
        assert_eq!(delta.content.as_deref(), Some("caf\u{e9}"));
    }

    #[test]
    fn test_decoder_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: [DONE]").is_empty());
        assert_eq!(decoder.flush().unwrap().unwrap(), StreamEvent::Done);
    }
}

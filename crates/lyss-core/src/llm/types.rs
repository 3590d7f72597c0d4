//! Wire types for the chat completions endpoint

use serde::{Deserialize, Serialize};

use super::CompletionRequest;
use crate::config::LlmConfig;
use crate::history::{Message, Role};

/// A message as sent to the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Convert a stored message; messages without a role cannot be sent
    pub fn from_stored(message: &Message) -> Option<Self> {
        message
            .role()
            .map(|role| Self::new(role, message.content()))
    }
}

/// JSON body of a streaming request, borrowed so retries don't clone it
#[derive(Debug, Serialize)]
pub(crate) struct RequestBody<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    pub stream: bool,
}

impl<'a> RequestBody<'a> {
    pub fn streaming(request: &'a CompletionRequest, config: &LlmConfig) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stream: true,
        }
    }
}

/// Why the model stopped
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    /// Hit `max_tokens`
    Length,
    ToolCalls,
    ContentFilter,
    #[serde(other)]
    Unknown,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
            Self::ContentFilter => "content_filter",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_skips_unset_sampling_fields() {
        let request = CompletionRequest::new("gpt-3.5-turbo", vec![ChatMessage::user("hi")]);
        let body = RequestBody::streaming(&request, &LlmConfig::default());
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
        assert_eq!(json["stream"], true);
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_body_carries_configured_sampling() {
        let request = CompletionRequest::new("m", Vec::new());
        let config = LlmConfig {
            temperature: Some(0.5),
            max_tokens: Some(256),
            ..LlmConfig::default()
        };
        let json = serde_json::to_value(RequestBody::streaming(&request, &config)).unwrap();

        assert_eq!(json["temperature"], 0.5);
        assert_eq!(json["max_tokens"], 256);
    }

    #[test]
    fn test_from_stored_skips_roleless_messages() {
        assert!(ChatMessage::from_stored(&Message::new(None, "x")).is_none());
        let converted = ChatMessage::from_stored(&Message::assistant(" ok ")).unwrap();
        assert_eq!(converted, ChatMessage::new(Role::Assistant, "ok"));
    }

    #[test]
    fn test_finish_reason_unknown() {
        let reason: FinishReason = serde_json::from_str("\"something_new\"").unwrap();
        assert_eq!(reason, FinishReason::Unknown);
        assert_eq!(reason.to_string(), "unknown");
    }
}

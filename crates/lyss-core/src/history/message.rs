//! Conversation messages as they are stored on disk

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Author of a stored message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Human input
    User,
    /// Instructions to the model
    System,
    /// Model response
    Assistant,
    /// Tool output fed back to the model
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::System => "system",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation.
///
/// Content is trimmed when the message is built, including when it is read
/// back from disk, so it never carries leading or trailing whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Option<Role>,
    #[serde(deserialize_with = "trimmed")]
    content: String,
    #[serde(with = "crate::storage::timestamp", default = "Utc::now")]
    created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(role: Option<Role>, content: impl AsRef<str>) -> Self {
        Self {
            role,
            content: content.as_ref().trim().to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl AsRef<str>) -> Self {
        Self::new(Some(Role::User), content)
    }

    pub fn system(content: impl AsRef<str>) -> Self {
        Self::new(Some(Role::System), content)
    }

    pub fn assistant(content: impl AsRef<str>) -> Self {
        Self::new(Some(Role::Assistant), content)
    }

    /// Override the creation timestamp
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role = self.role.map(|r| r.as_str()).unwrap_or("none");
        write!(
            f,
            "{} {}: {}",
            self.created_at.format("%Y-%m-%d %H:%M:%S"),
            role,
            self.content
        )
    }
}

fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_content_is_trimmed() {
        let message = Message::user("  \n hello there \t\n");
        assert_eq!(message.content(), "hello there");
        assert_eq!(message.role(), Some(Role::User));
    }

    #[test]
    fn test_content_is_trimmed_when_deserialized() {
        let json = r#"{"role":"assistant","content":"  padded  ","created_at":"2024-03-01T10:00:00Z"}"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.content(), "padded");
    }

    #[test]
    fn test_absent_role_serializes_as_null() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let message = Message::new(None, "hi").with_created_at(ts);
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(
            json,
            r#"{"role":null,"content":"hi","created_at":"2024-03-01T10:00:00Z"}"#
        );
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let json = r#"{"role":"narrator","content":"x","created_at":"2024-03-01T10:00:00Z"}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn test_display() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let message = Message::system("be brief").with_created_at(ts);
        assert_eq!(message.to_string(), "2024-03-01 10:00:00 system: be brief");
    }
}

//! Chat session and message types for TinyChat.
//!
//! These types model conversations as they cross the storage boundary:
//! session records, messages, and the partial shapes used to create and
//! patch them. Structured `extra` data is always carried here in its
//! serialized (JSON text) form; the session cache owns the decoded value.

use serde::{Deserialize, Serialize};

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Role of the author of a chat message.
///
/// Known roles get their own variant; any other tag is preserved verbatim
/// in `Other` so drivers can round-trip roles the cache does not know about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Other(String),
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
            MessageRole::Other(tag) => write!(f, "{tag}"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "user" => MessageRole::User,
            "assistant" => MessageRole::Assistant,
            "system" => MessageRole::System,
            other => MessageRole::Other(other.to_string()),
        })
    }
}

impl From<String> for MessageRole {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => MessageRole::User,
            "assistant" => MessageRole::Assistant,
            "system" => MessageRole::System,
            _ => MessageRole::Other(value),
        }
    }
}

impl From<&str> for MessageRole {
    fn from(value: &str) -> Self {
        MessageRole::from(value.to_string())
    }
}

impl From<MessageRole> for String {
    fn from(role: MessageRole) -> Self {
        role.to_string()
    }
}

/// Public data of a chat session, as stored by drivers and broadcast to
/// subscribers.
///
/// Timestamps are Unix milliseconds. `extra` is serialized JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub title: Option<String>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub creator: Option<String>,
    pub extra: Option<String>,
}

impl SessionRecord {
    /// Timestamp used to order sessions: `updated_at` if set, else `created_at`.
    pub fn activity_at(&self) -> i64 {
        self.updated_at.unwrap_or(self.created_at)
    }
}

/// Caller-side request to create a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSession {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub extra: Option<serde_json::Value>,
}

/// Driver-side payload for `create_session`. The driver assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDraft {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub extra: Option<String>,
    pub created_at: i64,
}

/// Caller-side session update. Absent fields are left untouched, except
/// `updated_at`, which defaults to "now" when applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub title: Option<String>,
    /// Deep-merged into the session's current `extra`.
    pub extra: Option<serde_json::Value>,
    pub updated_at: Option<i64>,
}

/// Driver-side partial session update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub extra: Option<String>,
    pub updated_at: Option<i64>,
}

/// A single message within a chat session.
///
/// `parent_id` is a soft hint pointing at the message that was latest when
/// this one was created; it is never enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub content: String,
    pub role: MessageRole,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub parent_id: Option<String>,
    pub creator: Option<String>,
    pub model: Option<String>,
    pub error: Option<serde_json::Value>,
    pub extra: Option<String>,
}

impl ChatMessage {
    /// Minimal message with only the required fields set.
    pub fn new(
        id: impl Into<String>,
        session_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            content: content.into(),
            role,
            created_at,
            updated_at: None,
            parent_id: None,
            creator: None,
            model: None,
            error: None,
            extra: None,
        }
    }
}

/// Partial message update. Every present field overwrites the target's.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub role: Option<MessageRole>,
    pub parent_id: Option<String>,
    pub creator: Option<String>,
    pub model: Option<String>,
    pub error: Option<serde_json::Value>,
    pub extra: Option<String>,
    pub updated_at: Option<i64>,
}

impl MessagePatch {
    /// Patch that only replaces the content.
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Merge every present field onto `message`.
    pub fn apply_to(&self, message: &mut ChatMessage) {
        if let Some(content) = &self.content {
            message.content.clone_from(content);
        }
        if let Some(role) = &self.role {
            message.role = role.clone();
        }
        if let Some(parent_id) = &self.parent_id {
            message.parent_id = Some(parent_id.clone());
        }
        if let Some(creator) = &self.creator {
            message.creator = Some(creator.clone());
        }
        if let Some(model) = &self.model {
            message.model = Some(model.clone());
        }
        if let Some(error) = &self.error {
            message.error = Some(error.clone());
        }
        if let Some(extra) = &self.extra {
            message.extra = Some(extra.clone());
        }
        if let Some(updated_at) = self.updated_at {
            message.updated_at = Some(updated_at);
        }
    }
}

/// Result of a pessimistic (persist-then-mutate) write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The driver confirmed the write and the cache was updated.
    Persisted,
    /// The target is not resident; no driver call was made.
    NotResident,
    /// The driver rejected or failed the write; the cache is unchanged.
    Failed,
}

impl WriteOutcome {
    pub fn is_persisted(self) -> bool {
        matches!(self, WriteOutcome::Persisted)
    }
}

/// Result of an optimistic message add.
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    /// Persisted; the message now carries the backend-assigned id.
    Persisted(ChatMessage),
    /// Persistence failed; the message stays resident under its temporary id.
    Pending(ChatMessage),
}

impl AddOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, AddOutcome::Persisted(_))
    }

    pub fn message(&self) -> &ChatMessage {
        match self {
            AddOutcome::Persisted(message) | AddOutcome::Pending(message) => message,
        }
    }

    pub fn into_message(self) -> ChatMessage {
        match self {
            AddOutcome::Persisted(message) | AddOutcome::Pending(message) => message,
        }
    }
}

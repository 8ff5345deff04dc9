//! Change events broadcast by the session registry.
//!
//! There are exactly two topics. Every `ChatEvent` carries its full payload,
//! so it is Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, SessionRecord};

/// Notification topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    SessionsChanged,
    MessagesChanged,
}

/// A change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// The resident session list changed; carries the sorted resident records.
    SessionsChanged { sessions: Vec<SessionRecord> },

    /// A session's resident messages changed; carries its sorted messages.
    MessagesChanged {
        session_id: String,
        messages: Vec<ChatMessage>,
    },
}

impl ChatEvent {
    pub fn topic(&self) -> Topic {
        match self {
            ChatEvent::SessionsChanged { .. } => Topic::SessionsChanged,
            ChatEvent::MessagesChanged { .. } => Topic::MessagesChanged,
        }
    }
}

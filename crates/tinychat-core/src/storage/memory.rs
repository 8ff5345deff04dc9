//! In-memory reference implementation of `ChatStorageDriver`.
//!
//! Keeps sessions and messages in insertion order, which is also the native
//! order used for pagination. Suitable as the default driver and for tests;
//! nothing survives the process.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tinychat_types::chat::{ChatMessage, MessagePatch, SessionDraft, SessionPatch, SessionRecord};
use tinychat_types::error::RepositoryError;
use tinychat_types::id::{new_message_id, new_session_id};
use tinychat_types::pagination::Pagination;
use tracing::debug;

use super::driver::ChatStorageDriver;

#[derive(Default)]
struct MemoryState {
    sessions: Vec<SessionRecord>,
    messages: Vec<ChatMessage>,
}

/// Volatile storage driver backed by insertion-ordered vectors.
pub struct MemoryDriver {
    name: String,
    state: Mutex<MemoryState>,
}

impl MemoryDriver {
    /// Create an empty driver registered under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Number of stored sessions.
    pub fn session_count(&self) -> usize {
        self.state().sessions.len()
    }

    /// Number of stored messages across all sessions.
    pub fn message_count(&self) -> usize {
        self.state().messages.len()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MemoryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("MemoryDriver")
            .field("name", &self.name)
            .field("sessions", &state.sessions.len())
            .field("messages", &state.messages.len())
            .finish()
    }
}

impl ChatStorageDriver for MemoryDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_sessions(
        &self,
        pagination: &Pagination,
    ) -> Result<Vec<SessionRecord>, RepositoryError> {
        Ok(pagination.slice(&self.state().sessions).to_vec())
    }

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, RepositoryError> {
        Ok(self.state().sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn create_session(
        &self,
        draft: &SessionDraft,
    ) -> Result<Option<String>, RepositoryError> {
        let id = new_session_id();
        self.state().sessions.push(SessionRecord {
            id: id.clone(),
            title: draft.title.clone(),
            created_at: draft.created_at,
            updated_at: None,
            creator: draft.creator.clone(),
            extra: draft.extra.clone(),
        });
        debug!(driver = %self.name, session_id = %id, "created session");
        Ok(Some(id))
    }

    async fn update_session(
        &self,
        id: &str,
        patch: &SessionPatch,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        let Some(session) = state.sessions.iter_mut().find(|s| s.id == id) else {
            return Ok(false);
        };
        if let Some(title) = &patch.title {
            session.title = Some(title.clone());
        }
        if let Some(extra) = &patch.extra {
            session.extra = Some(extra.clone());
        }
        if let Some(updated_at) = patch.updated_at {
            session.updated_at = Some(updated_at);
        }
        Ok(true)
    }

    async fn delete_session(&self, id: &str) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        let before = state.sessions.len();
        state.sessions.retain(|s| s.id != id);
        Ok(state.sessions.len() != before)
    }

    async fn list_messages(
        &self,
        session_id: &str,
        pagination: &Pagination,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let state = self.state();
        let in_session: Vec<&ChatMessage> = state
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .collect();
        Ok(pagination
            .slice(&in_session)
            .iter()
            .map(|m| (*m).clone())
            .collect())
    }

    async fn create_message(
        &self,
        message: &ChatMessage,
    ) -> Result<Option<String>, RepositoryError> {
        let id = new_message_id();
        let mut stored = message.clone();
        stored.id = id.clone();
        self.state().messages.push(stored);
        debug!(driver = %self.name, message_id = %id, "created message");
        Ok(Some(id))
    }

    async fn update_message(
        &self,
        id: &str,
        patch: &MessagePatch,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        let Some(message) = state.messages.iter_mut().find(|m| m.id == id) else {
            return Ok(false);
        };
        patch.apply_to(message);
        Ok(true)
    }

    async fn delete_message(&self, id: &str) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        let before = state.messages.len();
        state.messages.retain(|m| m.id != id);
        Ok(state.messages.len() != before)
    }
}

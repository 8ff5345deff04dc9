//! Session cache: one session's resident messages kept in sync with the
//! active storage driver.
//!
//! Message adds are optimistic (visible locally before the driver confirms);
//! message updates, message deletes and session updates are pessimistic
//! (applied locally only after the driver confirms).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tinychat_types::chat::{
    AddOutcome, ChatMessage, MessagePatch, MessageRole, SessionPatch, SessionRecord,
    SessionUpdate, WriteOutcome,
};
use tinychat_types::error::ChatError;
use tinychat_types::extra::{decode_extra, encode_extra};
use tinychat_types::id::{new_message_id, now_millis};
use tinychat_types::pagination::{Pagination, SortDirection};
use tracing::{debug, warn};

use super::merge::deep_merge;
use super::settle;
use crate::storage::DriverRegistry;

type UpdateHook = Box<dyn Fn() + Send + Sync>;
type MessagesHook = Box<dyn Fn(&str, Vec<ChatMessage>) + Send + Sync>;

/// Callbacks a session cache fires after its state changes.
///
/// Wired by `SessionRegistry` to rebroadcast on its topics. Hooks run on the
/// calling task with no cache lock held.
pub struct SessionHooks {
    on_update: UpdateHook,
    on_messages_update: MessagesHook,
}

impl SessionHooks {
    pub fn new<U, M>(on_update: U, on_messages_update: M) -> Self
    where
        U: Fn() + Send + Sync + 'static,
        M: Fn(&str, Vec<ChatMessage>) + Send + Sync + 'static,
    {
        Self {
            on_update: Box::new(on_update),
            on_messages_update: Box::new(on_messages_update),
        }
    }
}

impl Default for SessionHooks {
    fn default() -> Self {
        Self::new(|| {}, |_, _| {})
    }
}

struct ResidentMessage {
    /// Insertion order, used to break `created_at` ties.
    seq: u64,
    message: ChatMessage,
}

struct CacheState {
    title: Option<String>,
    created_at: i64,
    updated_at: Option<i64>,
    creator: Option<String>,
    extra: Option<Value>,
    messages: HashMap<String, ResidentMessage>,
    next_seq: u64,
    latest_message_id: Option<String>,
}

impl CacheState {
    /// Insert or overwrite `message`, keeping the slot of an existing id.
    fn upsert(&mut self, message: ChatMessage) {
        match self.messages.get_mut(&message.id) {
            Some(resident) => resident.message = message,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.messages
                    .insert(message.id.clone(), ResidentMessage { seq, message });
            }
        }
    }

    fn sorted(&self, direction: SortDirection) -> Vec<ChatMessage> {
        let mut resident: Vec<&ResidentMessage> = self.messages.values().collect();
        resident.sort_by_key(|r| (r.message.created_at, r.seq));
        let mut messages: Vec<ChatMessage> =
            resident.into_iter().map(|r| r.message.clone()).collect();
        if direction == SortDirection::Descend {
            messages.reverse();
        }
        messages
    }
}

/// Cache of one chat session and its resident messages.
pub struct SessionCache {
    id: String,
    storage: Arc<DriverRegistry>,
    sort_direction: SortDirection,
    hooks: SessionHooks,
    state: Mutex<CacheState>,
}

impl SessionCache {
    /// Build a cache from a stored record.
    ///
    /// Fails with `ChatError::MalformedExtra` if `record.extra` is not valid
    /// JSON.
    pub fn new(
        record: SessionRecord,
        storage: Arc<DriverRegistry>,
        sort_direction: SortDirection,
        hooks: SessionHooks,
    ) -> Result<Self, ChatError> {
        let extra = record
            .extra
            .as_deref()
            .map(decode_extra)
            .transpose()
            .map_err(|e| ChatError::malformed_extra("session", &record.id, e))?;

        Ok(Self {
            id: record.id,
            storage,
            sort_direction,
            hooks,
            state: Mutex::new(CacheState {
                title: record.title,
                created_at: record.created_at,
                updated_at: record.updated_at,
                creator: record.creator,
                extra,
                messages: HashMap::new(),
                next_seq: 0,
                latest_message_id: None,
            }),
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> Option<String> {
        self.state().title.clone()
    }

    pub fn created_at(&self) -> i64 {
        self.state().created_at
    }

    pub fn updated_at(&self) -> Option<i64> {
        self.state().updated_at
    }

    pub fn creator(&self) -> Option<String> {
        self.state().creator.clone()
    }

    /// Decoded `extra` payload.
    pub fn extra(&self) -> Option<Value> {
        self.state().extra.clone()
    }

    pub fn latest_message_id(&self) -> Option<String> {
        self.state().latest_message_id.clone()
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    /// Number of resident messages.
    pub fn message_count(&self) -> usize {
        self.state().messages.len()
    }

    /// Public data of the session, with `extra` re-encoded to JSON text.
    pub fn record(&self) -> SessionRecord {
        let state = self.state();
        SessionRecord {
            id: self.id.clone(),
            title: state.title.clone(),
            created_at: state.created_at,
            updated_at: state.updated_at,
            creator: state.creator.clone(),
            extra: state.extra.as_ref().map(encode_extra),
        }
    }

    // -----------------------------------------------------------------------
    // Local-only operations
    // -----------------------------------------------------------------------

    /// Build a message stub for this session with a fresh id.
    ///
    /// `parent_id` points at the current latest message.
    pub fn new_message(&self, content: impl Into<String>, role: MessageRole) -> ChatMessage {
        let now = now_millis();
        let mut message = ChatMessage::new(new_message_id(), self.id.clone(), role, content, now);
        message.updated_at = Some(now);
        message.parent_id = self.latest_message_id();
        message
    }

    /// Make `message` resident without persisting it.
    pub fn add_temp(&self, message: ChatMessage) -> ChatMessage {
        self.insert_temp(message).0
    }

    /// Merge `patch` onto a resident message without persisting it.
    pub fn update_temp(&self, id: &str, patch: &MessagePatch) -> Option<ChatMessage> {
        let mut state = self.state();
        let resident = state.messages.get_mut(id)?;
        patch.apply_to(&mut resident.message);
        Some(resident.message.clone())
    }

    /// Resident lookup; never reaches the driver.
    pub fn get_message(&self, id: &str) -> Option<ChatMessage> {
        self.state().messages.get(id).map(|r| r.message.clone())
    }

    /// Sorted snapshot of the resident messages.
    ///
    /// Ordered by `created_at`, ties by residency order; `Descend` is the
    /// exact reverse of `Ascend`. Also points `latest_message_id` at the
    /// chronologically latest message.
    pub fn messages(&self, direction: Option<SortDirection>) -> Vec<ChatMessage> {
        let direction = direction.unwrap_or(self.sort_direction);
        let mut state = self.state();
        let messages = state.sorted(direction);
        let latest = match direction {
            SortDirection::Ascend => messages.last(),
            SortDirection::Descend => messages.first(),
        };
        state.latest_message_id = latest.map(|m| m.id.clone());
        messages
    }

    // -----------------------------------------------------------------------
    // Storage-backed operations
    // -----------------------------------------------------------------------

    /// Fetch a page of messages from the driver and merge it into the
    /// resident set. Returns the fetched page.
    ///
    /// Resident messages are never evicted; a fetched message overwrites a
    /// resident one with the same id.
    pub async fn load_messages(
        &self,
        pagination: &Pagination,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let driver = self.storage.resolve_active()?;
        let fetched = settle(
            "list_messages",
            driver.list_messages(&self.id, pagination).await,
        );
        for message in &fetched {
            if let Some(raw) = message.extra.as_deref() {
                decode_extra(raw).map_err(|e| ChatError::malformed_extra("message", &message.id, e))?;
            }
        }
        if fetched.is_empty() {
            return Ok(fetched);
        }

        {
            let mut state = self.state();
            for message in &fetched {
                state.upsert(message.clone());
            }
        }
        debug!(session_id = %self.id, count = fetched.len(), "loaded messages");
        self.notify_messages();
        Ok(fetched)
    }

    /// Add a message optimistically.
    ///
    /// The message is resident and announced before the driver is called. On
    /// success it is re-keyed to the backend id and the session is touched;
    /// on failure it stays resident under its temporary id.
    pub async fn add_message(&self, message: ChatMessage) -> Result<AddOutcome, ChatError> {
        let driver = self.storage.resolve_active()?;
        let (temp, previous_updated_at, stamp) = self.insert_temp(message);
        self.notify_messages();

        let Some(backend_id) = settle("create_message", driver.create_message(&temp).await) else {
            let mut state = self.state();
            if state.updated_at == Some(stamp) {
                state.updated_at = previous_updated_at;
            }
            debug!(session_id = %self.id, message_id = %temp.id, "message left pending");
            return Ok(AddOutcome::Pending(temp));
        };

        let persisted = {
            let mut state = self.state();
            let mut resident = match state.messages.remove(&temp.id) {
                Some(resident) => resident,
                None => {
                    let seq = state.next_seq;
                    state.next_seq += 1;
                    ResidentMessage {
                        seq,
                        message: temp.clone(),
                    }
                }
            };
            resident.message.id.clone_from(&backend_id);
            let persisted = resident.message.clone();
            state.messages.insert(backend_id.clone(), resident);
            state.latest_message_id = Some(backend_id);
            persisted
        };
        debug!(
            session_id = %self.id,
            temp_id = %temp.id,
            message_id = %persisted.id,
            "message persisted"
        );

        if let Err(err) = self.touch().await {
            warn!(session_id = %self.id, error = %err, "session touch failed");
        }
        self.notify_messages();
        Ok(AddOutcome::Persisted(persisted))
    }

    /// Update a resident message after the driver confirms the change.
    pub async fn update_message(
        &self,
        id: &str,
        patch: &MessagePatch,
    ) -> Result<WriteOutcome, ChatError> {
        if self.get_message(id).is_none() {
            return Ok(WriteOutcome::NotResident);
        }
        let driver = self.storage.resolve_active()?;
        if !settle("update_message", driver.update_message(id, patch).await) {
            return Ok(WriteOutcome::Failed);
        }

        self.update_temp(id, patch);
        self.touch().await?;
        self.notify_messages();
        Ok(WriteOutcome::Persisted)
    }

    /// Delete a resident message after the driver confirms the delete.
    pub async fn delete_message(&self, id: &str) -> Result<WriteOutcome, ChatError> {
        if self.get_message(id).is_none() {
            return Ok(WriteOutcome::NotResident);
        }
        let driver = self.storage.resolve_active()?;
        if !settle("delete_message", driver.delete_message(id).await) {
            return Ok(WriteOutcome::Failed);
        }

        self.state().messages.remove(id);
        self.touch().await?;
        self.notify_messages();
        Ok(WriteOutcome::Persisted)
    }

    /// Update the session's own fields.
    ///
    /// `extra` is deep-merged into the current value, `title` replaces the
    /// current one and `updated_at` defaults to now. The cache is updated
    /// before the driver is called; only `on_update` waits for the driver to
    /// confirm the patch.
    pub async fn update_session(&self, update: SessionUpdate) -> Result<WriteOutcome, ChatError> {
        let driver = self.storage.resolve_active()?;
        let updated_at = update.updated_at.unwrap_or_else(now_millis);

        let patch = {
            let mut state = self.state();
            if let Some(title) = &update.title {
                state.title = Some(title.clone());
            }
            let extra = update.extra.map(|patch| {
                let extra = state.extra.get_or_insert(Value::Null);
                deep_merge(extra, patch);
                encode_extra(extra)
            });
            state.updated_at = Some(updated_at);
            SessionPatch {
                title: update.title,
                extra,
                updated_at: Some(updated_at),
            }
        };

        if !settle("update_session", driver.update_session(&self.id, &patch).await) {
            debug!(session_id = %self.id, "session update not persisted");
            return Ok(WriteOutcome::Failed);
        }
        (self.hooks.on_update)();
        Ok(WriteOutcome::Persisted)
    }

    /// Persist a fresh `updated_at` with no other field changes.
    pub async fn touch(&self) -> Result<WriteOutcome, ChatError> {
        self.update_session(SessionUpdate::default()).await
    }

    /// Add a user message.
    pub async fn send_message(&self, content: impl Into<String>) -> Result<AddOutcome, ChatError> {
        self.receive_message(content, MessageRole::User).await
    }

    /// Add an assistant message.
    pub async fn receive_assistant_message(
        &self,
        content: impl Into<String>,
    ) -> Result<AddOutcome, ChatError> {
        self.receive_message(content, MessageRole::Assistant).await
    }

    /// Add a message with an arbitrary role.
    pub async fn receive_message(
        &self,
        content: impl Into<String>,
        role: MessageRole,
    ) -> Result<AddOutcome, ChatError> {
        let message = self.new_message(content, role);
        self.add_message(message).await
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Returns the resident copy, the `updated_at` it replaced and the stamp
    /// it set.
    fn insert_temp(&self, message: ChatMessage) -> (ChatMessage, Option<i64>, i64) {
        let stamp = now_millis();
        let mut state = self.state();
        let previous = state.updated_at.replace(stamp);
        state.latest_message_id = Some(message.id.clone());
        state.upsert(message.clone());
        (message, previous, stamp)
    }

    /// Announce the sorted view and point `latest_message_id` at its
    /// chronologically latest message.
    fn notify_messages(&self) {
        let messages = self.messages(None);
        (self.hooks.on_messages_update)(&self.id, messages);
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("id", &self.id)
            .field("sort_direction", &self.sort_direction)
            .field("messages", &self.message_count())
            .finish()
    }
}

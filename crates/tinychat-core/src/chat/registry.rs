//! Session registry: the top-level entry point.
//!
//! Owns the resident sessions, the driver registry and the event channels.
//! Every session cache it creates is wired back to it through hooks that hold
//! a weak reference, so dropping the registry frees its caches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tinychat_types::chat::{
    AddOutcome, ChatMessage, MessagePatch, NewSession, SessionDraft, SessionRecord,
    SessionUpdate, WriteOutcome,
};
use tinychat_types::config::{ChatConfig, SortConfig};
use tinychat_types::error::ChatError;
use tinychat_types::event::{ChatEvent, Topic};
use tinychat_types::extra::encode_extra;
use tinychat_types::id::now_millis;
use tinychat_types::pagination::{Pagination, SortDirection};
use tokio::sync::broadcast;
use tracing::debug;

use super::session::{SessionCache, SessionHooks};
use super::settle;
use crate::event::{EventBus, EventEmitter, SubscriptionId};
use crate::storage::{ChatStorageDriver, DriverRegistry};

struct ResidentSession {
    /// Residency order, used to break activity-time ties.
    seq: u64,
    cache: Arc<SessionCache>,
}

#[derive(Default)]
struct Residents {
    sessions: HashMap<String, ResidentSession>,
    next_seq: u64,
}

struct RegistryInner {
    residents: Mutex<Residents>,
    storage: Arc<DriverRegistry>,
    emitter: EventEmitter,
    bus: EventBus,
    sort: SortConfig,
}

impl RegistryInner {
    fn residents(&self) -> MutexGuard<'_, Residents> {
        self.residents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sessions(&self, direction: Option<SortDirection>) -> Vec<SessionRecord> {
        let direction = direction.unwrap_or(self.sort.sessions);
        let snapshot: Vec<(u64, Arc<SessionCache>)> = self
            .residents()
            .sessions
            .values()
            .map(|r| (r.seq, r.cache.clone()))
            .collect();

        let mut records: Vec<(u64, SessionRecord)> = snapshot
            .into_iter()
            .map(|(seq, cache)| (seq, cache.record()))
            .collect();
        records.sort_by_key(|(seq, record)| (record.activity_at(), *seq));
        let mut records: Vec<SessionRecord> = records.into_iter().map(|(_, r)| r).collect();
        if direction == SortDirection::Descend {
            records.reverse();
        }
        records
    }

    fn publish(&self, event: ChatEvent) {
        self.emitter.publish(&event);
        self.bus.publish(event);
    }

    fn notify_sessions(&self) {
        let sessions = self.sessions(None);
        self.publish(ChatEvent::SessionsChanged { sessions });
    }
}

/// Cache of resident chat sessions backed by the active storage driver.
///
/// Cloning is cheap and shares the same state.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    /// Create a registry from configuration. Only the memory driver is
    /// registered; other drivers are added with `register_driver`.
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                residents: Mutex::new(Residents::default()),
                storage: Arc::new(DriverRegistry::new(&config.storage)),
                emitter: EventEmitter::new(),
                bus: EventBus::new(config.events.capacity),
                sort: config.sort.clone(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Resident sessions
    // -----------------------------------------------------------------------

    /// Resident lookup; never reaches the driver.
    pub fn get_session(&self, id: &str) -> Option<Arc<SessionCache>> {
        self.inner
            .residents()
            .sessions
            .get(id)
            .map(|r| r.cache.clone())
    }

    /// Public data of the resident sessions, ordered by `updated_at` (falling
    /// back to `created_at`), ties by residency order.
    pub fn sessions(&self, direction: Option<SortDirection>) -> Vec<SessionRecord> {
        self.inner.sessions(direction)
    }

    /// Number of resident sessions.
    pub fn session_count(&self) -> usize {
        self.inner.residents().sessions.len()
    }

    /// Load one session. A resident session is returned as is, without
    /// refreshing it from the driver.
    pub async fn load_session(&self, id: &str) -> Result<Option<Arc<SessionCache>>, ChatError> {
        if let Some(cache) = self.get_session(id) {
            return Ok(Some(cache));
        }
        let driver = self.inner.storage.resolve_active()?;
        let Some(record) = settle("get_session", driver.get_session(id).await) else {
            return Ok(None);
        };

        let cache = self.register(self.build(record)?);
        debug!(session_id = %cache.id(), "loaded session");
        self.inner.notify_sessions();
        Ok(Some(cache))
    }

    /// Load a page of sessions, returning only the ones that were not
    /// already resident.
    ///
    /// Every new record is validated before any of them is registered.
    pub async fn load_sessions(
        &self,
        pagination: &Pagination,
    ) -> Result<Vec<Arc<SessionCache>>, ChatError> {
        let driver = self.inner.storage.resolve_active()?;
        let records = settle("list_sessions", driver.list_sessions(pagination).await);

        let fresh = records
            .into_iter()
            .filter(|record| self.get_session(&record.id).is_none())
            .map(|record| self.build(record))
            .collect::<Result<Vec<_>, _>>()?;
        if fresh.is_empty() {
            return Ok(Vec::new());
        }

        let loaded: Vec<Arc<SessionCache>> =
            fresh.into_iter().map(|cache| self.register(cache)).collect();
        debug!(count = loaded.len(), "loaded sessions");
        self.inner.notify_sessions();
        Ok(loaded)
    }

    /// Create a session in the driver, then make it resident.
    ///
    /// Returns `None` if the driver did not return an id.
    pub async fn add_session(
        &self,
        session: NewSession,
    ) -> Result<Option<Arc<SessionCache>>, ChatError> {
        let driver = self.inner.storage.resolve_active()?;
        let draft = SessionDraft {
            title: session.title,
            creator: session.creator,
            extra: session.extra.as_ref().map(encode_extra),
            created_at: now_millis(),
        };
        let Some(id) = settle("create_session", driver.create_session(&draft).await) else {
            return Ok(None);
        };

        let record = SessionRecord {
            id,
            title: draft.title,
            created_at: draft.created_at,
            updated_at: None,
            creator: draft.creator,
            extra: draft.extra,
        };
        let cache = self.register(self.build(record)?);
        debug!(session_id = %cache.id(), "added session");
        self.inner.notify_sessions();
        Ok(Some(cache))
    }

    /// Update a resident session.
    pub async fn update_session(
        &self,
        id: &str,
        update: SessionUpdate,
    ) -> Result<WriteOutcome, ChatError> {
        match self.get_session(id) {
            Some(cache) => cache.update_session(update).await,
            None => Ok(WriteOutcome::NotResident),
        }
    }

    /// Delete a session in the driver, then drop it from the resident set.
    ///
    /// The session does not need to be resident.
    pub async fn delete_session(&self, id: &str) -> Result<bool, ChatError> {
        let driver = self.inner.storage.resolve_active()?;
        if !settle("delete_session", driver.delete_session(id).await) {
            return Ok(false);
        }

        self.inner.residents().sessions.remove(id);
        debug!(session_id = %id, "deleted session");
        self.inner.notify_sessions();
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Message routing
    // -----------------------------------------------------------------------

    /// Load a page of messages into a resident session. Empty if the session
    /// is not resident.
    pub async fn load_messages(
        &self,
        session_id: &str,
        pagination: &Pagination,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        match self.get_session(session_id) {
            Some(cache) => cache.load_messages(pagination).await,
            None => Ok(Vec::new()),
        }
    }

    /// Add a message to a resident session. `None` if the session is not
    /// resident.
    pub async fn add_message(
        &self,
        session_id: &str,
        message: ChatMessage,
    ) -> Result<Option<AddOutcome>, ChatError> {
        match self.get_session(session_id) {
            Some(cache) => cache.add_message(message).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn update_message(
        &self,
        session_id: &str,
        id: &str,
        patch: &MessagePatch,
    ) -> Result<WriteOutcome, ChatError> {
        match self.get_session(session_id) {
            Some(cache) => cache.update_message(id, patch).await,
            None => Ok(WriteOutcome::NotResident),
        }
    }

    pub async fn delete_message(
        &self,
        session_id: &str,
        id: &str,
    ) -> Result<WriteOutcome, ChatError> {
        match self.get_session(session_id) {
            Some(cache) => cache.delete_message(id).await,
            None => Ok(WriteOutcome::NotResident),
        }
    }

    // -----------------------------------------------------------------------
    // Drivers
    // -----------------------------------------------------------------------

    pub fn storage(&self) -> &Arc<DriverRegistry> {
        &self.inner.storage
    }

    /// Register a driver under its own name, replacing any same-named one.
    pub fn register_driver<T: ChatStorageDriver + 'static>(&self, driver: T) {
        self.inner.storage.register_driver(driver);
    }

    /// Select the active driver by name.
    pub fn configure_driver(&self, name: impl Into<String>) {
        self.inner.storage.configure_active(name);
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&ChatEvent) + Send + Sync + 'static,
    {
        self.inner.emitter.subscribe(topic, handler)
    }

    pub fn subscribe_once<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&ChatEvent) + Send + Sync + 'static,
    {
        self.inner.emitter.subscribe_once(topic, handler)
    }

    pub fn unsubscribe(&self, topic: Topic, id: SubscriptionId) -> bool {
        self.inner.emitter.unsubscribe(topic, id)
    }

    /// Receive every event on an async channel.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ChatEvent> {
        self.inner.bus.subscribe()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn build(&self, record: SessionRecord) -> Result<SessionCache, ChatError> {
        SessionCache::new(
            record,
            self.inner.storage.clone(),
            self.inner.sort.messages,
            self.hooks(),
        )
    }

    fn hooks(&self) -> SessionHooks {
        let on_update: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let on_messages = on_update.clone();
        SessionHooks::new(
            move || {
                if let Some(inner) = on_update.upgrade() {
                    inner.notify_sessions();
                }
            },
            move |session_id, messages| {
                if let Some(inner) = on_messages.upgrade() {
                    inner.publish(ChatEvent::MessagesChanged {
                        session_id: session_id.to_string(),
                        messages,
                    });
                }
            },
        )
    }

    /// Make `cache` resident. If its id became resident in the meantime the
    /// existing cache wins and is returned.
    fn register(&self, cache: SessionCache) -> Arc<SessionCache> {
        let mut residents = self.inner.residents();
        if let Some(existing) = residents.sessions.get(cache.id()) {
            return existing.cache.clone();
        }
        let seq = residents.next_seq;
        residents.next_seq += 1;
        let cache = Arc::new(cache);
        residents.sessions.insert(
            cache.id().to_string(),
            ResidentSession {
                seq,
                cache: cache.clone(),
            },
        );
        cache
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(&ChatConfig::default())
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.session_count())
            .field("storage", &self.inner.storage)
            .finish()
    }
}

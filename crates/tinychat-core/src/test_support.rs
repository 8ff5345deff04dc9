//! Hand-written driver double shared by the cache and registry tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tinychat_types::chat::{ChatMessage, MessagePatch, SessionDraft, SessionPatch, SessionRecord};
use tinychat_types::error::RepositoryError;
use tinychat_types::pagination::Pagination;
use tokio::sync::oneshot;

use crate::storage::{ChatStorageDriver, DriverRegistry, MemoryDriver};

/// Knobs and counters shared between a test and its `ScriptedDriver`.
#[derive(Default)]
pub struct Probe {
    calls: AtomicUsize,
    fail_writes: AtomicBool,
    message_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
}

impl Probe {
    /// Total number of driver calls observed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every write report failure from now on.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Hold the next `create_message` call until the returned sender fires.
    pub fn gate_next_message(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.message_gates.lock().unwrap().push_back(rx);
        tx
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn failing(&self) -> bool {
        self.fail_writes.load(Ordering::SeqCst)
    }
}

/// Memory-backed driver that counts calls and can fail or stall writes.
pub struct ScriptedDriver {
    inner: MemoryDriver,
    probe: Arc<Probe>,
}

impl ScriptedDriver {
    pub fn new(name: &str) -> (Self, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let driver = Self {
            inner: MemoryDriver::new(name),
            probe: probe.clone(),
        };
        (driver, probe)
    }
}

impl ChatStorageDriver for ScriptedDriver {
    fn name(&self) -> &str {
        ChatStorageDriver::name(&self.inner)
    }

    async fn list_sessions(
        &self,
        pagination: &Pagination,
    ) -> Result<Vec<SessionRecord>, RepositoryError> {
        self.probe.hit();
        self.inner.list_sessions(pagination).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, RepositoryError> {
        self.probe.hit();
        self.inner.get_session(id).await
    }

    async fn create_session(
        &self,
        draft: &SessionDraft,
    ) -> Result<Option<String>, RepositoryError> {
        self.probe.hit();
        if self.probe.failing() {
            return Ok(None);
        }
        self.inner.create_session(draft).await
    }

    async fn update_session(
        &self,
        id: &str,
        patch: &SessionPatch,
    ) -> Result<bool, RepositoryError> {
        self.probe.hit();
        if self.probe.failing() {
            return Ok(false);
        }
        self.inner.update_session(id, patch).await
    }

    async fn delete_session(&self, id: &str) -> Result<bool, RepositoryError> {
        self.probe.hit();
        if self.probe.failing() {
            return Ok(false);
        }
        self.inner.delete_session(id).await
    }

    async fn list_messages(
        &self,
        session_id: &str,
        pagination: &Pagination,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        self.probe.hit();
        self.inner.list_messages(session_id, pagination).await
    }

    async fn create_message(
        &self,
        message: &ChatMessage,
    ) -> Result<Option<String>, RepositoryError> {
        self.probe.hit();
        let gate = self.probe.message_gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.probe.failing() {
            return Err(RepositoryError::Query("backend unavailable".to_string()));
        }
        self.inner.create_message(message).await
    }

    async fn update_message(
        &self,
        id: &str,
        patch: &MessagePatch,
    ) -> Result<bool, RepositoryError> {
        self.probe.hit();
        if self.probe.failing() {
            return Ok(false);
        }
        self.inner.update_message(id, patch).await
    }

    async fn delete_message(&self, id: &str) -> Result<bool, RepositoryError> {
        self.probe.hit();
        if self.probe.failing() {
            return Ok(false);
        }
        self.inner.delete_message(id).await
    }
}

/// Driver registry whose active driver is a fresh `ScriptedDriver`.
pub fn scripted_registry() -> (Arc<DriverRegistry>, Arc<Probe>) {
    let registry = DriverRegistry::default();
    let (driver, probe) = ScriptedDriver::new("scripted");
    registry.register_driver(driver);
    registry.configure_active("scripted");
    (Arc::new(registry), probe)
}

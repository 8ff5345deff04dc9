//! BoxChatStorageDriver -- object-safe dynamic dispatch wrapper for ChatStorageDriver.
//!
//! Same blanket-impl pattern as the other boxed ports:
//! 1. Define an object-safe `ChatStorageDriverDyn` trait with boxed futures
//! 2. Blanket-impl `ChatStorageDriverDyn` for all `T: ChatStorageDriver`
//! 3. `BoxChatStorageDriver` wraps `Arc<dyn ChatStorageDriverDyn>` and delegates

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tinychat_types::chat::{ChatMessage, MessagePatch, SessionDraft, SessionPatch, SessionRecord};
use tinychat_types::error::RepositoryError;
use tinychat_types::pagination::Pagination;

use super::driver::ChatStorageDriver;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`ChatStorageDriver`] with boxed futures.
///
/// This trait exists solely to enable dynamic dispatch (`dyn ChatStorageDriverDyn`).
/// A blanket implementation is provided for all types implementing `ChatStorageDriver`.
pub trait ChatStorageDriverDyn: Send + Sync {
    fn name(&self) -> &str;

    fn list_sessions_boxed<'a>(
        &'a self,
        pagination: &'a Pagination,
    ) -> BoxFuture<'a, Result<Vec<SessionRecord>, RepositoryError>>;

    fn get_session_boxed<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<SessionRecord>, RepositoryError>>;

    fn create_session_boxed<'a>(
        &'a self,
        draft: &'a SessionDraft,
    ) -> BoxFuture<'a, Result<Option<String>, RepositoryError>>;

    fn update_session_boxed<'a>(
        &'a self,
        id: &'a str,
        patch: &'a SessionPatch,
    ) -> BoxFuture<'a, Result<bool, RepositoryError>>;

    fn delete_session_boxed<'a>(&'a self, id: &'a str)
    -> BoxFuture<'a, Result<bool, RepositoryError>>;

    fn list_messages_boxed<'a>(
        &'a self,
        session_id: &'a str,
        pagination: &'a Pagination,
    ) -> BoxFuture<'a, Result<Vec<ChatMessage>, RepositoryError>>;

    fn create_message_boxed<'a>(
        &'a self,
        message: &'a ChatMessage,
    ) -> BoxFuture<'a, Result<Option<String>, RepositoryError>>;

    fn update_message_boxed<'a>(
        &'a self,
        id: &'a str,
        patch: &'a MessagePatch,
    ) -> BoxFuture<'a, Result<bool, RepositoryError>>;

    fn delete_message_boxed<'a>(&'a self, id: &'a str)
    -> BoxFuture<'a, Result<bool, RepositoryError>>;
}

/// Blanket implementation: any `ChatStorageDriver` automatically implements `ChatStorageDriverDyn`.
impl<T: ChatStorageDriver> ChatStorageDriverDyn for T {
    fn name(&self) -> &str {
        ChatStorageDriver::name(self)
    }

    fn list_sessions_boxed<'a>(
        &'a self,
        pagination: &'a Pagination,
    ) -> BoxFuture<'a, Result<Vec<SessionRecord>, RepositoryError>> {
        Box::pin(self.list_sessions(pagination))
    }

    fn get_session_boxed<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<SessionRecord>, RepositoryError>> {
        Box::pin(self.get_session(id))
    }

    fn create_session_boxed<'a>(
        &'a self,
        draft: &'a SessionDraft,
    ) -> BoxFuture<'a, Result<Option<String>, RepositoryError>> {
        Box::pin(self.create_session(draft))
    }

    fn update_session_boxed<'a>(
        &'a self,
        id: &'a str,
        patch: &'a SessionPatch,
    ) -> BoxFuture<'a, Result<bool, RepositoryError>> {
        Box::pin(self.update_session(id, patch))
    }

    fn delete_session_boxed<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<bool, RepositoryError>> {
        Box::pin(self.delete_session(id))
    }

    fn list_messages_boxed<'a>(
        &'a self,
        session_id: &'a str,
        pagination: &'a Pagination,
    ) -> BoxFuture<'a, Result<Vec<ChatMessage>, RepositoryError>> {
        Box::pin(self.list_messages(session_id, pagination))
    }

    fn create_message_boxed<'a>(
        &'a self,
        message: &'a ChatMessage,
    ) -> BoxFuture<'a, Result<Option<String>, RepositoryError>> {
        Box::pin(self.create_message(message))
    }

    fn update_message_boxed<'a>(
        &'a self,
        id: &'a str,
        patch: &'a MessagePatch,
    ) -> BoxFuture<'a, Result<bool, RepositoryError>> {
        Box::pin(self.update_message(id, patch))
    }

    fn delete_message_boxed<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<bool, RepositoryError>> {
        Box::pin(self.delete_message(id))
    }
}

/// Type-erased storage driver for runtime driver selection.
///
/// Since `ChatStorageDriver` uses RPITIT, it cannot be used as a trait object
/// directly. `BoxChatStorageDriver` provides equivalent methods that delegate
/// to the inner `ChatStorageDriverDyn` trait object. Cloning is cheap and
/// shares the same driver instance.
#[derive(Clone)]
pub struct BoxChatStorageDriver {
    inner: Arc<dyn ChatStorageDriverDyn>,
}

impl BoxChatStorageDriver {
    /// Wrap a concrete `ChatStorageDriver` in a type-erased box.
    pub fn new<T: ChatStorageDriver + 'static>(driver: T) -> Self {
        Self {
            inner: Arc::new(driver),
        }
    }

    /// Name under which the driver registers itself.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn list_sessions(
        &self,
        pagination: &Pagination,
    ) -> Result<Vec<SessionRecord>, RepositoryError> {
        self.inner.list_sessions_boxed(pagination).await
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, RepositoryError> {
        self.inner.get_session_boxed(id).await
    }

    pub async fn create_session(
        &self,
        draft: &SessionDraft,
    ) -> Result<Option<String>, RepositoryError> {
        self.inner.create_session_boxed(draft).await
    }

    pub async fn update_session(
        &self,
        id: &str,
        patch: &SessionPatch,
    ) -> Result<bool, RepositoryError> {
        self.inner.update_session_boxed(id, patch).await
    }

    pub async fn delete_session(&self, id: &str) -> Result<bool, RepositoryError> {
        self.inner.delete_session_boxed(id).await
    }

    pub async fn list_messages(
        &self,
        session_id: &str,
        pagination: &Pagination,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        self.inner.list_messages_boxed(session_id, pagination).await
    }

    pub async fn create_message(
        &self,
        message: &ChatMessage,
    ) -> Result<Option<String>, RepositoryError> {
        self.inner.create_message_boxed(message).await
    }

    pub async fn update_message(
        &self,
        id: &str,
        patch: &MessagePatch,
    ) -> Result<bool, RepositoryError> {
        self.inner.update_message_boxed(id, patch).await
    }

    pub async fn delete_message(&self, id: &str) -> Result<bool, RepositoryError> {
        self.inner.delete_message_boxed(id).await
    }
}

impl std::fmt::Debug for BoxChatStorageDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxChatStorageDriver")
            .field("name", &self.inner.name())
            .finish()
    }
}

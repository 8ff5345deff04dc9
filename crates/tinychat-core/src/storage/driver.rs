//! ChatStorageDriver trait definition.
//!
//! The single extensibility seam of TinyChat: any backend implementing these
//! operations can be registered and selected by name. Uses native async fn
//! in traits (RPITIT, Rust 2024 edition).

use tinychat_types::chat::{ChatMessage, MessagePatch, SessionDraft, SessionPatch, SessionRecord};
use tinychat_types::error::RepositoryError;
use tinychat_types::pagination::Pagination;

/// Storage backend for sessions and messages.
///
/// Ordinary not-found and no-op conditions are reported as values: `None`,
/// `false` or an empty page. `Err` is reserved for backend faults; callers in
/// this crate treat it exactly like a failure value.
///
/// Page ordering is driver-defined. A driver returns at most
/// `pagination.page_size` items for the requested page.
pub trait ChatStorageDriver: Send + Sync {
    /// Name under which the driver is registered.
    fn name(&self) -> &str;

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// List one page of session records in the driver's native order.
    fn list_sessions(
        &self,
        pagination: &Pagination,
    ) -> impl std::future::Future<Output = Result<Vec<SessionRecord>, RepositoryError>> + Send;

    /// Get a session record by id.
    fn get_session(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<SessionRecord>, RepositoryError>> + Send;

    /// Create a session and return its new id, or `None` if the driver declined.
    fn create_session(
        &self,
        draft: &SessionDraft,
    ) -> impl std::future::Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Apply a partial update. Returns `false` if the session does not exist.
    fn update_session(
        &self,
        id: &str,
        patch: &SessionPatch,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Delete a session. Returns `false` if it did not exist.
    fn delete_session(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    /// List one page of a session's messages in the driver's native order.
    fn list_messages(
        &self,
        session_id: &str,
        pagination: &Pagination,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// Persist a message and return the id the backend assigned to it.
    ///
    /// The incoming `message.id` is the cache's temporary id; drivers are
    /// free to ignore it.
    fn create_message(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Apply a partial update. Returns `false` if the message does not exist.
    fn update_message(
        &self,
        id: &str,
        patch: &MessagePatch,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Delete a message. Returns `false` if it did not exist.
    fn delete_message(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}

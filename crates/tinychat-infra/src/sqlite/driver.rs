//! SQLite storage driver.
//!
//! Implements `ChatStorageDriver` from `tinychat-core` with raw sqlx queries,
//! private Row structs and split reader/writer pool usage. The autoincrement
//! `seq` column is the driver's native page order.

use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tinychat_core::storage::ChatStorageDriver;
use tinychat_types::chat::{
    ChatMessage, MessagePatch, MessageRole, SessionDraft, SessionPatch, SessionRecord,
};
use tinychat_types::error::RepositoryError;
use tinychat_types::id::{new_message_id, new_session_id};
use tinychat_types::pagination::Pagination;
use tracing::debug;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatStorageDriver`.
pub struct SqliteDriver {
    name: String,
    pool: DatabasePool,
}

impl SqliteDriver {
    /// Create a driver registered under `name`, backed by `pool`.
    pub fn new(name: impl Into<String>, pool: DatabasePool) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct SessionRow {
    id: String,
    title: Option<String>,
    creator: Option<String>,
    extra: Option<String>,
    created_at: i64,
    updated_at: Option<i64>,
}

impl SessionRow {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            creator: row.try_get("creator")?,
            extra: row.try_get("extra")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_record(self) -> SessionRecord {
        SessionRecord {
            id: self.id,
            title: self.title,
            created_at: self.created_at,
            updated_at: self.updated_at,
            creator: self.creator,
            extra: self.extra,
        }
    }
}

struct MessageRow {
    id: String,
    session_id: String,
    role: String,
    content: String,
    parent_id: Option<String>,
    creator: Option<String>,
    model: Option<String>,
    error: Option<String>,
    extra: Option<String>,
    created_at: i64,
    updated_at: Option<i64>,
}

impl MessageRow {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            parent_id: row.try_get("parent_id")?,
            creator: row.try_get("creator")?,
            model: row.try_get("model")?,
            error: row.try_get("error")?,
            extra: row.try_get("extra")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let error = self
            .error
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("invalid error payload: {e}")))?;

        Ok(ChatMessage {
            id: self.id,
            session_id: self.session_id,
            content: self.content,
            role: MessageRole::from(self.role),
            created_at: self.created_at,
            updated_at: self.updated_at,
            parent_id: self.parent_id,
            creator: self.creator,
            model: self.model,
            error,
            extra: self.extra,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn query_error(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            RepositoryError::Connection(e.to_string())
        }
        other => RepositoryError::Query(other.to_string()),
    }
}

fn encode_error(error: Option<&serde_json::Value>) -> Option<String> {
    error.map(serde_json::Value::to_string)
}

fn page_bounds(pagination: &Pagination) -> (i64, i64) {
    (pagination.limit() as i64, pagination.offset() as i64)
}

// ---------------------------------------------------------------------------
// ChatStorageDriver implementation
// ---------------------------------------------------------------------------

impl ChatStorageDriver for SqliteDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_sessions(
        &self,
        pagination: &Pagination,
    ) -> Result<Vec<SessionRecord>, RepositoryError> {
        let (limit, offset) = page_bounds(pagination);
        let rows = sqlx::query("SELECT * FROM sessions ORDER BY seq ASC LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            sessions.push(SessionRow::from_row(row).map_err(query_error)?.into_record());
        }
        Ok(sessions)
    }

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => Ok(Some(
                SessionRow::from_row(&row).map_err(query_error)?.into_record(),
            )),
            None => Ok(None),
        }
    }

    async fn create_session(
        &self,
        draft: &SessionDraft,
    ) -> Result<Option<String>, RepositoryError> {
        let id = new_session_id();
        sqlx::query(
            r#"INSERT INTO sessions (id, title, creator, extra, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&draft.title)
        .bind(&draft.creator)
        .bind(&draft.extra)
        .bind(draft.created_at)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        debug!(driver = %self.name, session_id = %id, "inserted session");
        Ok(Some(id))
    }

    async fn update_session(
        &self,
        id: &str,
        patch: &SessionPatch,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE sessions
               SET title = COALESCE(?, title),
                   extra = COALESCE(?, extra),
                   updated_at = COALESCE(?, updated_at)
               WHERE id = ?"#,
        )
        .bind(&patch.title)
        .bind(&patch.extra)
        .bind(patch.updated_at)
        .bind(id)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_session(&self, id: &str) -> Result<bool, RepositoryError> {
        // Messages go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_messages(
        &self,
        session_id: &str,
        pagination: &Pagination,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let (limit, offset) = page_bounds(pagination);
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE session_id = ? ORDER BY seq ASC LIMIT ? OFFSET ?",
        )
        .bind(session_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            messages.push(MessageRow::from_row(row).map_err(query_error)?.into_message()?);
        }
        Ok(messages)
    }

    async fn create_message(
        &self,
        message: &ChatMessage,
    ) -> Result<Option<String>, RepositoryError> {
        let id = new_message_id();
        sqlx::query(
            r#"INSERT INTO messages (id, session_id, role, content, parent_id, creator, model, error, extra, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&message.session_id)
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(&message.parent_id)
        .bind(&message.creator)
        .bind(&message.model)
        .bind(encode_error(message.error.as_ref()))
        .bind(&message.extra)
        .bind(message.created_at)
        .bind(message.updated_at)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        debug!(driver = %self.name, message_id = %id, "inserted message");
        Ok(Some(id))
    }

    async fn update_message(
        &self,
        id: &str,
        patch: &MessagePatch,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE messages
               SET content = COALESCE(?, content),
                   role = COALESCE(?, role),
                   parent_id = COALESCE(?, parent_id),
                   creator = COALESCE(?, creator),
                   model = COALESCE(?, model),
                   error = COALESCE(?, error),
                   extra = COALESCE(?, extra),
                   updated_at = COALESCE(?, updated_at)
               WHERE id = ?"#,
        )
        .bind(&patch.content)
        .bind(patch.role.as_ref().map(ToString::to_string))
        .bind(&patch.parent_id)
        .bind(&patch.creator)
        .bind(&patch.model)
        .bind(encode_error(patch.error.as_ref()))
        .bind(&patch.extra)
        .bind(patch.updated_at)
        .bind(id)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_message(&self, id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn test_driver() -> (SqliteDriver, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("chat.db").display());
        let pool = DatabasePool::new(&url).await.unwrap();
        (SqliteDriver::new("sqlite", pool), dir)
    }

    fn draft(title: &str) -> SessionDraft {
        SessionDraft {
            title: Some(title.to_string()),
            creator: Some("tester".to_string()),
            extra: Some(r#"{"pinned":true}"#.to_string()),
            created_at: 1_000,
        }
    }

    async fn session(driver: &SqliteDriver) -> String {
        driver.create_session(&draft("chat")).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let (driver, _dir) = test_driver().await;
        let id = session(&driver).await;

        let record = driver.get_session(&id).await.unwrap().unwrap();
        assert_eq!(record.title.as_deref(), Some("chat"));
        assert_eq!(record.creator.as_deref(), Some("tester"));
        assert_eq!(record.extra.as_deref(), Some(r#"{"pinned":true}"#));
        assert_eq!(record.created_at, 1_000);
        assert!(record.updated_at.is_none());
        assert!(driver.get_session("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_sessions_pages_in_insertion_order() {
        let (driver, _dir) = test_driver().await;
        let mut ids = Vec::new();
        for i in 1..=25 {
            ids.push(
                driver
                    .create_session(&draft(&format!("session {i}")))
                    .await
                    .unwrap()
                    .unwrap(),
            );
        }

        let page = driver.list_sessions(&Pagination::new(2, 10)).await.unwrap();
        let page_ids: Vec<String> = page.into_iter().map(|s| s.id).collect();
        assert_eq!(page_ids, ids[10..20].to_vec());

        let tail = driver.list_sessions(&Pagination::new(3, 10)).await.unwrap();
        assert_eq!(tail.len(), 5);
    }

    #[tokio::test]
    async fn test_update_session_keeps_absent_fields() {
        let (driver, _dir) = test_driver().await;
        let id = session(&driver).await;

        let patch = SessionPatch {
            updated_at: Some(9_000),
            ..SessionPatch::default()
        };
        assert!(driver.update_session(&id, &patch).await.unwrap());

        let record = driver.get_session(&id).await.unwrap().unwrap();
        assert_eq!(record.title.as_deref(), Some("chat"));
        assert_eq!(record.extra.as_deref(), Some(r#"{"pinned":true}"#));
        assert_eq!(record.updated_at, Some(9_000));

        assert!(!driver.update_session("missing", &patch).await.unwrap());
    }

    #[tokio::test]
    async fn test_message_lifecycle() {
        let (driver, _dir) = test_driver().await;
        let session_id = session(&driver).await;

        let mut message = ChatMessage::new("temp", &session_id, MessageRole::Assistant, "draft", 5);
        message.model = Some("small".to_string());
        message.error = Some(json!({"code": 429}));
        let id = driver.create_message(&message).await.unwrap().unwrap();
        assert_ne!(id, "temp");

        let patch = MessagePatch {
            content: Some("final".to_string()),
            updated_at: Some(6),
            ..MessagePatch::default()
        };
        assert!(driver.update_message(&id, &patch).await.unwrap());

        let stored = driver
            .list_messages(&session_id, &Pagination::default())
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
        assert_eq!(stored[0].content, "final");
        assert_eq!(stored[0].role, MessageRole::Assistant);
        assert_eq!(stored[0].model.as_deref(), Some("small"));
        assert_eq!(stored[0].error, Some(json!({"code": 429})));
        assert_eq!(stored[0].updated_at, Some(6));

        assert!(driver.delete_message(&id).await.unwrap());
        assert!(!driver.delete_message(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_message_for_unknown_session_is_rejected() {
        let (driver, _dir) = test_driver().await;
        let orphan = ChatMessage::new("temp", "missing", MessageRole::User, "hi", 1);
        let err = driver.create_message(&orphan).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Query(_)));
    }

    #[tokio::test]
    async fn test_delete_session_cascades_to_messages() {
        let (driver, _dir) = test_driver().await;
        let session_id = session(&driver).await;
        for content in ["a", "b"] {
            let message = ChatMessage::new("temp", &session_id, MessageRole::User, content, 1);
            driver.create_message(&message).await.unwrap();
        }

        assert!(driver.delete_session(&session_id).await.unwrap());
        let left = driver
            .list_messages(&session_id, &Pagination::default())
            .await
            .unwrap();
        assert!(left.is_empty());
        assert!(!driver.delete_session(&session_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_pool_reports_connection_error() {
        let (driver, _dir) = test_driver().await;
        driver.pool().close().await;

        let err = driver.get_session("any").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Connection(_)));
        let err = driver.create_session(&draft("late")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Connection(_)));
    }
}

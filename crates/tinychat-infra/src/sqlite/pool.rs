//! Connection pools for the SQLite chat store.
//!
//! Writes go through one connection so SQLite never sees two writers; reads
//! use a separate read-only pool sized by `storage.max_readers`. WAL journaling
//! lets the readers run while the writer commits. Foreign keys are switched on
//! for every connection because deleting a session relies on the cascade to
//! its messages.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Reader and writer pools over one SQLite database file.
#[derive(Clone)]
pub struct DatabasePool {
    /// Read-only connections for listing and lookups.
    pub reader: SqlitePool,
    /// The single writable connection; migrations run here.
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open `database_url` with `max_readers` read connections (at least one).
    ///
    /// Creates the file if it is missing and applies pending migrations
    /// before any reader connects.
    pub async fn connect(database_url: &str, max_readers: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(max_readers.max(1))
            .connect_with(options.read_only(true))
            .await?;

        debug!(url = %database_url, max_readers, "sqlite pools open");
        Ok(Self { reader, writer })
    }

    /// Open `database_url` with the default reader count.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        Self::connect(database_url, 8).await
    }

    /// Close both pools, waiting for in-flight queries.
    pub async fn close(&self) {
        self.writer.close().await;
        self.reader.close().await;
    }
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabasePool")
            .field("readers", &self.reader.size())
            .field("writers", &self.writer.size())
            .finish()
    }
}

//! Registry bootstrap: turn a `ChatConfig` into a ready `SessionRegistry`.

use std::path::Path;

use anyhow::Context;
use tinychat_core::chat::SessionRegistry;
use tinychat_types::config::ChatConfig;
use tracing::info;

use crate::config::{default_database_url, load_config};
use crate::sqlite::{DatabasePool, SqliteDriver};

/// Name the SQLite driver is registered under.
pub const SQLITE_DRIVER_NAME: &str = "sqlite";

/// Build a registry from `config`.
///
/// Registers a `SqliteDriver` when `storage.database_url` is set, then checks
/// that the configured active driver exists.
pub async fn open_registry(config: &ChatConfig) -> anyhow::Result<SessionRegistry> {
    let registry = SessionRegistry::new(config);

    if let Some(url) = &config.storage.database_url {
        let pool = DatabasePool::connect(url, config.storage.max_readers)
            .await
            .with_context(|| format!("failed to open database at {url}"))?;
        registry.register_driver(SqliteDriver::new(SQLITE_DRIVER_NAME, pool));
    }

    registry
        .storage()
        .resolve_active()
        .context("invalid storage configuration")?;

    info!(
        driver = %registry.storage().active_name(),
        drivers = ?registry.storage().driver_names(),
        "session registry ready"
    );
    Ok(registry)
}

/// Load `tinychat.toml` from `data_dir` and build a registry from it.
///
/// Selecting the `sqlite` driver without a `database_url` uses
/// `{data_dir}/tinychat.db`.
pub async fn open_data_dir(data_dir: &Path) -> anyhow::Result<(ChatConfig, SessionRegistry)> {
    let mut config = load_config(data_dir).await;
    if config.storage.driver == SQLITE_DRIVER_NAME && config.storage.database_url.is_none() {
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
        config.storage.database_url = Some(default_database_url(data_dir));
    }

    let registry = open_registry(&config).await?;
    Ok((config, registry))
}

#[cfg(test)]
mod tests {
    use tinychat_types::chat::NewSession;
    use tinychat_types::pagination::Pagination;

    use super::*;

    #[tokio::test]
    async fn test_default_config_uses_memory_driver() {
        let registry = open_registry(&ChatConfig::default()).await.unwrap();
        assert_eq!(registry.storage().active_name(), "memory");
        assert_eq!(registry.storage().driver_names(), vec!["memory".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_driver_fails_at_startup() {
        let mut config = ChatConfig::default();
        config.storage.driver = "redis".to_string();
        let err = open_registry(&config).await.unwrap_err();
        assert!(format!("{err:#}").contains("redis"));
    }

    #[tokio::test]
    async fn test_sqlite_sessions_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("tinychat.toml"),
            "[storage]\ndriver = \"sqlite\"\n",
        )
        .await
        .unwrap();

        let session_id = {
            let (config, registry) = open_data_dir(dir.path()).await.unwrap();
            assert_eq!(config.storage.driver, "sqlite");
            let cache = registry
                .add_session(NewSession {
                    title: Some("persisted".to_string()),
                    ..NewSession::default()
                })
                .await
                .unwrap()
                .unwrap();
            cache.send_message("hello").await.unwrap();
            cache.id().to_string()
        };

        let (_, reopened) = open_data_dir(dir.path()).await.unwrap();
        let loaded = reopened.load_sessions(&Pagination::default()).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id(), session_id);
        assert!(loaded[0].updated_at().is_some());

        let messages = reopened
            .load_messages(&session_id, &Pagination::default())
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hello");
    }
}

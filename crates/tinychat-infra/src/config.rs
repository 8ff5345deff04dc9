//! Configuration loader for TinyChat.
//!
//! Reads `tinychat.toml` from the data directory (`~/.tinychat/` by default)
//! and deserializes it into [`ChatConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use tinychat_types::config::ChatConfig;

/// File name of the configuration inside the data directory.
pub const CONFIG_FILE_NAME: &str = "tinychat.toml";

/// Load configuration from `{data_dir}/tinychat.toml`.
///
/// - If the file does not exist, returns [`ChatConfig::default()`].
/// - If the file cannot be read or parsed, logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> ChatConfig {
    let config_path = data_dir.join(CONFIG_FILE_NAME);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE_NAME} found at {}, using defaults", config_path.display());
            return ChatConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ChatConfig::default();
        }
    };

    match toml::from_str::<ChatConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ChatConfig::default()
        }
    }
}

/// Resolve the data directory.
///
/// Priority:
/// 1. `TINYCHAT_DATA_DIR` environment variable
/// 2. `~/.tinychat`
/// 3. `.tinychat` in the current directory
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TINYCHAT_DATA_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".tinychat");
    }
    PathBuf::from(".tinychat")
}

/// SQLite URL of the database file inside `data_dir`.
pub fn default_database_url(data_dir: &Path) -> String {
    format!("sqlite://{}/tinychat.db", data_dir.display())
}

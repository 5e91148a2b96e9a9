//! Configuration management for tandem.
//!
//! Two files live here: `tandem.toml`, the backend endpoints (optional,
//! every field has a default), and `session.json`, the token and display
//! name of the logged-in user, kept only until logout.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tandem_chat_client::ClientConfig;

/// Name of the config file inside the data directory.
pub const CONFIG_FILE: &str = "tandem.toml";

const SESSION_FILE: &str = "session.json";

/// Backend endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the chat REST API (default: http://localhost:5000/api).
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// URL of the realtime websocket (default: ws://localhost:5000/ws).
    #[serde(default = "default_realtime_url")]
    pub realtime_url: String,
    /// Per-request timeout in seconds (default: 15).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_realtime_url() -> String {
    "ws://localhost:5000/ws".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            realtime_url: default_realtime_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid configuration file")
    }

    /// Load from `path`, or defaults if the file does not exist.
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Self::from_toml(&contents)
                .with_context(|| format!("Failed to parse {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        }
    }

    /// Default location of the config file for a data directory.
    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }

    /// Client settings for these endpoints.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_api_url(&self.api_url)
            .with_realtime_url(&self.realtime_url)
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
    }
}

/// The logged-in user, persisted between invocations.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    /// Bearer token.
    pub token: String,
    /// Display name at login.
    pub display_name: String,
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("token", &"[REDACTED]")
            .field("display_name", &self.display_name)
            .finish()
    }
}

impl StoredSession {
    /// Create a session record.
    pub fn new(token: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            display_name: display_name.into(),
        }
    }

    /// Load the stored session, if any.
    pub async fn load(data_dir: &Path) -> Result<Option<Self>> {
        let path = data_dir.join(SESSION_FILE);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read stored session"),
        };
        let session = serde_json::from_str(&contents).context("Invalid stored session")?;
        Ok(Some(session))
    }

    /// Save to the data directory, readable by the owner only.
    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(SESSION_FILE);
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, contents)
            .await
            .context("Failed to save session")?;
        set_file_permissions_0600(&path).await?;
        Ok(())
    }

    /// Remove the stored session. Missing is fine.
    pub async fn delete(data_dir: &Path) -> Result<()> {
        match tokio::fs::remove_file(data_dir.join(SESSION_FILE)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove stored session"),
        }
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

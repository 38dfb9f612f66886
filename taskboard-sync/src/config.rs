/// Client configuration.
/// Reads client.json from ~/.config/taskboard/client.json (or platform equivalent).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// User name sent with every request as `?user=`.
    #[serde(default)]
    pub user: Option<String>,
    /// User id boards are scoped to; unset shows every board.
    #[serde(default)]
    pub viewer: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Refetch the touched collections after a confirmed write too.
    #[serde(default = "default_true")]
    pub revalidate_on_success: bool,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_event_capacity() -> usize {
    256
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user: None,
            viewer: None,
            request_timeout_secs: default_timeout_secs(),
            revalidate_on_success: default_true(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Default config path: ~/.config/taskboard/client.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskboard")
        .join("client.json")
}

/// Load config from path. Returns defaults if the file is missing or invalid.
pub fn load_config(path: &Path) -> ClientConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(target: "taskboard.config", "Failed to parse config {}: {}", path.display(), e);
            ClientConfig::default()
        }),
        Err(_) => {
            log::info!(target: "taskboard.config", "No config at {}, using defaults", path.display());
            ClientConfig::default()
        }
    }
}

//! Application configuration.
//!
//! Every field has a default so a partial (or missing) config file works.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where and how documents are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Root of the export tree.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Pause after every conversation fetch, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Maximum length of the title part of a file name, in characters.
    #[serde(default = "default_max_slug_len")]
    pub max_slug_len: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            delay_ms: default_delay_ms(),
            max_slug_len: default_max_slug_len(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("exports")
}

const fn default_delay_ms() -> u64 {
    200
}

const fn default_max_slug_len() -> usize {
    80
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Scheme and host of the chat product.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Page size for the conversation listings.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Page size for project-folder listings (the endpoint caps it at 50).
    #[serde(default = "default_folder_page_size")]
    pub folder_page_size: usize,

    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            folder_page_size: default_folder_page_size(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://chatgpt.com".to_string()
}

const fn default_page_size() -> usize {
    100
}

const fn default_folder_page_size() -> usize {
    50
}

fn default_user_agent() -> String {
    format!("chat-offboard/{}", env!("CARGO_PKG_VERSION"))
}

/// Credentials and browser-profile locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Bearer token, used as-is when present.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Session cookie exchanged for a bearer token when no token is set.
    #[serde(default)]
    pub session_token: Option<String>,

    /// Workspace/account id for team accounts.
    #[serde(default)]
    pub workspace_id: Option<String>,

    /// Browser local-storage database to read listing caches from.
    #[serde(default)]
    pub local_storage_db: Option<PathBuf>,
}

/// Cache priming before the listings are read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimingConfig {
    #[serde(default = "default_ticks")]
    pub ticks: u32,

    /// Wait between ticks in milliseconds.
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,
}

impl Default for PrimingConfig {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            wait_ms: default_wait_ms(),
        }
    }
}

const fn default_ticks() -> u32 {
    20
}

const fn default_wait_ms() -> u64 {
    400
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub priming: PrimingConfig,
}

impl AppConfig {
    /// Default directory holding `config.toml`.
    #[must_use]
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chat-offboard")
    }

    /// Default config file path.
    #[must_use]
    pub fn default_config_file() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Pause between conversation fetches.
    #[must_use]
    pub const fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.export.delay_ms)
    }

    /// Wait between priming ticks.
    #[must_use]
    pub const fn priming_wait(&self) -> Duration {
        Duration::from_millis(self.priming.wait_ms)
    }
}

//! Configuration file management.
//!
//! Handles loading and saving TOML configuration files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# chat-offboard configuration
# Auto-generated - edit as needed

[export]
# Root of the export tree (relative to the working directory)
output_dir = "exports"

# Pause after every conversation fetch, in milliseconds
delay_ms = 200

# Maximum length of the title part of a file name
max_slug_len = 80

[api]
base_url = "https://chatgpt.com"
page_size = 100
folder_page_size = 50

[session]
# Bearer token; CHATGPT_ACCESS_TOKEN overrides it
# access_token = "..."

# Session cookie exchanged for a token when none is set; CHATGPT_SESSION_TOKEN overrides it
# session_token = "..."

# Workspace id for team accounts (read from the browser profile when unset)
# workspace_id = "..."

# Browser local-storage SQLite file holding the listing caches
# local_storage_db = "/path/to/localstorage.sqlite3"

[priming]
ticks = 20
wait_ms = 400
"#;

/// Load configuration from `explicit`, else from the default location.
///
/// A missing default file yields the defaults; a missing explicit file is an error.
///
/// # Errors
/// Returns error if the file cannot be read or parsed.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from_file(path);
    }

    let config_path = config_file_path();
    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        tracing::debug!(path = %config_path.display(), "No config file, using defaults");
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file {}: {e}", path.display()),
    })
}

/// Write the commented default config to `path` unless a file is already there.
///
/// Returns whether a file was created.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io("Failed to create default config", e))?;

    tracing::info!(path = %path.display(), "Created default configuration");

    Ok(true)
}

/// Get the path to the default configuration file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    AppConfig::default_config_file()
}

//! Infrastructure layer - external adapters (HTTP, browser storage, config files).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod browser_session;
pub mod config;
pub mod http_client;
pub mod local_storage;

pub use browser_session::BrowserSession;
pub use config::{config_file_path, ensure_config_exists, load_config};
pub use http_client::Credentials;

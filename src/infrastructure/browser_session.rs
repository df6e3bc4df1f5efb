//! `Session` backed by the HTTP API and a browser local-storage file.

use serde_json::Value;

use crate::domain::{AppConfig, Result, Session};

use super::http_client::{ApiClient, Credentials};
use super::local_storage::LocalStorageReader;

/// Authenticated session over the backend API plus the browser's caches.
pub struct BrowserSession {
    api: ApiClient,
    storage: LocalStorageReader,
}

impl BrowserSession {
    /// Authenticates and opens the configured local storage.
    ///
    /// # Errors
    /// Returns `AppError::Auth` if no token can be obtained, or an error if
    /// the local-storage file exists but cannot be opened.
    pub fn connect(config: &AppConfig, credentials: &Credentials) -> Result<Self> {
        let api = ApiClient::connect(&config.api, credentials)?;
        let storage = match &config.session.local_storage_db {
            Some(path) => LocalStorageReader::open(path)?,
            None => {
                tracing::info!("No local storage configured, cache fallback disabled");
                LocalStorageReader::empty()
            }
        };

        Ok(Self { api, storage })
    }
}

impl Session for BrowserSession {
    fn fetch_json(&self, path: &str) -> Result<Value> {
        self.api.get_json(path)
    }

    fn local_item(&self, key: &str) -> Result<Option<String>> {
        self.storage.get(key)
    }

    fn find_local_item(&self, fragment: &str) -> Result<Option<String>> {
        self.storage.find(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::domain::AppError;

    #[test]
    fn test_connect_requires_credentials() {
        let result = BrowserSession::connect(&AppConfig::default(), &Credentials::default());
        assert!(matches!(result, Err(AppError::Auth { .. })));
    }

    #[test]
    fn test_missing_local_storage_reads_empty() {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::default();
        config.session.local_storage_db = Some(dir.path().join("absent.sqlite3"));
        let credentials = Credentials {
            access_token: Some("tok".into()),
            ..Credentials::default()
        };

        let session = BrowserSession::connect(&config, &credentials).unwrap();
        assert_eq!(session.local_item("_account").unwrap(), None);
        assert_eq!(session.find_local_item("conversation-history").unwrap(), None);
        assert!(session.prime_cache(3, std::time::Duration::ZERO).is_ok());
    }
}

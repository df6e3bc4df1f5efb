//! Port to the authenticated browser session.
//!
//! The export pipeline never talks to the network or the browser profile
//! directly; it goes through this trait.

use std::time::Duration;

use serde_json::Value;

use super::Result;

/// Capabilities the export pipeline consumes from an authenticated session.
pub trait Session {
    /// Authenticated GET against the remote host, `path` relative to its origin.
    ///
    /// # Errors
    /// Returns `AppError::Http` on a non-success status, or a transport/parse error.
    fn fetch_json(&self, path: &str) -> Result<Value>;

    /// Read a local-storage entry by exact key.
    ///
    /// # Errors
    /// Returns error if the store cannot be queried.
    fn local_item(&self, key: &str) -> Result<Option<String>>;

    /// Read the first local-storage entry whose key contains `fragment`.
    ///
    /// # Errors
    /// Returns error if the store cannot be queried.
    fn find_local_item(&self, fragment: &str) -> Result<Option<String>>;

    /// Nudge the listing UI so it lazily fills the local cache.
    ///
    /// Sessions without a UI have nothing to prime.
    ///
    /// # Errors
    /// Returns error if the UI cannot be driven.
    fn prime_cache(&self, ticks: u32, wait: Duration) -> Result<()> {
        tracing::debug!(ticks, wait_ms = wait.as_millis(), "Session has no listing UI to prime");
        Ok(())
    }
}

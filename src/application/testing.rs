//! Scripted in-memory session for pipeline tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::domain::{AppError, Result, Session};

/// Session answering from canned responses and recording every fetch.
#[derive(Debug, Default)]
pub struct FakeSession {
    responses: HashMap<String, Value>,
    failures: HashMap<String, u16>,
    local: HashMap<String, String>,
    fetched: RefCell<Vec<String>>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `path` with `value`.
    pub fn with_json(mut self, path: &str, value: Value) -> Self {
        self.responses.insert(path.to_string(), value);
        self
    }

    /// Fail `path` with an HTTP status.
    pub fn with_failure(mut self, path: &str, status: u16) -> Self {
        self.failures.insert(path.to_string(), status);
        self
    }

    /// Seed a local-storage entry.
    pub fn with_local(mut self, key: &str, value: &str) -> Self {
        self.local.insert(key.to_string(), value.to_string());
        self
    }

    /// All fetched paths, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }

    /// Number of fetches whose path starts with `prefix`.
    pub fn fetch_count(&self, prefix: &str) -> usize {
        self.fetched
            .borrow()
            .iter()
            .filter(|p| p.starts_with(prefix))
            .count()
    }
}

impl Session for FakeSession {
    fn fetch_json(&self, path: &str) -> Result<Value> {
        self.fetched.borrow_mut().push(path.to_string());

        if let Some(status) = self.failures.get(path) {
            return Err(AppError::http(*status, "scripted failure"));
        }
        self.responses
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::http(404, &format!("no scripted response for {path}")))
    }

    fn local_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.local.get(key).cloned())
    }

    fn find_local_item(&self, fragment: &str) -> Result<Option<String>> {
        let mut keys: Vec<&String> = self.local.keys().filter(|k| k.contains(fragment)).collect();
        keys.sort();
        Ok(keys.first().and_then(|k| self.local.get(*k)).cloned())
    }
}

/// Shared buffer the test log subscriber writes into.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a thread-local subscriber and returns its plain-text log output.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (result, logs)
}

//! Read-only access to a browser local-storage `SQLite` file.
//!
//! Entries live in an `ItemTable(key, value)` table. Values are TEXT or BLOB,
//! blobs being UTF-8 or UTF-16LE encoded.

use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};

use crate::domain::{AppError, Result};

/// Local-storage reader. A missing database behaves as an empty store.
pub struct LocalStorageReader {
    conn: Option<Connection>,
}

impl LocalStorageReader {
    /// Opens a local-storage database in read-only mode.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Local storage not found, caches unavailable");
            return Ok(Self::empty());
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(AppError::database)?;

        conn.execute_batch(
            "PRAGMA query_only = ON;
             PRAGMA temp_store = MEMORY;",
        )
        .map_err(AppError::database)?;

        tracing::debug!(path = %path.display(), "Opened local storage");

        Ok(Self { conn: Some(conn) })
    }

    /// A store with no entries.
    #[must_use]
    pub const fn empty() -> Self {
        Self { conn: None }
    }

    /// Value stored under exactly `key`.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.query_one("SELECT key, value FROM ItemTable WHERE key = ?1", key)
    }

    /// Value of the first key (in key order) containing `fragment`.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn find(&self, fragment: &str) -> Result<Option<String>> {
        self.query_one(
            "SELECT key, value FROM ItemTable WHERE instr(key, ?1) > 0 ORDER BY key LIMIT 1",
            fragment,
        )
    }

    fn query_one(&self, sql: &str, param: &str) -> Result<Option<String>> {
        let Some(conn) = &self.conn else {
            return Ok(None);
        };

        let row = conn
            .query_row(sql, [param], |row| {
                let key: String = row.get(0)?;
                // Handle both TEXT and BLOB value types
                let value = match row.get_ref(1)? {
                    ValueRef::Blob(b) => decode_blob(b),
                    ValueRef::Text(t) => String::from_utf8(t.to_vec()).ok(),
                    _ => None,
                };
                Ok((key, value))
            })
            .optional()
            .map_err(AppError::database)?;

        Ok(row.and_then(|(key, value)| {
            if value.is_none() {
                tracing::warn!(key = %key, "Undecodable local storage value");
            }
            value
        }))
    }
}

/// UTF-16LE when the blob carries NUL bytes, UTF-8 otherwise.
fn decode_blob(bytes: &[u8]) -> Option<String> {
    if bytes.contains(&0) {
        if bytes.len() % 2 != 0 {
            return None;
        }
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).ok()
    } else {
        String::from_utf8(bytes.to_vec()).ok()
    }
}

//! Byte-string key/value persistence port and its backends.
//!
//! # Responsibility
//! - Define the storage contract the ViewState store writes through.
//! - Provide an in-memory fake and a SQLite-backed implementation.
//!
//! # Invariants
//! - `set` either stores the full value or fails; partial writes never land.
//! - Quota checks run before any mutation.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::view_state::now_epoch_ms;
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence failures. Callers of the ViewState store never see these;
/// they are logged and swallowed there.
#[derive(Debug)]
pub enum StoreError {
    /// Backend cannot be reached right now.
    Unavailable(String),
    /// Value exceeds the configured per-value byte budget.
    QuotaExceeded { key: String, size: usize, limit: usize },
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "storage unavailable: {reason}"),
            Self::QuotaExceeded { key, size, limit } => write!(
                f,
                "storage quota exceeded for `{key}`: {size} bytes > {limit} bytes"
            ),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Unavailable(_) | Self::QuotaExceeded { .. } => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage contract consumed by the ViewState store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;
    fn remove(&self, key: &str) -> StoreResult<()>;
}

fn check_quota(key: &str, size: usize, limit: Option<usize>) -> StoreResult<()> {
    match limit {
        Some(limit) if size > limit => Err(StoreError::QuotaExceeded {
            key: key.to_string(),
            size,
            limit,
        }),
        _ => Ok(()),
    }
}

/// In-process key/value store.
///
/// Availability and quota can be toggled at runtime to exercise failure
/// paths without a real backend.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RefCell<HashMap<String, Vec<u8>>>,
    max_value_bytes: Cell<Option<usize>>,
    unavailable: Cell<bool>,
    write_count: Cell<usize>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps every stored value at `limit` bytes.
    pub fn with_quota(limit: usize) -> Self {
        let store = Self::default();
        store.max_value_bytes.set(Some(limit));
        store
    }

    pub fn set_quota(&self, limit: Option<usize>) {
        self.max_value_bytes.set(limit);
    }

    /// Makes every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.unavailable.set(!available);
    }

    /// Number of successful `set` calls.
    pub fn write_count(&self) -> usize {
        self.write_count.get()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.unavailable.get() {
            return Err(StoreError::Unavailable("memory store disabled".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.ensure_available()?;
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.ensure_available()?;
        check_quota(key, value.len(), self.max_value_bytes.get())?;
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_vec());
        self.write_count.set(self.write_count.get() + 1);
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.ensure_available()?;
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// SQLite-backed key/value store over the `kv_entries` table.
pub struct SqliteKeyValueStore {
    conn: Connection,
    max_value_bytes: Option<usize>,
}

impl SqliteKeyValueStore {
    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens (and migrates) a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            max_value_bytes: None,
        }
    }

    /// Caps every stored value at `limit` bytes.
    pub fn with_quota(mut self, limit: usize) -> Self {
        self.max_value_bytes = Some(limit);
        self
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                params![key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        check_quota(key, value.len(), self.max_value_bytes)?;
        self.conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value, now_epoch_ms()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.conn
            .execute("DELETE FROM kv_entries WHERE key = ?1;", params![key])?;
        Ok(())
    }
}

pub mod queries;
pub mod schema;
pub mod write;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Error, Result};
use rusqlite::Connection;

/// Durable key-value state, injected into the record store.
pub trait StateStorage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// Open or create the database at `path`, applying schema if needed
pub fn open_or_create_db(path: &Path) -> Result<Connection> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::PersistenceUnavailable(format!("{}: {e}", parent.display()))
            })?;
        }
    }

    let conn = Connection::open(path)?;
    schema::initialize_schema(&conn)?;

    Ok(conn)
}

#[cfg(test)]
pub fn open_test_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    schema::initialize_schema(&conn)?;
    Ok(conn)
}

/// SQLite-backed state, one row per key.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_connection(open_or_create_db(path)?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::PersistenceUnavailable("connection lock poisoned".to_string()))?;
        f(&conn)
    }
}

impl StateStorage for SqliteStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| queries::read_state(conn, key))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| write::write_state(conn, key, value))
    }
}

/// Process-local state; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| Error::PersistenceUnavailable("state lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::PersistenceUnavailable("state lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

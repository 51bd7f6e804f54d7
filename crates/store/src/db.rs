use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use duckdb::Connection;
use telesink_core::error::{Result, TelesinkError};

use crate::schema::SCHEMA_SQL;

/// DuckDB-backed record table.
///
/// One connection is opened per process and shared behind a mutex; every
/// call borrows it through a guard that is released on all exit paths.
#[derive(Clone)]
pub struct DbStore {
    conn: Arc<Mutex<Connection>>,
    location: String,
}

impl DbStore {
    /// Accepts a file path, `duckdb://<path>`, or `:memory:`.
    pub fn open(url: &str) -> Result<Self> {
        let location = url.strip_prefix("duckdb://").unwrap_or(url).trim();
        if location.is_empty() || location == ":memory:" {
            return Self::open_in_memory();
        }

        let path = Path::new(location);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| TelesinkError::Io(format!("failed to create db dir: {e}")))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| TelesinkError::Store(format!("failed to open duckdb: {e}")))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| TelesinkError::Store(format!("failed to initialize schema: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: path.display().to_string(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TelesinkError::Store(format!("failed to open in-memory db: {e}")))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| TelesinkError::Store(format!("failed to initialize schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: ":memory:".to_string(),
        })
    }

    pub(crate) fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::Result;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

/// Where records live. Chosen once at startup and handed to [`Database::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// SQLite database file, created if missing.
    Sqlite { path: PathBuf },
    /// Process-local SQLite database; everything is lost on exit.
    Memory,
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(backend: &StorageBackend) -> Result<Self> {
        let conn = match backend {
            StorageBackend::Sqlite { path } => {
                let conn = Connection::open(path)?;
                // WAL mode for concurrent reads
                conn.pragma_update(None, "journal_mode", "WAL")?;
                info!("Database opened at {}", path.display());
                conn
            }
            StorageBackend::Memory => {
                let conn = Connection::open_in_memory()?;
                info!("In-memory database opened");
                conn
            }
        };

        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(&StorageBackend::Memory)
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Like [`with_conn`](Self::with_conn) but hands out a mutable connection,
    /// for work that needs a transaction.
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&mut conn)
    }
}

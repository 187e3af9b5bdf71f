//! SQLite connection and schema management.
//!
//! One connection per process, shared behind a mutex. Every repository call
//! takes the guard for the duration of its statements only.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info};

use super::StoreError;

const SCHEMA_VERSION: i32 = 1;

/// Shared handle to the application database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database file, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let existed = path.exists();
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        if !existed {
            info!(target: "fitchallenge_backend", path = %path.display(), "Database created");
        }
        Self::from_connection(conn)
    }

    /// Private in-memory database; used by tests and throwaway runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Lock the connection. A poisoned lock is reported, not unwrapped.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        let version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )?;
        if version < SCHEMA_VERSION {
            conn.execute(
                "INSERT OR REPLACE INTO schema_version VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
        }
        debug!(target: "fitchallenge_backend", version = SCHEMA_VERSION, "Schema ready");
        Ok(())
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS challenges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    category TEXT NOT NULL,
    difficulty INTEGER NOT NULL,
    duration_minutes INTEGER NOT NULL,
    image_path TEXT
);
CREATE INDEX IF NOT EXISTS idx_challenge_category ON challenges(category COLLATE NOCASE);

-- Exactly one row (id = 1)
CREATE TABLE IF NOT EXISTS user_stats (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    total_challenges_completed INTEGER NOT NULL DEFAULT 0,
    total_minutes_exercised INTEGER NOT NULL DEFAULT 0,
    streak_days INTEGER NOT NULL DEFAULT 0,
    last_challenge_date TEXT
);
INSERT OR IGNORE INTO user_stats (id) VALUES (1);

-- challenge_id is not enforced: history outlives deleted challenges
CREATE TABLE IF NOT EXISTS completed_challenges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    challenge_id INTEGER NOT NULL,
    completion_date TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_completion_date ON completed_challenges(completion_date);
CREATE INDEX IF NOT EXISTS idx_completion_challenge ON completed_challenges(challenge_id);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
"#;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Result, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Local store for the bearer token the CLI logs in with
pub struct SessionStore {
    conn: Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthProvider {
    Password,
    Google,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Password => "password",
            AuthProvider::Google => "google",
        }
    }

    fn from_db(s: &str) -> Self {
        match s {
            "google" => AuthProvider::Google,
            _ => AuthProvider::Password,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub username: String,
    pub provider: AuthProvider,
    pub access_token: String,
    pub created_at: i64,
}

impl SessionStore {
    /// Delete the database file along with its WAL sidecars
    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)?;
        for suffix in ["-wal", "-shm"] {
            let mut sidecar = path.as_os_str().to_owned();
            sidecar.push(suffix);
            match fs::remove_file(&sidecar) {
                Err(e) if e.kind() != ErrorKind::NotFound => return Err(e),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        let store = SessionStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    provider TEXT NOT NULL CHECK(provider IN ('password', 'google')),
    access_token TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_created ON sessions(created_at);
            ",
        )?;
        Ok(())
    }

    pub fn save_session(
        &self,
        username: &str,
        provider: AuthProvider,
        access_token: &str,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO sessions (username, provider, access_token, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![username, provider.as_str(), access_token, Utc::now().timestamp()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent login, if any
    pub fn current(&self) -> Result<Option<Session>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, username, provider, access_token, created_at
             FROM sessions ORDER BY created_at DESC, id DESC LIMIT 1",
        )?;

        stmt.query_row([], |row| {
            let provider: String = row.get(2)?;
            Ok(Session {
                id: row.get(0)?,
                username: row.get(1)?,
                provider: AuthProvider::from_db(&provider),
                access_token: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()
    }

    /// Forget every stored login; returns how many were removed
    pub fn clear(&self) -> Result<usize> {
        self.conn.execute("DELETE FROM sessions", [])
    }
}

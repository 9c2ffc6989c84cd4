//! SQLite-backed persistent session.
//!
//! Table:
//! - `session`: single row (`id = 1`) holding token, user JSON, saved_at
//!
//! Token and user live in one row, so a save or clear is one statement and
//! a concurrent `load` sees either the previous pair or the new one.

use super::roles::{normalize_user, User};
use anyhow::{bail, Result};
use parking_lot::Mutex;
use std::path::Path;

/// Token values some clients wrote for "no token".
const ABSENT_TOKEN_SENTINELS: &[&str] = &["undefined", "null"];

/// An authenticated session: bearer token plus normalized user.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

pub struct SessionStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SessionStore {
    /// Open (or create) the session database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = rusqlite::Connection::open(db_path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Self::init_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store (for tests and throwaway sessions).
    pub fn in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Self::init_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_tables(conn: &rusqlite::Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS session (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                token TEXT NOT NULL,
                user_json TEXT NOT NULL,
                saved_at INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Persist token and user as one record, replacing any previous one.
    pub fn save(&self, token: &str, user: &User) -> Result<()> {
        if is_absent_token(token) {
            bail!("Refusing to persist an empty session token");
        }
        let user_json = serde_json::to_string(user)?;
        let now = chrono::Utc::now().timestamp();

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO session (id, token, user_json, saved_at)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                token = excluded.token,
                user_json = excluded.user_json,
                saved_at = excluded.saved_at",
            rusqlite::params![token, user_json, now],
        )?;
        Ok(())
    }

    /// Load the persisted session.
    ///
    /// A missing or sentinel token, or a user record that no longer parses,
    /// clears the store and yields `None`. Never errors.
    pub fn load(&self) -> Option<Session> {
        let row: rusqlite::Result<(String, String)> = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT token, user_json FROM session WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
        };

        let (token, user_json) = match row {
            Ok(r) => r,
            Err(rusqlite::Error::QueryReturnedNoRows) => return None,
            Err(e) => {
                tracing::warn!("Failed to read persisted session: {e}");
                self.clear_quietly();
                return None;
            }
        };

        if is_absent_token(&token) {
            tracing::warn!("Persisted session has no usable token; clearing");
            self.clear_quietly();
            return None;
        }

        let user = serde_json::from_str::<serde_json::Value>(&user_json)
            .ok()
            .and_then(|v| normalize_user(Some(&v)));
        match user {
            Some(user) => Some(Session { token, user }),
            None => {
                tracing::warn!("Persisted user record is corrupt; clearing session");
                self.clear_quietly();
                None
            }
        }
    }

    /// Remove the persisted session.
    pub fn clear(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM session", [])?;
        Ok(())
    }

    fn clear_quietly(&self) {
        if let Err(e) = self.clear() {
            tracing::warn!("Failed to clear session store: {e}");
        }
    }

    /// Test hook: write a raw row, bypassing validation.
    #[cfg(test)]
    fn write_raw(&self, token: &str, user_json: &str) {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO session (id, token, user_json, saved_at) VALUES (1, ?1, ?2, 0)",
            rusqlite::params![token, user_json],
        )
        .unwrap();
    }

    /// Test hook: make every later write fail.
    #[cfg(test)]
    pub(crate) fn drop_table(&self) {
        self.conn.lock().execute_batch("DROP TABLE session").unwrap();
    }
}

fn is_absent_token(token: &str) -> bool {
    let t = token.trim();
    t.is_empty() || ABSENT_TOKEN_SENTINELS.contains(&t)
}

// ── Tests ───────────────────────────────────────────────────────────

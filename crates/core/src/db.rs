// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed snapshot storage.
//!
//! One row per owner address holds the canonical snapshot JSON and its
//! version. Writes replace the whole row inside a transaction and are
//! guarded by a compare-and-swap on the stored version, so a writer that
//! loaded an older version cannot clobber a newer one.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::breaker::CircuitBreakerState;
use crate::codec::{decode_snapshot, encode_snapshot};
use crate::error::{Error, Result};
use crate::snapshot::Snapshot;

/// SQL schema for the snapshot store.
pub const SCHEMA: &str = r#"
-- Current snapshot per owner
CREATE TABLE IF NOT EXISTS snapshots (
    address TEXT PRIMARY KEY,
    version INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    content BLOB NOT NULL,
    updated_at TEXT NOT NULL
);

-- Records that failed to decode, kept for manual recovery
CREATE TABLE IF NOT EXISTS snapshot_quarantine (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    address TEXT NOT NULL,
    version INTEGER NOT NULL,
    content BLOB NOT NULL,
    reason TEXT NOT NULL,
    quarantined_at TEXT NOT NULL
);

-- Circuit breaker memory between processes
CREATE TABLE IF NOT EXISTS breaker_state (
    address TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_quarantine_address ON snapshot_quarantine(address);
"#;

/// Result of loading an owner's snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stored {
    Missing,
    Found(Snapshot),
    /// A row exists but does not decode.
    Corrupt { version: u64, reason: String },
}

/// Persistence for owner snapshots.
pub trait SnapshotStore: Send + Sync {
    fn load(&self, address: &str) -> Result<Stored>;

    /// Writes `snapshot` if the stored version still equals `expected`
    /// (`None` meaning no row). Returns false when another writer won.
    fn save_if_version(&self, snapshot: &Snapshot, expected: Option<u64>) -> Result<bool>;

    /// Moves the stored row aside. Returns false if there was no row.
    fn quarantine(&self, address: &str, reason: &str) -> Result<bool>;
}

/// A quarantined snapshot record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantineRecord {
    pub address: String,
    pub version: u64,
    pub content: Vec<u8>,
    pub reason: String,
    pub quarantined_at: DateTime<Utc>,
}

fn to_sql_version(version: u64) -> Result<i64> {
    i64::try_from(version).map_err(|_| Error::CorruptedData(format!("version {version} out of range")))
}

fn from_sql_version(version: i64) -> std::result::Result<u64, rusqlite::Error> {
    u64::try_from(version).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Integer,
            Box::new(Error::CorruptedData(format!("negative version {version}"))),
        )
    })
}

/// Parse an RFC3339 timestamp from the database.
fn parse_timestamp(value: &str, column: &str) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!("invalid timestamp '{value}' in column '{column}'"))),
        )
    })
}

/// SQLite database holding owner snapshots.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open a database at the given path, creating it if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Database { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Database { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stored version for an owner, if any.
    pub fn stored_version(&self, address: &str) -> Result<Option<u64>> {
        let conn = self.lock();
        let version = conn
            .query_row("SELECT version FROM snapshots WHERE address = ?1", [address], |row| {
                from_sql_version(row.get(0)?)
            })
            .optional()?;
        Ok(version)
    }

    /// All owner addresses with a stored snapshot.
    pub fn addresses(&self) -> Result<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT address FROM snapshots ORDER BY address")?;
        let addresses = stmt.query_map([], |row| row.get(0))?.collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(addresses)
    }

    pub fn quarantined(&self, address: &str) -> Result<Vec<QuarantineRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT address, version, content, reason, quarantined_at
             FROM snapshot_quarantine WHERE address = ?1 ORDER BY id",
        )?;
        let records = stmt
            .query_map([address], |row| {
                let quarantined_at: String = row.get(4)?;
                Ok(QuarantineRecord {
                    address: row.get(0)?,
                    version: from_sql_version(row.get(1)?)?,
                    content: row.get(2)?,
                    reason: row.get(3)?,
                    quarantined_at: parse_timestamp(&quarantined_at, "quarantined_at")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn load_breaker(&self, address: &str) -> Result<Option<CircuitBreakerState>> {
        let conn = self.lock();
        let state: Option<String> = conn
            .query_row("SELECT state FROM breaker_state WHERE address = ?1", [address], |row| row.get(0))
            .optional()?;
        match state {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn save_breaker(&self, address: &str, state: &CircuitBreakerState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.lock().execute(
            "INSERT INTO breaker_state (address, state, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(address) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
            params![address, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

impl SnapshotStore for Database {
    fn load(&self, address: &str) -> Result<Stored> {
        let row: Option<(i64, Vec<u8>)> = self
            .lock()
            .query_row("SELECT version, content FROM snapshots WHERE address = ?1", [address], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?;

        let Some((version, content)) = row else {
            return Ok(Stored::Missing);
        };
        match decode_snapshot(&content) {
            Ok(snapshot) => Ok(Stored::Found(snapshot)),
            Err(e) => {
                tracing::warn!(owner = address, error = %e, "stored snapshot does not decode");
                Ok(Stored::Corrupt { version: u64::try_from(version).unwrap_or_default(), reason: e.to_string() })
            }
        }
    }

    fn save_if_version(&self, snapshot: &Snapshot, expected: Option<u64>) -> Result<bool> {
        let content = encode_snapshot(snapshot)?;
        let version = to_sql_version(snapshot.meta.version)?;
        let address = &snapshot.meta.address;

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let current = tx
            .query_row("SELECT version FROM snapshots WHERE address = ?1", [address], |row| {
                from_sql_version(row.get(0)?)
            })
            .optional()?;
        if current != expected {
            tracing::debug!(owner = %address, ?current, ?expected, "stale snapshot write rejected");
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO snapshots (address, version, content_hash, content, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(address) DO UPDATE SET
                 version = excluded.version,
                 content_hash = excluded.content_hash,
                 content = excluded.content,
                 updated_at = excluded.updated_at",
            params![address, version, snapshot.content_hash().as_str(), content, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn quarantine(&self, address: &str, reason: &str) -> Result<bool> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let moved = tx.execute(
            "INSERT INTO snapshot_quarantine (address, version, content, reason, quarantined_at)
             SELECT address, version, content, ?2, ?3 FROM snapshots WHERE address = ?1",
            params![address, reason, Utc::now().to_rfc3339()],
        )?;
        tx.execute("DELETE FROM snapshots WHERE address = ?1", [address])?;
        tx.commit()?;
        if moved > 0 {
            tracing::warn!(owner = address, reason, "quarantined stored snapshot");
        }
        Ok(moved > 0)
    }
}

/// Stores a raw row, bypassing encoding. Used to simulate corruption.
#[cfg(test)]
pub(crate) fn put_raw(db: &Database, address: &str, version: i64, content: &[u8]) -> Result<()> {
    db.lock().execute(
        "INSERT OR REPLACE INTO snapshots (address, version, content_hash, content, updated_at)
         VALUES (?1, ?2, '', ?3, ?4)",
        params![address, version, content, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;

// src/db/models/mirror_state.rs

//! MirrorState - bookkeeping for the local metadata mirror

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Location, origin and revision of the local mirror
///
/// Timestamps are RFC 3339 strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorState {
    pub local_path: String,
    pub remote_url: String,
    pub current_commit_hash: Option<String>,
    pub last_fetch_timestamp: Option<String>,
    pub last_successful_sync: Option<String>,
}

impl MirrorState {
    pub fn new(local_path: String, remote_url: String) -> Self {
        Self {
            local_path,
            remote_url,
            ..Default::default()
        }
    }

    /// Insert or replace the row for this mirror
    pub fn save(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO mirror_state (local_path, remote_url, current_commit, last_fetch, last_successful_sync)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(local_path) DO UPDATE SET
                remote_url = excluded.remote_url,
                current_commit = excluded.current_commit,
                last_fetch = excluded.last_fetch,
                last_successful_sync = excluded.last_successful_sync",
            params![
                &self.local_path,
                &self.remote_url,
                &self.current_commit_hash,
                &self.last_fetch_timestamp,
                &self.last_successful_sync,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_path(conn: &Connection, local_path: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT local_path, remote_url, current_commit, last_fetch, last_successful_sync
             FROM mirror_state WHERE local_path = ?1",
        )?;
        let state = stmt.query_row([local_path], Self::from_row).optional()?;
        Ok(state)
    }

    /// Stamp the time of the last fully successful sync cycle
    pub fn record_successful_sync(conn: &Connection, local_path: &str, at: &str) -> Result<()> {
        conn.execute(
            "UPDATE mirror_state SET last_successful_sync = ?2 WHERE local_path = ?1",
            params![local_path, at],
        )?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            local_path: row.get(0)?,
            remote_url: row.get(1)?,
            current_commit_hash: row.get(2)?,
            last_fetch_timestamp: row.get(3)?,
            last_successful_sync: row.get(4)?,
        })
    }
}

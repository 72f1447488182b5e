// src/db/models/installed.rs

//! InstalledRecord - one row per installed package

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashSet;

/// Persisted state of an installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledRecord {
    pub id: String,
    pub installed_version: String,
    pub install_path: String,
    pub size_bytes: u64,
    pub needs_update: bool,
    pub needs_maintenance: bool,
    pub maintenance_reason: Option<String>,
    pub installed_at: Option<String>,
    pub updated_at: Option<String>,
}

const COLUMNS: &str = "id, installed_version, install_path, size_bytes, needs_update, \
                       needs_maintenance, maintenance_reason, installed_at, updated_at";

impl InstalledRecord {
    pub fn new(id: String, installed_version: String, install_path: String) -> Self {
        Self {
            id,
            installed_version,
            install_path,
            size_bytes: 0,
            needs_update: false,
            needs_maintenance: false,
            maintenance_reason: None,
            installed_at: None,
            updated_at: None,
        }
    }

    /// Insert a new record
    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO installed_packages
                (id, installed_version, install_path, size_bytes, needs_update, needs_maintenance, maintenance_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &self.id,
                &self.installed_version,
                &self.install_path,
                self.size_bytes as i64,
                self.needs_update as i32,
                self.needs_maintenance as i32,
                &self.maintenance_reason,
            ],
        )?;
        Ok(())
    }

    /// Rewrite an existing record in place (update and repair paths)
    pub fn update(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "UPDATE installed_packages
             SET installed_version = ?2, install_path = ?3, size_bytes = ?4, needs_update = ?5,
                 needs_maintenance = ?6, maintenance_reason = ?7, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?1",
            params![
                &self.id,
                &self.installed_version,
                &self.install_path,
                self.size_bytes as i64,
                self.needs_update as i32,
                self.needs_maintenance as i32,
                &self.maintenance_reason,
            ],
        )?;
        Ok(())
    }

    /// Set the update/maintenance flags of a record
    ///
    /// Returns false if no such package is installed.
    pub fn set_flags(
        conn: &Connection,
        id: &str,
        needs_update: bool,
        needs_maintenance: bool,
        maintenance_reason: Option<&str>,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE installed_packages
             SET needs_update = ?2, needs_maintenance = ?3, maintenance_reason = ?4,
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?1",
            params![id, needs_update as i32, needs_maintenance as i32, maintenance_reason],
        )?;
        Ok(changed > 0)
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM installed_packages WHERE id = ?1"
        ))?;
        let record = stmt.query_row([id], Self::from_row).optional()?;
        Ok(record)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM installed_packages ORDER BY id"
        ))?;
        let records = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Ids of every installed package
    pub fn installed_ids(conn: &Connection) -> Result<HashSet<String>> {
        let mut stmt = conn.prepare("SELECT id FROM installed_packages")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// Delete a record, returning whether one existed
    pub fn delete(conn: &Connection, id: &str) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM installed_packages WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            installed_version: row.get(1)?,
            install_path: row.get(2)?,
            size_bytes: row.get::<_, i64>(3)?.max(0) as u64,
            needs_update: row.get::<_, i32>(4)? != 0,
            needs_maintenance: row.get::<_, i32>(5)? != 0,
            maintenance_reason: row.get(6)?,
            installed_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

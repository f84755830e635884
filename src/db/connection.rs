use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

use crate::db::store::{DocumentBackup, KeyValueStore, BACKUPS_TO_KEEP};
use crate::error::{JournalError, Result};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS document_backups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    storage_key TEXT NOT NULL,
    label TEXT NOT NULL,
    checksum TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_document_backups_key ON document_backups(storage_key);
";

/// SQLite-backed key-value store holding the journal document.
pub struct Database {
    pub conn: Mutex<Connection>,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;

        log::info!("Opened journal database at {}", db_path);
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| JournalError::DatabaseError(e.to_string()))
    }
}

impl KeyValueStore for Database {
    fn load_raw(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv_store WHERE key = ?", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn save_raw(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn backup_raw(&self, key: &str, label: &str, value: &str) -> Result<()> {
        let backup = DocumentBackup::new(key, label, value);
        let conn = self.lock()?;

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO document_backups (storage_key, label, checksum, body, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                backup.storage_key,
                backup.label,
                backup.checksum,
                backup.body,
                backup.created_at
            ],
        )?;

        // Keep the newest backups only
        tx.execute(
            "DELETE FROM document_backups
             WHERE storage_key = ?1
             AND id NOT IN (
                 SELECT id FROM document_backups WHERE storage_key = ?1 ORDER BY id DESC LIMIT ?2
             )",
            params![key, BACKUPS_TO_KEEP as i64],
        )?;
        tx.commit()?;

        log::info!("Backup created: {} ({} bytes, sha256 {})", label, value.len(), backup.checksum);
        Ok(())
    }

    fn list_backups(&self, key: &str) -> Result<Vec<DocumentBackup>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT storage_key, label, checksum, body, created_at
             FROM document_backups WHERE storage_key = ? ORDER BY id DESC",
        )?;
        let backups = stmt
            .query_map([key], |row| {
                Ok(DocumentBackup {
                    storage_key: row.get(0)?,
                    label: row.get(1)?,
                    checksum: row.get(2)?,
                    body: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(backups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::checksum;

    #[test]
    fn test_missing_key_is_absent() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.load_raw("leverage-calculator").unwrap(), None);
    }

    #[test]
    fn test_save_overwrites() {
        let db = Database::open_in_memory().unwrap();
        db.save_raw("k", r#"{"a":1}"#).unwrap();
        db.save_raw("k", r#"{"a":2}"#).unwrap();
        assert_eq!(db.load_raw("k").unwrap().as_deref(), Some(r#"{"a":2}"#));

        let rows: i64 = db
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_backups_are_rotated() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..8 {
            db.backup_raw("k", &format!("pre_migration_{}", i), "{}").unwrap();
        }
        let backups = db.list_backups("k").unwrap();
        assert_eq!(backups.len(), BACKUPS_TO_KEEP);
        assert_eq!(backups[0].label, "pre_migration_7");
        assert_eq!(backups[0].checksum, checksum("{}"));
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        let path = path.to_str().unwrap();

        {
            let db = Database::new(path).unwrap();
            db.save_raw("k", "v").unwrap();
        }
        let db = Database::new(path).unwrap();
        assert_eq!(db.load_raw("k").unwrap().as_deref(), Some("v"));
    }
}

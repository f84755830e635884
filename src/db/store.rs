use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{JournalError, Result};

/// How many pre-migration backups are kept per storage key.
pub const BACKUPS_TO_KEEP: usize = 5;

/// Raw text snapshot taken before a persisted document is rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBackup {
    pub storage_key: String,
    pub label: String,
    pub checksum: String,
    pub body: String,
    pub created_at: i64,
}

impl DocumentBackup {
    pub fn new(storage_key: &str, label: &str, body: &str) -> Self {
        Self {
            storage_key: storage_key.to_string(),
            label: label.to_string(),
            checksum: checksum(body),
            body: body.to_string(),
            created_at: Utc::now().timestamp(),
        }
    }
}

/// Hex SHA-256 of a document body.
pub fn checksum(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The only persistence surface the journal needs: whole-document get and set.
pub trait KeyValueStore {
    fn load_raw(&self, key: &str) -> Result<Option<String>>;

    /// Replaces the document under `key` in full.
    fn save_raw(&self, key: &str, value: &str) -> Result<()>;

    fn backup_raw(&self, key: &str, label: &str, value: &str) -> Result<()>;

    /// Newest first.
    fn list_backups(&self, key: &str) -> Result<Vec<DocumentBackup>>;
}

/// Volatile store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    backups: Mutex<Vec<DocumentBackup>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(key: &str, value: &str) -> Self {
        let store = Self::new();
        if let Ok(mut values) = store.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
        store
    }
}

fn poisoned<T>(err: std::sync::PoisonError<T>) -> JournalError {
    JournalError::DatabaseError(err.to_string())
}

impl KeyValueStore for MemoryStore {
    fn load_raw(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().map_err(poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn save_raw(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn backup_raw(&self, key: &str, label: &str, value: &str) -> Result<()> {
        let mut backups = self.backups.lock().map_err(poisoned)?;
        backups.push(DocumentBackup::new(key, label, value));

        let for_key = backups.iter().filter(|b| b.storage_key == key).count();
        if for_key > BACKUPS_TO_KEEP {
            let mut to_drop = for_key - BACKUPS_TO_KEEP;
            backups.retain(|b| {
                if to_drop > 0 && b.storage_key == key {
                    to_drop -= 1;
                    false
                } else {
                    true
                }
            });
        }
        Ok(())
    }

    fn list_backups(&self, key: &str) -> Result<Vec<DocumentBackup>> {
        let backups = self.backups.lock().map_err(poisoned)?;
        Ok(backups
            .iter()
            .rev()
            .filter(|b| b.storage_key == key)
            .cloned()
            .collect())
    }
}

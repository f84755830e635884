use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::commands::manager::StateManager;
use crate::db::{migrate_checked, KeyValueStore};
use crate::error::{JournalError, Result};
use crate::models::{validate_timezone, AppState, SomeAppState};

/// How uploaded documents are written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// Validate the shape and upgrade it to the current version before saving.
    #[default]
    Migrate,
    /// Store the text as-is after checking it is JSON; it is upgraded on the
    /// next load. The in-memory document keeps the previous state until then.
    Verbatim,
}

/// A downloadable copy of the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedDocument {
    pub file_name: String,
    pub contents: String,
}

/// `<portfolio>-<MM-DD-YYYY__HH-MM-SS>.json`, timestamp in the journal's timezone.
pub fn export_file_name(state: &AppState, now_millis: i64) -> String {
    let utc = DateTime::<Utc>::from_timestamp_millis(now_millis).unwrap_or_default();
    let stamp = match validate_timezone(&state.timezone) {
        Ok(tz) => utc.with_timezone(&tz).format("%m/%d/%Y, %H:%M:%S").to_string(),
        Err(_) => {
            log::warn!("Unknown timezone '{}', using UTC for export name", state.timezone);
            utc.format("%m/%d/%Y, %H:%M:%S").to_string()
        }
    };
    sanitize(&format!("{}-{}", state.portfolios.selected_portfolio, stamp)) + ".json"
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ',' | ' ' => '_',
            ':' | '/' => '-',
            other => other,
        })
        .collect()
}

pub fn export_document(state: &AppState, now_millis: i64) -> Result<ExportedDocument> {
    Ok(ExportedDocument {
        file_name: export_file_name(state, now_millis),
        contents: serde_json::to_string_pretty(state)?,
    })
}

/// Reset, download and upload, handed to the front end explicitly.
pub struct AdminCommands<'a, S: KeyValueStore, C: Clock> {
    manager: &'a mut StateManager<S, C>,
}

impl<S: KeyValueStore, C: Clock> StateManager<S, C> {
    pub fn admin(&mut self) -> AdminCommands<'_, S, C> {
        AdminCommands { manager: self }
    }
}

impl<S: KeyValueStore, C: Clock> AdminCommands<'_, S, C> {
    pub fn reset(&mut self) -> Result<&AppState> {
        self.manager.reset()
    }

    pub fn download(&self) -> Result<ExportedDocument> {
        export_document(self.manager.state(), self.manager.now())
    }

    /// Replaces the stored document with uploaded text. The current document
    /// is backed up first.
    pub fn upload(&mut self, raw: &str, mode: ImportMode) -> Result<&AppState> {
        let key = self.manager.key().to_string();
        match mode {
            ImportMode::Migrate => {
                let parsed = SomeAppState::parse(raw)?;
                let from = parsed.version();
                let state = migrate_checked(parsed, self.manager.now())?;
                self.backup_current(&key)?;
                log::info!("Imported document (version {}), migrated to current", from);
                self.manager.save(state)
            }
            ImportMode::Verbatim => {
                let value: serde_json::Value = serde_json::from_str(raw)?;
                if !value.is_object() {
                    return Err(JournalError::ParseError(
                        "Uploaded document must be a JSON object".to_string(),
                    ));
                }
                self.backup_current(&key)?;
                self.manager.store().save_raw(&key, raw)?;
                log::warn!("Stored uploaded document without migration; it is upgraded on next load");
                Ok(self.manager.state())
            }
        }
    }

    fn backup_current(&self, key: &str) -> Result<()> {
        if let Some(current) = self.manager.store().load_raw(key)? {
            self.manager.store().backup_raw(key, "pre_import", &current)?;
        }
        Ok(())
    }
}

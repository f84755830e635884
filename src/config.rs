// Runtime configuration for the command-line front end

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;

use crate::commands::DEFAULT_STORAGE_KEY;
use crate::error::{JournalError, Result};
use crate::models::ListKind;

pub const DEFAULT_DB_FILE: &str = "leverage_journal.db";

#[derive(Parser, Debug)]
#[command(name = "leverage-journal")]
#[command(about = "Leverage and risk calculator for manually tracked trades")]
pub struct CliConfig {
    /// Directory holding the journal database
    #[arg(long, global = true, env = "LEVERAGE_DATA_DIR", default_value = ".leverage-journal")]
    pub data_dir: PathBuf,

    /// Database file name inside the data directory
    #[arg(long, global = true, env = "LEVERAGE_DB_FILE", default_value = DEFAULT_DB_FILE)]
    pub db_file: String,

    /// Key the document is stored under
    #[arg(long, global = true, env = "LEVERAGE_STORAGE_KEY", default_value = DEFAULT_STORAGE_KEY)]
    pub storage_key: String,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, env = "LEVERAGE_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Which trade list a reorder applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListArg {
    Staging,
    Active,
}

impl From<ListArg> for ListKind {
    fn from(list: ListArg) -> Self {
        match list {
            ListArg::Staging => ListKind::Staging,
            ListArg::Active => ListKind::Active,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the whole document
    Show,
    /// Compute stats for unsaved input
    Preview {
        start_equity: String,
        entry_price: String,
        stop_price: String,
        ideal_exit: String,
        size: String,
    },
    /// Stage a new trade
    Add {
        start_equity: String,
        entry_price: String,
        stop_price: String,
        ideal_exit: String,
        size: String,
    },
    /// Move a staged trade into the selected portfolio
    Start { id: String },
    /// Finish an open trade, at the ideal exit unless --stopped
    Finish {
        id: String,
        #[arg(long)]
        stopped: bool,
    },
    /// Send an open trade back to staging
    Back { id: String },
    /// Lock a finished trade
    Lock { id: String },
    /// Edit one numeric field (equity, entry, stop, exit, size)
    Edit { id: String, field: String, value: String },
    /// Set notes on a finished trade
    Notes { id: String, notes: String },
    /// Copy a staged trade
    Duplicate { id: String },
    /// Delete a trade
    Delete { id: String },
    /// Move a trade one place up
    Up {
        #[arg(value_enum)]
        list: ListArg,
        index: usize,
    },
    /// Move a trade one place down
    Down {
        #[arg(value_enum)]
        list: ListArg,
        index: usize,
    },
    /// Remove every staged trade
    ClearStaging,
    /// Manage portfolios
    Portfolio {
        #[command(subcommand)]
        action: PortfolioCommand,
    },
    SetName { name: String },
    SetTimezone { timezone: String },
    SetRemake {
        #[arg(long)]
        avg_loss: f64,
        #[arg(long)]
        avg_gain_per_loss_factor: f64,
        #[arg(long)]
        stop_loss: f64,
        #[arg(long)]
        goal: f64,
        #[arg(long)]
        start: f64,
        #[arg(long)]
        win_rate: f64,
    },
    /// Stats for a stored trade
    Stats { id: String },
    /// Summary of a portfolio (selected one by default)
    Summary { portfolio: Option<String> },
    /// Write the document to a JSON file
    Export {
        /// Output directory
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Replace the document with a JSON file
    Import {
        path: PathBuf,
        /// Store the file as-is and migrate it on the next start
        #[arg(long)]
        verbatim: bool,
    },
    /// Replace the document with the initial one
    Reset,
}

#[derive(Subcommand, Debug)]
pub enum PortfolioCommand {
    List,
    Select { name: String },
    Create { name: String },
    Rename { old_name: String, new_name: String },
    Delete { name: String },
}

/// Resolved paths and settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub storage_key: String,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_cli(cli: &CliConfig) -> Result<Self> {
        if cli.storage_key.trim().is_empty() {
            return Err(JournalError::InvalidInput("Storage key must not be empty".to_string()));
        }
        if cli.db_file.trim().is_empty() {
            return Err(JournalError::InvalidInput("Database file must not be empty".to_string()));
        }
        Ok(Self {
            data_dir: cli.data_dir.clone(),
            db_path: cli.data_dir.join(&cli.db_file),
            storage_key: cli.storage_key.clone(),
            log_level: cli.log_level.clone(),
        })
    }

    /// Creates the data directory if it does not exist yet.
    pub fn ensure_data_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            JournalError::DatabaseError(format!(
                "Failed to create data directory {}: {}",
                self.data_dir.display(),
                e
            ))
        })
    }

    pub fn db_path_str(&self) -> Result<&str> {
        self.db_path.to_str().ok_or_else(|| {
            JournalError::InvalidInput(format!("Non UTF-8 database path: {}", self.db_path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = CliConfig::try_parse_from(["leverage-journal", "show"]).unwrap();
        let config = AppConfig::from_cli(&cli).unwrap();
        assert_eq!(config.storage_key, "leverage-calculator");
        assert_eq!(config.db_path, PathBuf::from(".leverage-journal").join(DEFAULT_DB_FILE));
        assert!(matches!(cli.command, Command::Show));
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = CliConfig::try_parse_from([
            "leverage-journal",
            "finish",
            "TRADE-1",
            "--stopped",
            "--data-dir",
            "/tmp/lj",
            "--db-file",
            "x.db",
        ])
        .unwrap();
        let config = AppConfig::from_cli(&cli).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/lj/x.db"));
        match cli.command {
            Command::Finish { id, stopped } => {
                assert_eq!(id, "TRADE-1");
                assert!(stopped);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_reorder_list_argument() {
        let cli = CliConfig::try_parse_from(["leverage-journal", "up", "active", "2"]).unwrap();
        match cli.command {
            Command::Up { list, index } => {
                assert_eq!(ListKind::from(list), ListKind::Active);
                assert_eq!(index, 2);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_empty_storage_key_rejected() {
        let cli =
            CliConfig::try_parse_from(["leverage-journal", "show", "--storage-key", " "]).unwrap();
        assert!(AppConfig::from_cli(&cli).is_err());
    }

    #[test]
    fn test_ensure_data_dir_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cli = CliConfig::try_parse_from([
            "leverage-journal",
            "show",
            "--data-dir",
            dir.path().join("nested").to_str().unwrap(),
        ])
        .unwrap();
        let config = AppConfig::from_cli(&cli).unwrap();
        config.ensure_data_dir().unwrap();
        assert!(config.data_dir.is_dir());
    }
}

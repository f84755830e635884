pub mod import;
pub mod manager;
pub mod portfolios;
pub mod settings;
pub mod stats;
pub mod trades;

pub use import::{export_document, export_file_name, AdminCommands, ExportedDocument, ImportMode};
pub use manager::{StateManager, DEFAULT_STORAGE_KEY};
pub use stats::preview_stats;

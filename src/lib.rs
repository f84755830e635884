pub mod clock;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod stats;

pub use clock::{Clock, FixedClock, SystemClock};
pub use commands::{AdminCommands, ImportMode, StateManager};
pub use db::{Database, KeyValueStore, MemoryStore};
pub use error::{JournalError, Result};
pub use models::AppState;

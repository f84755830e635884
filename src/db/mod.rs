pub mod connection;
pub mod migration_runner;
pub mod store;

pub use connection::Database;
pub use migration_runner::{migrate, migrate_checked, migrate_value, MigrationRunner};
pub use store::{DocumentBackup, KeyValueStore, MemoryStore};

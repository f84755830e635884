use serde_json::Value;

use crate::db::store::KeyValueStore;
use crate::error::Result;
use crate::models::settings::{RemakeParams, DEFAULT_REMAKE_V2};
use crate::models::state::{
    AppState, AppStateV0, AppStateV1, AppStateV2, AppStateV3, SomeAppState, Version,
    CURRENT_VERSION,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub from: u32,
    pub to: u32,
    pub name: &'static str,
}

impl Migration {
    pub const fn new(from: u32, name: &'static str) -> Self {
        Self { from, to: from + 1, name }
    }
}

/// Every upgrade step, oldest first. Adding a version appends one entry here
/// and one `From` impl below.
pub const MIGRATIONS: [Migration; 3] = [
    Migration::new(0, "add_version_and_encryption"),
    Migration::new(1, "add_remake_params"),
    Migration::new(2, "expand_remake_params"),
];

impl From<AppStateV0> for AppStateV1 {
    fn from(v0: AppStateV0) -> Self {
        AppStateV1 {
            portfolios: v0.portfolios,
            name: v0.name,
            timezone: v0.timezone,
            version: Version,
            encryption: None,
        }
    }
}

impl From<AppStateV1> for AppStateV2 {
    fn from(v1: AppStateV1) -> Self {
        AppStateV2 {
            portfolios: v1.portfolios,
            name: v1.name,
            timezone: v1.timezone,
            version: Version,
            encryption: v1.encryption,
            remake_params: DEFAULT_REMAKE_V2,
        }
    }
}

impl From<AppStateV2> for AppStateV3 {
    fn from(v2: AppStateV2) -> Self {
        AppStateV3 {
            portfolios: v2.portfolios,
            name: v2.name,
            timezone: v2.timezone,
            version: Version,
            encryption: v2.encryption,
            remake_params: RemakeParams::from_legacy(v2.remake_params),
        }
    }
}

impl SomeAppState {
    /// Moves one version forward. The current version is returned as is.
    pub fn upgrade(self) -> SomeAppState {
        match self {
            SomeAppState::V0(state) => SomeAppState::V1(state.into()),
            SomeAppState::V1(state) => SomeAppState::V2(state.into()),
            SomeAppState::V2(state) => SomeAppState::V3(state.into()),
            SomeAppState::V3(state) => SomeAppState::V3(state),
        }
    }
}

/// Upgrades any known shape to the current one.
pub fn migrate(state: SomeAppState) -> AppState {
    let mut current = state;
    loop {
        match current {
            SomeAppState::V3(mut state) => {
                state.portfolios = state.portfolios.normalized();
                return state;
            }
            older => {
                let from = older.version();
                if let Some(step) = MIGRATIONS.iter().find(|m| m.from == from) {
                    log::info!("Applying migration {} -> {}: {}", step.from, step.to, step.name);
                }
                current = older.upgrade();
            }
        }
    }
}

/// Fails with `UnsupportedVersion` for a `version` outside 0..=3.
pub fn migrate_value(value: Value) -> Result<AppState> {
    Ok(migrate(SomeAppState::from_value(value)?))
}

/// `migrate`, then assigns missing trade ids and validates the result so
/// that nothing unloadable is ever written back.
pub fn migrate_checked(state: SomeAppState, now_millis: i64) -> Result<AppState> {
    let mut state = migrate(state);
    state.portfolios = state.portfolios.with_missing_ids(now_millis);
    state.validate()?;
    Ok(state)
}

pub struct MigrationRunner {
    migrations: Vec<Migration>,
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self {
            migrations: MIGRATIONS.to_vec(),
        }
    }

    pub fn pending(&self, from: u32) -> Vec<&Migration> {
        self.migrations.iter().filter(|m| m.from >= from).collect()
    }

    /// Parses a stored document and brings it to the current version.
    ///
    /// A document that is behind is backed up in `store` once it has migrated
    /// cleanly. Returns the migrated state and the number of steps applied;
    /// persisting the result is up to the caller.
    pub fn run<S>(&self, store: &S, key: &str, raw: &str, now_millis: i64) -> Result<(AppState, usize)>
    where
        S: KeyValueStore + ?Sized,
    {
        let parsed = SomeAppState::parse(raw)?;
        let from = parsed.version();
        log::info!("Stored document version: {}", from);

        let pending = self.pending(from);
        let state = migrate_checked(parsed, now_millis)?;

        if !pending.is_empty() {
            log::info!("Found {} pending migrations", pending.len());
            let label = format!("pre_migration_v{}_to_v{}", from, CURRENT_VERSION);
            store.backup_raw(key, &label, raw)?;
        }

        if pending.is_empty() {
            log::info!("Document is up to date");
        } else {
            log::info!("Applied {} migrations successfully", pending.len());
        }
        Ok((state, pending.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::MemoryStore;
    use crate::error::JournalError;
    use crate::models::settings::Encryption;
    use serde_json::json;

    fn v0_doc() -> Value {
        json!({
            "stagingGround": [],
            "active": {"p": []},
            "name": "n",
            "timezone": "tz",
            "selectedPortfolio": "p"
        })
    }

    fn roundtrip(state: &AppState) -> AppState {
        migrate_value(serde_json::to_value(state).unwrap()).unwrap()
    }

    #[test]
    fn test_migrations_are_sequential() {
        for (i, m) in MIGRATIONS.iter().enumerate() {
            assert_eq!(m.from as usize, i, "Migration versions must be sequential");
            assert_eq!(m.to, m.from + 1);
        }
        assert_eq!(MIGRATIONS.last().map(|m| m.to), Some(CURRENT_VERSION));
    }

    #[test]
    fn test_v0_chain_reaches_current() {
        let state = migrate_value(v0_doc()).unwrap();
        assert_eq!(state.name, "n");
        assert_eq!(state.timezone, "tz");
        assert_eq!(state.portfolios.selected_portfolio, "p");
        assert!(state.encryption.is_none());
        assert_eq!(state.remake_params.avg_loss, 10.0);
        assert_eq!(state.remake_params.avg_gain_per_loss_factor, 4.0);
        assert_eq!(state.remake_params.stop_loss, 10.0);
        assert_eq!(state.remake_params.goal, 1_000_000.0);
        assert_eq!(state.remake_params.start, 100.0);
        assert_eq!(state.remake_params.win_rate, 80.0);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["version"], 3);
    }

    #[test]
    fn test_each_step_moves_one_version() {
        let mut state = SomeAppState::from_value(v0_doc()).unwrap();
        for expected in 1..=3 {
            state = state.upgrade();
            assert_eq!(state.version(), expected);
        }
        assert_eq!(state.clone().upgrade(), state);
    }

    #[test]
    fn test_v2_remake_params_are_converted() {
        let mut doc = v0_doc();
        doc["version"] = json!(2);
        doc["remakeParams"] = json!({"avgWin": 30, "avgLoss": 15});
        doc["encryption"] = json!({"pubkey": "pk", "bybit": "secret"});

        let state = migrate_value(doc).unwrap();
        assert_eq!(state.remake_params.avg_loss, 15.0);
        assert_eq!(state.remake_params.avg_gain_per_loss_factor, 2.0);
        assert_eq!(state.remake_params.goal, 1_000_000.0);
        assert_eq!(
            state.encryption,
            Some(Encryption { pubkey: "pk".into(), bybit: "secret".into() })
        );
    }

    #[test]
    fn test_v3_passes_through_unchanged() {
        let initial = AppState::initial();
        assert_eq!(roundtrip(&initial), initial);
    }

    #[test]
    fn test_migration_is_idempotent() {
        let mut doc = v0_doc();
        doc["stagingGround"] = json!([{
            "id": "t1",
            "Start Equity": 100, "Entry Price": 10, "Stop Price": 9,
            "Ideal Exit": 12, "Size": 20, "locked": false
        }]);
        let once = migrate_value(doc).unwrap();
        let twice = roundtrip(&once);
        assert_eq!(once, twice);
    }

    fn v1_doc() -> Value {
        let mut doc = v0_doc();
        doc["version"] = json!(1);
        doc["encryption"] = json!({"pubkey": "pk1", "bybit": "cipher1"});
        doc["active"] = json!({"p": [{
            "id": "a1",
            "Start Equity": 200, "Entry Price": 50, "Stop Price": 55,
            "Ideal Exit": 40, "Size": 4, "locked": false, "started": 3
        }]});
        doc
    }

    #[test]
    fn test_v1_migration_is_idempotent() {
        let once = migrate_value(v1_doc()).unwrap();
        assert_eq!(
            once.encryption,
            Some(Encryption { pubkey: "pk1".into(), bybit: "cipher1".into() })
        );
        assert_eq!(once.remake_params, RemakeParams::default());
        assert_eq!(roundtrip(&once), once);
    }

    #[test]
    fn test_v2_migration_is_idempotent() {
        let mut doc = v1_doc();
        doc["version"] = json!(2);
        doc["remakeParams"] = json!({"avgWin": 25, "avgLoss": 5});

        let once = migrate_value(doc).unwrap();
        assert_eq!(once.remake_params.avg_loss, 5.0);
        assert_eq!(once.remake_params.avg_gain_per_loss_factor, 5.0);
        assert_eq!(once.encryption.as_ref().map(|e| e.pubkey.as_str()), Some("pk1"));
        assert_eq!(roundtrip(&once), once);
    }

    #[test]
    fn test_zero_avg_loss_migrates_to_loadable_document() {
        let mut doc = v0_doc();
        doc["version"] = json!(2);
        doc["remakeParams"] = json!({"avgWin": 40, "avgLoss": 0});

        let state = migrate_value(doc).unwrap();
        assert!(state.remake_params.validate().is_ok());
        let raw = serde_json::to_string(&state).unwrap();
        let reparsed: AppState = serde_json::from_str(&raw).unwrap();
        assert_eq!(reparsed, state);
    }

    #[test]
    fn test_runner_rejects_invalid_documents_before_backup() {
        let store = MemoryStore::new();
        let runner = MigrationRunner::new();

        let mut bad_params = serde_json::to_value(AppState::initial()).unwrap();
        bad_params["remakeParams"]["winRate"] = json!(0);
        assert!(matches!(
            runner.run(&store, "k", &bad_params.to_string(), 7),
            Err(JournalError::InvalidInput(_))
        ));

        let mut duplicated = v0_doc();
        duplicated["stagingGround"] = json!([
            {"id": "x", "Start Equity": 1, "Entry Price": 1, "Stop Price": 1, "Ideal Exit": 1, "Size": 1, "locked": false},
            {"id": "x", "Start Equity": 1, "Entry Price": 1, "Stop Price": 1, "Ideal Exit": 1, "Size": 1, "locked": false}
        ]);
        assert!(runner.run(&store, "k", &duplicated.to_string(), 7).is_err());
        assert!(store.list_backups("k").unwrap().is_empty());
    }

    #[test]
    fn test_runner_assigns_ids_from_clock() {
        let store = MemoryStore::new();
        let mut doc = v0_doc();
        doc["stagingGround"] = json!([
            {"Start Equity": 1, "Entry Price": 1, "Stop Price": 1, "Ideal Exit": 1, "Size": 1, "locked": false},
            {"Start Equity": 1, "Entry Price": 1, "Stop Price": 1, "Ideal Exit": 1, "Size": 1, "locked": false}
        ]);
        let (state, _) = MigrationRunner::new().run(&store, "k", &doc.to_string(), 7).unwrap();
        let ids: Vec<&str> = state.portfolios.staging_ground.iter().map(|t| t.id.as_str()).collect();
        assert!(ids.iter().all(|id| id.starts_with("TRADE-7-")));
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_unsupported_version_is_fatal() {
        let mut doc = v0_doc();
        doc["version"] = json!(4);
        assert!(matches!(migrate_value(doc), Err(JournalError::UnsupportedVersion(_))));
    }

    #[test]
    fn test_runner_backs_up_old_documents() {
        let store = MemoryStore::new();
        let runner = MigrationRunner::new();
        let raw = v0_doc().to_string();

        let (state, applied) = runner.run(&store, "k", &raw, 7).unwrap();
        assert_eq!(applied, 3);
        assert_eq!(state.remake_params.avg_gain_per_loss_factor, 4.0);

        let backups = store.list_backups("k").unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].label, "pre_migration_v0_to_v3");
        assert_eq!(backups[0].body, raw);
    }

    #[test]
    fn test_runner_skips_current_documents() {
        let store = MemoryStore::new();
        let runner = MigrationRunner::new();
        let raw = serde_json::to_string(&AppState::initial()).unwrap();

        let (_, applied) = runner.run(&store, "k", &raw, 7).unwrap();
        assert_eq!(applied, 0);
        assert!(store.list_backups("k").unwrap().is_empty());
    }

    #[test]
    fn test_runner_pending_counts() {
        let runner = MigrationRunner::new();
        assert_eq!(runner.pending(0).len(), 3);
        assert_eq!(runner.pending(2).len(), 1);
        assert!(runner.pending(3).is_empty());
    }
}

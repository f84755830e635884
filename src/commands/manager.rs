use crate::clock::{Clock, SystemClock};
use crate::db::{KeyValueStore, MigrationRunner};
use crate::error::Result;
use crate::models::{AppState, Portfolios};

/// Storage key the document has always lived under.
pub const DEFAULT_STORAGE_KEY: &str = "leverage-calculator";

/// Owns the in-memory document and keeps the store in step with it.
///
/// Every mutation derives a complete new `AppState`, persists it, and only
/// then swaps it in. A failed operation leaves both copies untouched.
pub struct StateManager<S: KeyValueStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    key: String,
    state: AppState,
}

impl<S: KeyValueStore> StateManager<S, SystemClock> {
    pub fn open(store: S) -> Result<Self> {
        Self::load(store, SystemClock, DEFAULT_STORAGE_KEY)
    }
}

impl<S: KeyValueStore, C: Clock> StateManager<S, C> {
    /// Reads the stored document, seeding it when absent and migrating it
    /// when older than the current version. The result is written back either
    /// way, so the stored shape never lags behind.
    pub fn load(store: S, clock: C, key: &str) -> Result<Self> {
        let state = match store.load_raw(key)? {
            None => {
                log::info!("No stored document under '{}', writing initial state", key);
                AppState::initial()
            }
            Some(raw) => {
                let (state, _) = MigrationRunner::new().run(&store, key, &raw, clock.now_millis())?;
                state
            }
        };
        store.save_raw(key, &serde_json::to_string(&state)?)?;

        Ok(Self {
            store,
            clock,
            key: key.to_string(),
            state,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Persists `state` verbatim and makes it current.
    pub fn save(&mut self, state: AppState) -> Result<&AppState> {
        let raw = serde_json::to_string(&state)?;
        self.store.save_raw(&self.key, &raw)?;
        self.state = state;
        Ok(&self.state)
    }

    pub fn reset(&mut self) -> Result<&AppState> {
        log::warn!("Resetting document '{}' to initial state", self.key);
        self.save(AppState::initial())
    }

    /// Read-modify-write over the whole document.
    pub fn commit<F>(&mut self, update: F) -> Result<&AppState>
    where
        F: FnOnce(&AppState) -> Result<AppState>,
    {
        let next = update(&self.state)?;
        self.save(next)
    }

    pub(crate) fn commit_portfolios<F>(&mut self, update: F) -> Result<&AppState>
    where
        F: FnOnce(&Portfolios) -> Result<Portfolios>,
    {
        self.commit(|state| {
            Ok(AppState {
                portfolios: update(&state.portfolios)?,
                ..state.clone()
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::MemoryStore;
    use crate::error::JournalError;
    use serde_json::json;

    const KEY: &str = DEFAULT_STORAGE_KEY;

    #[test]
    fn test_first_load_seeds_and_persists() {
        let manager = StateManager::load(MemoryStore::new(), FixedClock(1), KEY).unwrap();
        assert_eq!(manager.state(), &AppState::initial());

        let stored = manager.store().load_raw(KEY).unwrap().unwrap();
        let stored: AppState = serde_json::from_str(&stored).unwrap();
        assert_eq!(stored, AppState::initial());
    }

    #[test]
    fn test_load_migrates_and_rewrites() {
        let v0 = json!({
            "stagingGround": [],
            "active": {"p": []},
            "name": "n",
            "timezone": "UTC",
            "selectedPortfolio": "p"
        });
        let store = MemoryStore::with_document(KEY, &v0.to_string());
        let manager = StateManager::load(store, FixedClock(1), KEY).unwrap();
        assert_eq!(manager.state().remake_params.avg_gain_per_loss_factor, 4.0);

        let stored: serde_json::Value =
            serde_json::from_str(&manager.store().load_raw(KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored["version"], 3);

        // A second load finds nothing left to migrate.
        let store = manager.into_store();
        let again = StateManager::load(store, FixedClock(1), KEY).unwrap();
        assert_eq!(again.store().list_backups(KEY).unwrap().len(), 1);
    }

    #[test]
    fn test_zero_avg_loss_document_loads_twice() {
        let v2 = json!({
            "stagingGround": [],
            "active": {"p": []},
            "name": "n",
            "timezone": "UTC",
            "selectedPortfolio": "p",
            "version": 2,
            "remakeParams": {"avgWin": 40, "avgLoss": 0}
        });
        let store = MemoryStore::with_document(KEY, &v2.to_string());
        let first = StateManager::load(store, FixedClock(1), KEY).unwrap();
        assert!(first.state().remake_params.validate().is_ok());
        let first_state = first.state().clone();

        let second = StateManager::load(first.into_store(), FixedClock(2), KEY).unwrap();
        assert_eq!(second.state(), &first_state);
    }

    #[test]
    fn test_invalid_stored_document_fails_load() {
        let mut doc = serde_json::to_value(AppState::initial()).unwrap();
        doc["remakeParams"]["goal"] = json!(-1);
        let store = MemoryStore::with_document(KEY, &doc.to_string());

        let result = StateManager::load(store, FixedClock(1), KEY);
        assert!(matches!(result, Err(JournalError::InvalidInput(_))));
    }

    #[test]
    fn test_unsupported_document_fails_load() {
        let store = MemoryStore::with_document(KEY, r#"{"version": 9}"#);
        let result = StateManager::load(store, FixedClock(1), KEY);
        assert!(matches!(result, Err(JournalError::UnsupportedVersion(_))));
    }

    #[test]
    fn test_failed_commit_changes_nothing() {
        let mut manager = StateManager::load(MemoryStore::new(), FixedClock(1), KEY).unwrap();
        let before_raw = manager.store().load_raw(KEY).unwrap();
        let before = manager.state().clone();

        let result = manager.commit(|_| Err(JournalError::InvalidInput("nope".into())));
        assert!(result.is_err());
        assert_eq!(manager.state(), &before);
        assert_eq!(manager.store().load_raw(KEY).unwrap(), before_raw);
    }

    #[test]
    fn test_reset_restores_seed() {
        let mut manager = StateManager::load(MemoryStore::new(), FixedClock(1), KEY).unwrap();
        manager
            .commit(|s| Ok(AppState { name: "Changed".into(), ..s.clone() }))
            .unwrap();
        assert_eq!(manager.state().name, "Changed");

        manager.reset().unwrap();
        assert_eq!(manager.state(), &AppState::initial());
    }
}

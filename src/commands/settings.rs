use crate::clock::Clock;
use crate::commands::manager::StateManager;
use crate::db::KeyValueStore;
use crate::error::{JournalError, Result};
use crate::models::{validate_timezone, AppState, RemakeParams};

impl<S: KeyValueStore, C: Clock> StateManager<S, C> {
    /// Display name of the journal owner. Must not be blank.
    pub fn set_name(&mut self, name: &str) -> Result<&AppState> {
        let name = name.trim();
        if name.is_empty() {
            return Err(JournalError::InvalidInput("Name cannot be empty".to_string()));
        }
        self.commit(|state| {
            Ok(AppState {
                name: name.to_string(),
                ..state.clone()
            })
        })
    }

    pub fn set_timezone(&mut self, timezone: &str) -> Result<&AppState> {
        let tz = validate_timezone(timezone)?;
        self.commit(|state| {
            Ok(AppState {
                timezone: tz.name().to_string(),
                ..state.clone()
            })
        })
    }

    pub fn set_remake_params(&mut self, params: RemakeParams) -> Result<&AppState> {
        params.validate()?;
        self.commit(|state| {
            Ok(AppState {
                remake_params: params,
                ..state.clone()
            })
        })
    }
}

use crate::clock::Clock;
use crate::commands::manager::StateManager;
use crate::db::KeyValueStore;
use crate::error::Result;
use crate::models::AppState;

impl<S: KeyValueStore, C: Clock> StateManager<S, C> {
    pub fn select_portfolio(&mut self, name: &str) -> Result<&AppState> {
        self.commit_portfolios(|p| p.select(name))
    }

    /// Adds an empty portfolio and makes it the selected one.
    pub fn create_portfolio(&mut self, name: &str) -> Result<&AppState> {
        log::info!("Creating portfolio '{}'", name.trim());
        self.commit_portfolios(|p| p.create(name))
    }

    pub fn rename_portfolio(&mut self, old_name: &str, new_name: &str) -> Result<&AppState> {
        log::info!("Renaming portfolio '{}' to '{}'", old_name, new_name.trim());
        self.commit_portfolios(|p| p.rename(old_name, new_name))
    }

    pub fn delete_portfolio(&mut self, name: &str) -> Result<&AppState> {
        log::info!("Deleting portfolio '{}'", name);
        self.commit_portfolios(|p| p.delete(name))
    }
}

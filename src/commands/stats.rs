use crate::clock::Clock;
use crate::commands::manager::StateManager;
use crate::db::KeyValueStore;
use crate::error::{JournalError, Result};
use crate::models::TradeInputs;
use crate::stats::{compute_stats, summarize, PortfolioSummary, Stats};

/// Stats for form input that has not been saved yet.
pub fn preview_stats(inputs: &TradeInputs) -> Result<Stats> {
    Ok(compute_stats(&inputs.parse()?))
}

impl<S: KeyValueStore, C: Clock> StateManager<S, C> {
    pub fn trade_stats(&self, id: &str) -> Result<Stats> {
        self.state()
            .portfolios
            .find(id)
            .map(|trade| trade.stats())
            .ok_or_else(|| JournalError::TradeNotFound(id.to_string()))
    }

    /// Summary of `portfolio`, or of the selected portfolio when `None`.
    pub fn portfolio_summary(&self, portfolio: Option<&str>) -> Result<PortfolioSummary> {
        let portfolios = &self.state().portfolios;
        let name = portfolio.unwrap_or(&portfolios.selected_portfolio);
        let active = portfolios
            .active
            .get(name)
            .ok_or_else(|| JournalError::PortfolioNotFound(name.to_string()))?;
        Ok(summarize(name, &portfolios.staging_ground, active))
    }
}

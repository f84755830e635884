use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{JournalError, Result};
use crate::models::settings::DEFAULT_PORTFOLIO;
use crate::models::trade::{new_trade_id, Trade, TradeFields, TradeState, UpdateableField};

/// Where a trade currently sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeLocation {
    Staging(usize),
    Active { portfolio: String, index: usize },
}

/// Which list a reorder applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Staging,
    Active,
}

/// Named portfolios of started trades plus the shared staging list.
///
/// Every operation returns a new value; `self` is never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolios {
    pub staging_ground: Vec<Trade>,
    pub active: BTreeMap<String, Vec<Trade>>,
    pub selected_portfolio: String,
}

impl Default for Portfolios {
    fn default() -> Self {
        let mut active = BTreeMap::new();
        active.insert(DEFAULT_PORTFOLIO.to_string(), Vec::new());
        Self {
            staging_ground: Vec::new(),
            active,
            selected_portfolio: DEFAULT_PORTFOLIO.to_string(),
        }
    }
}

/// Swaps two adjacent entries. Returns `false` (list untouched) when the
/// indices are out of range, equal, or not neighbours.
pub fn reorder<T>(list: &mut [T], i: usize, j: usize) -> bool {
    if list.len() < 2 || i >= list.len() || j >= list.len() || i.abs_diff(j) != 1 {
        return false;
    }
    list.swap(i, j);
    true
}

impl Portfolios {
    /// Restores the container invariants on documents that violate them:
    /// at least one portfolio exists, the selection points at one of them,
    /// staged trades carry no lifecycle data and active trades are started.
    pub fn normalized(mut self) -> Self {
        for trade in &mut self.staging_ground {
            if trade.state() != TradeState::Staging {
                log::warn!("Staged trade '{}' carries lifecycle data, clearing it", trade.id);
                trade.started = None;
                trade.finished = None;
                trade.locked = false;
            }
        }

        let mut unstarted = Vec::new();
        for (portfolio, trades) in self.active.iter_mut() {
            let mut kept = Vec::with_capacity(trades.len());
            for mut trade in trades.drain(..) {
                if trade.locked && trade.finished.is_none() {
                    log::warn!("Trade '{}' is locked but not finished, unlocking it", trade.id);
                    trade.locked = false;
                }
                if trade.started.is_some() {
                    kept.push(trade);
                    continue;
                }
                match trade.finished.as_ref().map(|f| f.at) {
                    Some(at) => {
                        log::warn!("Finished trade '{}' has no start time, using its finish time", trade.id);
                        trade.started = Some(at);
                        kept.push(trade);
                    }
                    None => {
                        log::warn!("Trade '{}' in '{}' was never started, moving it to staging", trade.id, portfolio);
                        unstarted.push(trade);
                    }
                }
            }
            *trades = kept;
        }
        self.staging_ground.extend(unstarted);

        if self.active.is_empty() {
            log::warn!("Document has no portfolios, adding '{}'", DEFAULT_PORTFOLIO);
            self.active.insert(DEFAULT_PORTFOLIO.to_string(), Vec::new());
        }
        if !self.active.contains_key(&self.selected_portfolio) {
            if let Some(first) = self.active.keys().next() {
                log::warn!(
                    "Selected portfolio '{}' does not exist, selecting '{}'",
                    self.selected_portfolio,
                    first
                );
                self.selected_portfolio = first.clone();
            }
        }
        self
    }

    pub fn selected_trades(&self) -> &[Trade] {
        self.active
            .get(&self.selected_portfolio)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }

    pub fn select(&self, name: &str) -> Result<Portfolios> {
        if !self.active.contains_key(name) {
            return Err(JournalError::PortfolioNotFound(name.to_string()));
        }
        Ok(Portfolios {
            selected_portfolio: name.to_string(),
            ..self.clone()
        })
    }

    /// Adds an empty portfolio and selects it.
    pub fn create(&self, name: &str) -> Result<Portfolios> {
        let name = non_empty_name(name)?;
        if self.active.contains_key(name) {
            return Err(JournalError::PortfolioExists(name.to_string()));
        }
        let mut next = self.clone();
        next.active.insert(name.to_string(), Vec::new());
        next.selected_portfolio = name.to_string();
        Ok(next)
    }

    /// Renaming onto another existing portfolio is refused rather than merged.
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<Portfolios> {
        let new_name = non_empty_name(new_name)?;
        if !self.active.contains_key(old_name) {
            return Err(JournalError::PortfolioNotFound(old_name.to_string()));
        }
        if old_name == new_name {
            return Ok(self.clone());
        }
        if self.active.contains_key(new_name) {
            return Err(JournalError::PortfolioExists(new_name.to_string()));
        }
        let mut next = self.clone();
        if let Some(trades) = next.active.remove(old_name) {
            next.active.insert(new_name.to_string(), trades);
        }
        if next.selected_portfolio == old_name {
            next.selected_portfolio = new_name.to_string();
        }
        Ok(next)
    }

    pub fn delete(&self, name: &str) -> Result<Portfolios> {
        let Some(trades) = self.active.get(name) else {
            return Err(JournalError::PortfolioNotFound(name.to_string()));
        };
        if self.active.len() == 1 {
            return Err(JournalError::InvalidInput(
                "Cannot delete the last portfolio".to_string(),
            ));
        }
        if let Some(locked) = trades.iter().find(|t| t.locked) {
            return Err(JournalError::TradeLocked(locked.id.clone()));
        }
        let mut next = self.clone();
        next.active.remove(name);
        if next.selected_portfolio == name {
            if let Some(first) = next.active.keys().next() {
                next.selected_portfolio = first.clone();
            }
        }
        Ok(next)
    }

    pub fn locate(&self, id: &str) -> Option<TradeLocation> {
        if let Some(index) = self.staging_ground.iter().position(|t| t.id == id) {
            return Some(TradeLocation::Staging(index));
        }
        self.active.iter().find_map(|(portfolio, trades)| {
            trades.iter().position(|t| t.id == id).map(|index| TradeLocation::Active {
                portfolio: portfolio.clone(),
                index,
            })
        })
    }

    pub fn find(&self, id: &str) -> Option<&Trade> {
        match self.locate(id)? {
            TradeLocation::Staging(index) => self.staging_ground.get(index),
            TradeLocation::Active { portfolio, index } => {
                self.active.get(&portfolio).and_then(|trades| trades.get(index))
            }
        }
    }

    pub fn all_trades(&self) -> impl Iterator<Item = &Trade> {
        self.staging_ground
            .iter()
            .chain(self.active.values().flat_map(|trades| trades.iter()))
    }

    /// Gives every trade written before ids existed a fresh one.
    pub fn with_missing_ids(mut self, now_millis: i64) -> Self {
        let trades = self
            .staging_ground
            .iter_mut()
            .chain(self.active.values_mut().flatten());
        for trade in trades {
            if trade.id.is_empty() {
                trade.id = new_trade_id(now_millis);
            }
        }
        self
    }

    /// Every lookup acts on the first match, so ids must be unique.
    pub fn ensure_unique_ids(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for trade in self.all_trades() {
            if !seen.insert(trade.id.as_str()) {
                return Err(JournalError::InvalidInput(format!("Duplicate trade id: {}", trade.id)));
            }
        }
        Ok(())
    }

    /// Appends a new staging trade.
    pub fn add_trade(&self, id: String, fields: TradeFields) -> Result<Portfolios> {
        let trade = Trade::create(id, fields)?;
        let mut next = self.clone();
        next.staging_ground.push(trade);
        Ok(next)
    }

    /// Moves a staged trade to the front of the selected portfolio.
    pub fn start_trade(&self, id: &str, at: i64) -> Result<Portfolios> {
        let index = self.staging_index(id)?;
        let started = self.staging_ground[index].start(at)?;
        let mut next = self.clone();
        next.staging_ground.remove(index);
        next.active
            .entry(next.selected_portfolio.clone())
            .or_default()
            .insert(0, started);
        Ok(next)
    }

    pub fn finish_trade(&self, id: &str, at: i64, stopped: bool) -> Result<Portfolios> {
        self.replace_trade(id, |trade| trade.finish(at, stopped))
    }

    pub fn lock_trade(&self, id: &str) -> Result<Portfolios> {
        self.replace_trade(id, Trade::lock)
    }

    pub fn update_trade_field(&self, id: &str, field: UpdateableField, value: f64) -> Result<Portfolios> {
        self.replace_trade(id, |trade| trade.update_field(field, value))
    }

    pub fn set_trade_notes(&self, id: &str, notes: &str) -> Result<Portfolios> {
        self.replace_trade(id, |trade| trade.with_notes(notes))
    }

    /// Takes an open trade out of its portfolio and appends it to staging.
    pub fn back_to_staging(&self, id: &str) -> Result<Portfolios> {
        let (portfolio, index) = match self.locate(id) {
            Some(TradeLocation::Active { portfolio, index }) => (portfolio, index),
            Some(TradeLocation::Staging(index)) => {
                let staged = self.staging_ground[index].back_to_staging()?;
                let mut next = self.clone();
                next.staging_ground[index] = staged;
                return Ok(next);
            }
            None => return Err(JournalError::TradeNotFound(id.to_string())),
        };
        let mut next = self.clone();
        let Some(trades) = next.active.get_mut(&portfolio) else {
            return Err(JournalError::PortfolioNotFound(portfolio));
        };
        let staged = trades[index].back_to_staging()?;
        trades.remove(index);
        next.staging_ground.push(staged);
        Ok(next)
    }

    /// Inserts a copy of a staged trade right after the original.
    pub fn duplicate_trade(&self, id: &str, new_id: String) -> Result<Portfolios> {
        let index = self.staging_index(id)?;
        let copy = self.staging_ground[index].duplicate(new_id)?;
        let mut next = self.clone();
        next.staging_ground.insert(index + 1, copy);
        Ok(next)
    }

    pub fn delete_trade(&self, id: &str) -> Result<Portfolios> {
        let mut next = self.clone();
        match self.locate(id) {
            Some(TradeLocation::Staging(index)) => {
                next.staging_ground.remove(index);
            }
            Some(TradeLocation::Active { portfolio, index }) => {
                if let Some(trades) = next.active.get_mut(&portfolio) {
                    if trades[index].state() == TradeState::Locked {
                        return Err(JournalError::TradeLocked(id.to_string()));
                    }
                    trades.remove(index);
                }
            }
            None => return Err(JournalError::TradeNotFound(id.to_string())),
        }
        Ok(next)
    }

    pub fn clear_staging(&self) -> Portfolios {
        Portfolios {
            staging_ground: Vec::new(),
            ..self.clone()
        }
    }

    /// Swaps entries `i` and `j` of the staging list or the selected portfolio.
    pub fn reorder(&self, list: ListKind, i: usize, j: usize) -> Portfolios {
        let mut next = self.clone();
        let changed = match list {
            ListKind::Staging => reorder(&mut next.staging_ground, i, j),
            ListKind::Active => match next.active.get_mut(&next.selected_portfolio) {
                Some(trades) => reorder(trades, i, j),
                None => false,
            },
        };
        if !changed {
            log::debug!("Ignoring reorder {} <-> {} on {:?}", i, j, list);
        }
        next
    }

    fn staging_index(&self, id: &str) -> Result<usize> {
        match self.locate(id) {
            Some(TradeLocation::Staging(index)) => Ok(index),
            Some(TradeLocation::Active { portfolio, index }) => {
                // Present, but already started.
                let trade = &self.active[&portfolio][index];
                Err(JournalError::InvalidTransition {
                    action: "use as staged",
                    state: trade.state().label(),
                })
            }
            None => Err(JournalError::TradeNotFound(id.to_string())),
        }
    }

    fn replace_trade<F>(&self, id: &str, update: F) -> Result<Portfolios>
    where
        F: FnOnce(&Trade) -> Result<Trade>,
    {
        let mut next = self.clone();
        let slot = match self.locate(id) {
            Some(TradeLocation::Staging(index)) => next.staging_ground.get_mut(index),
            Some(TradeLocation::Active { portfolio, index }) => {
                next.active.get_mut(&portfolio).and_then(|trades| trades.get_mut(index))
            }
            None => None,
        };
        let Some(slot) = slot else {
            return Err(JournalError::TradeNotFound(id.to_string()));
        };
        *slot = update(slot)?;
        Ok(next)
    }
}

fn non_empty_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(JournalError::InvalidInput("Portfolio name cannot be empty".to_string()))
    } else {
        Ok(trimmed)
    }
}

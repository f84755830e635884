use crate::clock::Clock;
use crate::commands::manager::StateManager;
use crate::db::KeyValueStore;
use crate::error::Result;
use crate::models::{
    new_trade_id, parse_numeric, AppState, ListKind, TradeFields, TradeInputs, UpdateableField,
};

impl<S: KeyValueStore, C: Clock> StateManager<S, C> {
    /// Parses form input and appends the trade to staging. Returns its id.
    pub fn add_trade(&mut self, inputs: &TradeInputs) -> Result<String> {
        let fields = inputs.parse()?;
        self.add_trade_fields(fields)
    }

    pub fn add_trade_fields(&mut self, fields: TradeFields) -> Result<String> {
        let id = new_trade_id(self.now());
        self.commit_portfolios(|p| p.add_trade(id.clone(), fields))?;
        log::info!("Staged trade {}", id);
        Ok(id)
    }

    pub fn start_trade(&mut self, id: &str) -> Result<&AppState> {
        let now = self.now();
        self.commit_portfolios(|p| p.start_trade(id, now))
    }

    pub fn finish_trade(&mut self, id: &str, stopped: bool) -> Result<&AppState> {
        let now = self.now();
        self.commit_portfolios(|p| p.finish_trade(id, now, stopped))
    }

    pub fn back_to_staging(&mut self, id: &str) -> Result<&AppState> {
        self.commit_portfolios(|p| p.back_to_staging(id))
    }

    pub fn lock_trade(&mut self, id: &str) -> Result<&AppState> {
        self.commit_portfolios(|p| p.lock_trade(id))
    }

    pub fn update_trade_field(&mut self, id: &str, field: UpdateableField, value: f64) -> Result<&AppState> {
        self.commit_portfolios(|p| p.update_trade_field(id, field, value))
    }

    /// Same as `update_trade_field`, taking the raw text of the edit box.
    pub fn edit_trade_field(&mut self, id: &str, field: UpdateableField, value: &str) -> Result<&AppState> {
        let value = parse_numeric(field, value)?;
        self.update_trade_field(id, field, value)
    }

    pub fn set_trade_notes(&mut self, id: &str, notes: &str) -> Result<&AppState> {
        self.commit_portfolios(|p| p.set_trade_notes(id, notes))
    }

    /// Returns the id of the copy.
    pub fn duplicate_trade(&mut self, id: &str) -> Result<String> {
        let new_id = new_trade_id(self.now());
        self.commit_portfolios(|p| p.duplicate_trade(id, new_id.clone()))?;
        Ok(new_id)
    }

    pub fn delete_trade(&mut self, id: &str) -> Result<&AppState> {
        self.commit_portfolios(|p| p.delete_trade(id))
    }

    pub fn clear_staging(&mut self) -> Result<&AppState> {
        self.commit_portfolios(|p| Ok(p.clear_staging()))
    }

    pub fn move_up(&mut self, list: ListKind, index: usize) -> Result<&AppState> {
        match index.checked_sub(1) {
            Some(above) => self.commit_portfolios(|p| Ok(p.reorder(list, index, above))),
            None => Ok(self.state()),
        }
    }

    pub fn move_down(&mut self, list: ListKind, index: usize) -> Result<&AppState> {
        self.commit_portfolios(|p| Ok(p.reorder(list, index, index.saturating_add(1))))
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::FixedClock;
    use crate::commands::manager::{StateManager, DEFAULT_STORAGE_KEY};
    use crate::db::{KeyValueStore, MemoryStore};
    use crate::error::JournalError;
    use crate::models::{AppState, ListKind, TradeInputs, TradeState, UpdateableField};

    fn manager() -> StateManager<MemoryStore, FixedClock> {
        StateManager::load(MemoryStore::new(), FixedClock(1_700_000_000_000), DEFAULT_STORAGE_KEY)
            .unwrap()
    }

    fn inputs() -> TradeInputs {
        TradeInputs {
            start_equity: "100".into(),
            entry_price: "10".into(),
            stop_price: "9".into(),
            ideal_exit_price: "12".into(),
            size: "20".into(),
        }
    }

    fn stored(m: &StateManager<MemoryStore, FixedClock>) -> AppState {
        let raw = m.store().load_raw(DEFAULT_STORAGE_KEY).unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn test_add_requires_complete_input() {
        let mut m = manager();
        let partial = TradeInputs { size: String::new(), ..inputs() };
        assert!(matches!(m.add_trade(&partial), Err(JournalError::InvalidInput(_))));
        assert!(m.state().portfolios.staging_ground.is_empty());

        let id = m.add_trade(&inputs()).unwrap();
        assert_eq!(m.state().portfolios.staging_ground[0].id, id);
        assert!(id.starts_with("TRADE-1700000000000-"));
        assert_eq!(stored(&m), *m.state());
    }

    #[test]
    fn test_start_moves_to_front_of_selected_portfolio() {
        let mut m = manager();
        let first = m.add_trade(&inputs()).unwrap();
        let second = m.add_trade(&inputs()).unwrap();
        m.start_trade(&first).unwrap();
        m.start_trade(&second).unwrap();

        let state = m.state();
        assert!(state.portfolios.staging_ground.is_empty());
        let active = state.portfolios.selected_trades();
        assert_eq!(active[0].id, second);
        assert_eq!(active[1].id, first);
        assert_eq!(active[0].started, Some(1_700_000_000_000));
        assert_eq!(stored(&m), *m.state());
    }

    #[test]
    fn test_finish_twice_leaves_state_unchanged() {
        let mut m = manager();
        let id = m.add_trade(&inputs()).unwrap();
        m.start_trade(&id).unwrap();
        m.finish_trade(&id, false).unwrap();
        let before = m.state().clone();

        let err = m.finish_trade(&id, true).unwrap_err();
        assert!(matches!(err, JournalError::InvalidTransition { .. }));
        assert_eq!(m.state(), &before);
        assert_eq!(stored(&m), before);
    }

    #[test]
    fn test_lock_blocks_edits() {
        let mut m = manager();
        let id = m.add_trade(&inputs()).unwrap();
        m.start_trade(&id).unwrap();
        assert!(m.lock_trade(&id).is_err());
        m.finish_trade(&id, true).unwrap();
        m.set_trade_notes(&id, "stopped on news").unwrap();
        m.lock_trade(&id).unwrap();

        let trade = m.state().portfolios.find(&id).unwrap();
        assert_eq!(trade.state(), TradeState::Locked);
        assert!(matches!(
            m.update_trade_field(&id, UpdateableField::Size, 1.0),
            Err(JournalError::TradeLocked(_))
        ));
        assert!(m.delete_trade(&id).is_err());
    }

    #[test]
    fn test_edit_field_from_text() {
        let mut m = manager();
        let id = m.add_trade(&inputs()).unwrap();
        m.edit_trade_field(&id, UpdateableField::EntryPrice, "10.5").unwrap();
        assert_eq!(m.state().portfolios.find(&id).unwrap().entry_price, 10.5);
        assert!(m.edit_trade_field(&id, UpdateableField::EntryPrice, "").is_err());
    }

    #[test]
    fn test_back_to_staging_round_trip() {
        let mut m = manager();
        let id = m.add_trade(&inputs()).unwrap();
        m.start_trade(&id).unwrap();
        m.back_to_staging(&id).unwrap();
        let trade = &m.state().portfolios.staging_ground[0];
        assert_eq!(trade.id, id);
        assert!(trade.started.is_none());
    }

    #[test]
    fn test_duplicate_and_reorder() {
        let mut m = manager();
        let a = m.add_trade(&inputs()).unwrap();
        let b = m.add_trade(&inputs()).unwrap();
        let copy = m.duplicate_trade(&a).unwrap();
        let ids = |m: &StateManager<MemoryStore, FixedClock>| -> Vec<String> {
            m.state().portfolios.staging_ground.iter().map(|t| t.id.clone()).collect()
        };
        assert_eq!(ids(&m), vec![a.clone(), copy.clone(), b.clone()]);

        m.move_down(ListKind::Staging, 0).unwrap();
        assert_eq!(ids(&m), vec![copy.clone(), a.clone(), b.clone()]);
        m.move_up(ListKind::Staging, 2).unwrap();
        assert_eq!(ids(&m), vec![copy.clone(), b.clone(), a.clone()]);

        m.move_up(ListKind::Staging, 0).unwrap();
        m.move_down(ListKind::Staging, 2).unwrap();
        assert_eq!(ids(&m), vec![copy, b, a]);
    }

    #[test]
    fn test_delete_and_clear() {
        let mut m = manager();
        let a = m.add_trade(&inputs()).unwrap();
        m.add_trade(&inputs()).unwrap();
        m.delete_trade(&a).unwrap();
        assert_eq!(m.state().portfolios.staging_ground.len(), 1);
        m.clear_staging().unwrap();
        assert!(m.state().portfolios.staging_ground.is_empty());
        assert!(matches!(m.delete_trade(&a), Err(JournalError::TradeNotFound(_))));
    }
}

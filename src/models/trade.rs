use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{JournalError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Entry strictly below the stop is a short; everything else is a long.
    pub fn from_prices(entry: f64, stop: f64) -> Self {
        if entry < stop {
            Direction::Short
        } else {
            Direction::Long
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

/// The five user-editable numeric fields of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateableField {
    StartEquity,
    EntryPrice,
    StopPrice,
    IdealExitPrice,
    Size,
}

impl UpdateableField {
    pub const ALL: [UpdateableField; 5] = [
        UpdateableField::StartEquity,
        UpdateableField::EntryPrice,
        UpdateableField::StopPrice,
        UpdateableField::IdealExitPrice,
        UpdateableField::Size,
    ];

    /// Label used both for display and as the persisted JSON key.
    pub fn label(&self) -> &'static str {
        match self {
            UpdateableField::StartEquity => "Start Equity",
            UpdateableField::EntryPrice => "Entry Price",
            UpdateableField::StopPrice => "Stop Price",
            UpdateableField::IdealExitPrice => "Ideal Exit",
            UpdateableField::Size => "Size",
        }
    }
}

impl fmt::Display for UpdateableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for UpdateableField {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-', ' '], "");
        match normalized.as_str() {
            "startequity" | "equity" => Ok(UpdateableField::StartEquity),
            "entryprice" | "entry" => Ok(UpdateableField::EntryPrice),
            "stopprice" | "stop" => Ok(UpdateableField::StopPrice),
            "idealexit" | "idealexitprice" | "exit" => Ok(UpdateableField::IdealExitPrice),
            "size" => Ok(UpdateableField::Size),
            _ => Err(JournalError::InvalidInput(format!("Unknown trade field: {}", s))),
        }
    }
}

/// Parsed numeric trade parameters, without lifecycle data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeFields {
    pub start_equity: f64,
    pub entry_price: f64,
    pub stop_price: f64,
    pub ideal_exit_price: f64,
    pub size: f64,
}

impl TradeFields {
    pub fn get(&self, field: UpdateableField) -> f64 {
        match field {
            UpdateableField::StartEquity => self.start_equity,
            UpdateableField::EntryPrice => self.entry_price,
            UpdateableField::StopPrice => self.stop_price,
            UpdateableField::IdealExitPrice => self.ideal_exit_price,
            UpdateableField::Size => self.size,
        }
    }

    pub fn direction(&self) -> Direction {
        Direction::from_prices(self.entry_price, self.stop_price)
    }

    fn validate(&self) -> Result<()> {
        for field in UpdateableField::ALL {
            ensure_finite(field, self.get(field))?;
        }
        Ok(())
    }
}

/// Raw text from the entry form, one string per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeInputs {
    pub start_equity: String,
    pub entry_price: String,
    pub stop_price: String,
    pub ideal_exit_price: String,
    pub size: String,
}

impl TradeInputs {
    /// All five fields must be present and parse to finite numbers.
    pub fn parse(&self) -> Result<TradeFields> {
        Ok(TradeFields {
            start_equity: parse_numeric(UpdateableField::StartEquity, &self.start_equity)?,
            entry_price: parse_numeric(UpdateableField::EntryPrice, &self.entry_price)?,
            stop_price: parse_numeric(UpdateableField::StopPrice, &self.stop_price)?,
            ideal_exit_price: parse_numeric(UpdateableField::IdealExitPrice, &self.ideal_exit_price)?,
            size: parse_numeric(UpdateableField::Size, &self.size)?,
        })
    }
}

pub fn parse_numeric(field: UpdateableField, value: &str) -> Result<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(JournalError::InvalidInput(format!("{} is required", field)));
    }
    let parsed = trimmed
        .parse::<f64>()
        .map_err(|e| JournalError::InvalidInput(format!("{} is not a number: {}", field, e)))?;
    ensure_finite(field, parsed)
}

fn ensure_finite(field: UpdateableField, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(JournalError::InvalidInput(format!("{} must be a finite number", field)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finished {
    pub at: i64,
    /// `true` when the trade exited at its stop, `false` at the ideal exit.
    pub stopped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeState {
    Staging,
    Open,
    Finished,
    Locked,
}

impl TradeState {
    pub fn label(&self) -> &'static str {
        match self {
            TradeState::Staging => "staging",
            TradeState::Open => "open",
            TradeState::Finished => "finished",
            TradeState::Locked => "locked",
        }
    }
}

/// A manually tracked position.
///
/// Direction is never stored; it is recomputed from entry and stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Empty on trades written before ids existed, until the loader assigns one.
    #[serde(default)]
    pub id: String,
    #[serde(rename = "Start Equity")]
    pub start_equity: f64,
    #[serde(rename = "Entry Price")]
    pub entry_price: f64,
    #[serde(rename = "Stop Price")]
    pub stop_price: f64,
    #[serde(rename = "Ideal Exit")]
    pub ideal_exit_price: f64,
    #[serde(rename = "Size")]
    pub size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<Finished>,
    #[serde(default)]
    pub locked: bool,
}

pub fn new_trade_id(now_millis: i64) -> String {
    format!("TRADE-{}-{}", now_millis, uuid::Uuid::new_v4())
}

impl Trade {
    /// Creates a staging trade. Fails on any non-finite field.
    pub fn create(id: String, fields: TradeFields) -> Result<Trade> {
        fields.validate()?;
        Ok(Trade {
            id,
            start_equity: fields.start_equity,
            entry_price: fields.entry_price,
            stop_price: fields.stop_price,
            ideal_exit_price: fields.ideal_exit_price,
            size: fields.size,
            started: None,
            finished: None,
            locked: false,
        })
    }

    pub fn fields(&self) -> TradeFields {
        TradeFields {
            start_equity: self.start_equity,
            entry_price: self.entry_price,
            stop_price: self.stop_price,
            ideal_exit_price: self.ideal_exit_price,
            size: self.size,
        }
    }

    pub fn direction(&self) -> Direction {
        Direction::from_prices(self.entry_price, self.stop_price)
    }

    pub fn state(&self) -> TradeState {
        if self.locked {
            TradeState::Locked
        } else if self.finished.is_some() {
            TradeState::Finished
        } else if self.started.is_some() {
            TradeState::Open
        } else {
            TradeState::Staging
        }
    }

    pub fn start(&self, at: i64) -> Result<Trade> {
        self.ensure_unlocked()?;
        if self.state() != TradeState::Staging {
            return Err(self.invalid("start"));
        }
        Ok(Trade { started: Some(at), ..self.clone() })
    }

    pub fn finish(&self, at: i64, stopped: bool) -> Result<Trade> {
        self.ensure_unlocked()?;
        if self.state() != TradeState::Open {
            return Err(self.invalid("finish"));
        }
        Ok(Trade {
            finished: Some(Finished { at, stopped, notes: None }),
            ..self.clone()
        })
    }

    pub fn back_to_staging(&self) -> Result<Trade> {
        self.ensure_unlocked()?;
        if self.state() != TradeState::Open {
            return Err(self.invalid("send back"));
        }
        Ok(Trade { started: None, ..self.clone() })
    }

    pub fn lock(&self) -> Result<Trade> {
        if self.state() != TradeState::Finished {
            return Err(self.invalid("lock"));
        }
        Ok(Trade { locked: true, ..self.clone() })
    }

    pub fn update_field(&self, field: UpdateableField, value: f64) -> Result<Trade> {
        self.ensure_unlocked()?;
        let value = ensure_finite(field, value)?;
        let mut updated = self.clone();
        match field {
            UpdateableField::StartEquity => updated.start_equity = value,
            UpdateableField::EntryPrice => updated.entry_price = value,
            UpdateableField::StopPrice => updated.stop_price = value,
            UpdateableField::IdealExitPrice => updated.ideal_exit_price = value,
            UpdateableField::Size => updated.size = value,
        }
        Ok(updated)
    }

    /// Empty notes clear the field.
    pub fn with_notes(&self, notes: &str) -> Result<Trade> {
        self.ensure_unlocked()?;
        let Some(finished) = &self.finished else {
            return Err(self.invalid("annotate"));
        };
        let notes = notes.trim();
        Ok(Trade {
            finished: Some(Finished {
                notes: (!notes.is_empty()).then(|| notes.to_string()),
                ..finished.clone()
            }),
            ..self.clone()
        })
    }

    /// Copy with a fresh identity. Only staged trades can be duplicated.
    pub fn duplicate(&self, id: String) -> Result<Trade> {
        if self.state() != TradeState::Staging {
            return Err(self.invalid("duplicate"));
        }
        Ok(Trade { id, ..self.clone() })
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.locked {
            Err(JournalError::TradeLocked(self.id.clone()))
        } else {
            Ok(())
        }
    }

    fn invalid(&self, action: &'static str) -> JournalError {
        JournalError::InvalidTransition {
            action,
            state: self.state().label(),
        }
    }
}

use serde::{Deserialize, Serialize};

use crate::error::{JournalError, Result};

pub const DEFAULT_NAME: &str = "My Trades";
pub const DEFAULT_PORTFOLIO: &str = "My Portfolio";
pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

/// Remake parameters as introduced by schema version 2.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRemakeParams {
    pub avg_win: f64,
    pub avg_loss: f64,
}

/// Defaults attached to every document upgraded from version 1 to 2.
pub const DEFAULT_REMAKE_V2: LegacyRemakeParams = LegacyRemakeParams {
    avg_win: 40.0,
    avg_loss: 10.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemakeParams {
    pub avg_loss: f64,
    pub avg_gain_per_loss_factor: f64,
    pub stop_loss: f64,
    pub goal: f64,
    pub start: f64,
    pub win_rate: f64,
}

/// Fill-in values for the fields version 3 added on top of version 2.
pub const DEFAULT_REMAKE_V3_STOP_LOSS: f64 = 10.0;
pub const DEFAULT_REMAKE_V3_GOAL: f64 = 1_000_000.0;
pub const DEFAULT_REMAKE_V3_START: f64 = 100.0;
pub const DEFAULT_REMAKE_V3_WIN_RATE: f64 = 80.0;

impl RemakeParams {
    /// Upgrade a version-2 pair, keeping `avg_loss` and deriving the gain factor.
    ///
    /// A pair that cannot produce a finite positive factor (zero or negative
    /// loss, non-finite values) is replaced by `DEFAULT_REMAKE_V2`.
    pub fn from_legacy(legacy: LegacyRemakeParams) -> Self {
        let usable = |value: f64| value.is_finite() && value > 0.0;
        let legacy = if usable(legacy.avg_loss) && usable(legacy.avg_win / legacy.avg_loss) {
            legacy
        } else {
            log::warn!(
                "Unusable remake params (avgWin {}, avgLoss {}), using defaults",
                legacy.avg_win,
                legacy.avg_loss
            );
            DEFAULT_REMAKE_V2
        };
        Self {
            avg_loss: legacy.avg_loss,
            avg_gain_per_loss_factor: legacy.avg_win / legacy.avg_loss,
            stop_loss: DEFAULT_REMAKE_V3_STOP_LOSS,
            goal: DEFAULT_REMAKE_V3_GOAL,
            start: DEFAULT_REMAKE_V3_START,
            win_rate: DEFAULT_REMAKE_V3_WIN_RATE,
        }
    }

    /// All six values must be finite and strictly positive.
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("avgLoss", self.avg_loss),
            ("avgGainPerLossFactor", self.avg_gain_per_loss_factor),
            ("stopLoss", self.stop_loss),
            ("goal", self.goal),
            ("start", self.start),
            ("winRate", self.win_rate),
        ];
        for (name, value) in named {
            if !value.is_finite() || value <= 0.0 {
                return Err(JournalError::InvalidInput(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for RemakeParams {
    fn default() -> Self {
        Self::from_legacy(DEFAULT_REMAKE_V2)
    }
}

/// Key material slot carried since version 1. Nothing in the journal reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encryption {
    pub pubkey: String,
    pub bybit: String,
}

/// Parses an IANA zone name such as `Europe/Berlin`.
pub fn validate_timezone(timezone: &str) -> Result<chrono_tz::Tz> {
    timezone
        .trim()
        .parse::<chrono_tz::Tz>()
        .map_err(|_| JournalError::InvalidInput(format!("Unknown timezone: {}", timezone)))
}

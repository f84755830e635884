use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{JournalError, Result};
use crate::models::portfolio::Portfolios;
use crate::models::settings::{
    Encryption, LegacyRemakeParams, RemakeParams, DEFAULT_NAME, DEFAULT_TIMEZONE,
};

pub const CURRENT_VERSION: u32 = 3;

/// A `version` field that only accepts the literal `N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Version<const N: u32>;

impl<const N: u32> Serialize for Version<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(N)
    }
}

impl<'de, const N: u32> Deserialize<'de> for Version<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let found = u32::deserialize(deserializer)?;
        if found == N {
            Ok(Version)
        } else {
            Err(D::Error::custom(format!("expected version {}, found {}", N, found)))
        }
    }
}

/// Documents written before versioning existed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStateV0 {
    #[serde(flatten)]
    pub portfolios: Portfolios,
    pub name: String,
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStateV1 {
    #[serde(flatten)]
    pub portfolios: Portfolios,
    pub name: String,
    pub timezone: String,
    pub version: Version<1>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<Encryption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStateV2 {
    #[serde(flatten)]
    pub portfolios: Portfolios,
    pub name: String,
    pub timezone: String,
    pub version: Version<2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<Encryption>,
    pub remake_params: LegacyRemakeParams,
}

/// The current persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStateV3 {
    #[serde(flatten)]
    pub portfolios: Portfolios,
    pub name: String,
    pub timezone: String,
    pub version: Version<3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<Encryption>,
    pub remake_params: RemakeParams,
}

pub type AppState = AppStateV3;

impl AppStateV3 {
    /// The seed document written on first launch and on reset.
    pub fn initial() -> Self {
        Self {
            portfolios: Portfolios::default(),
            name: DEFAULT_NAME.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            version: Version,
            encryption: None,
            remake_params: RemakeParams::default(),
        }
    }

    /// Checks a migrated document before it may be stored: remake params
    /// must serialize back losslessly and trade ids must be unique.
    pub fn validate(&self) -> Result<()> {
        self.remake_params.validate()?;
        self.portfolios.ensure_unique_ids()
    }
}

/// Any persisted shape the journal knows how to read.
#[derive(Debug, Clone, PartialEq)]
pub enum SomeAppState {
    V0(AppStateV0),
    V1(AppStateV1),
    V2(AppStateV2),
    V3(AppStateV3),
}

impl SomeAppState {
    /// Picks the shape from the `version` field; a missing field means V0.
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(JournalError::ParseError(
                "Persisted state must be a JSON object".to_string(),
            ));
        }
        let state = match value.get("version") {
            None => SomeAppState::V0(serde_json::from_value(value)?),
            Some(version) => match version.as_u64() {
                Some(1) => SomeAppState::V1(serde_json::from_value(value)?),
                Some(2) => SomeAppState::V2(serde_json::from_value(value)?),
                Some(3) => SomeAppState::V3(serde_json::from_value(value)?),
                _ => return Err(JournalError::UnsupportedVersion(version.to_string())),
            },
        };
        Ok(state)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn version(&self) -> u32 {
        match self {
            SomeAppState::V0(_) => 0,
            SomeAppState::V1(_) => 1,
            SomeAppState::V2(_) => 2,
            SomeAppState::V3(_) => 3,
        }
    }
}

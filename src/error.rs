use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JournalError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot {action} a trade that is {state}")]
    InvalidTransition { action: &'static str, state: &'static str },

    #[error("Trade {0} is locked")]
    TradeLocked(String),

    #[error("Trade not found: {0}")]
    TradeNotFound(String),

    #[error("Portfolio not found: {0}")]
    PortfolioNotFound(String),

    #[error("Portfolio already exists: {0}")]
    PortfolioExists(String),

    #[error("Version not supported: {0}")]
    UnsupportedVersion(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid document: {0}")]
    ParseError(String),
}

impl From<rusqlite::Error> for JournalError {
    fn from(err: rusqlite::Error) -> Self {
        JournalError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for JournalError {
    fn from(err: serde_json::Error) -> Self {
        JournalError::ParseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, JournalError>;

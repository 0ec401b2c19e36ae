//! Error types for the fund orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, FundError>;

#[derive(Error, Debug)]
pub enum FundError {

    // =============================
    // Recoverable pipeline errors
    // =============================

    #[error("Planning error: {0}")]
    Planning(String),

    #[error("Signal parse error from {analyst}: {reason}")]
    SignalParse { analyst: String, reason: String },

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Drawdown guard triggered: {0}")]
    DrawdownGuard(String),

    #[error("Reasoning service error: {0}")]
    Llm(String),

    #[error("Market data error: {0}")]
    Data(String),

    // =============================
    // Fatal errors (abort the run)
    // =============================

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    // =============================
    // External library conversions
    // =============================

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//! Error types for the walk-forward engine.

use thiserror::Error;

/// Main error type for the engine.
#[derive(Error, Debug)]
pub enum StriderError {
    /// Malformed bar data. Fatal for the run: no fold can proceed without
    /// valid bars.
    #[error("Data error: {0}")]
    Data(String),

    /// Not enough history for a lookback at a given bar. Recovered locally
    /// by skipping that bar's decision.
    #[error("Insufficient history at bar {index}: lookback requires {lookback} prior bars")]
    InsufficientHistory { index: usize, lookback: usize },

    /// A fold's parameter search exceeded its wall-clock budget. Only that
    /// fold fails; siblings continue.
    #[error("Optimization budget exceeded in fold {fold_id}")]
    OptimizationTimeout { fold_id: usize },

    /// Position sizing produced an untradeable volume. Recovered by skipping
    /// the signal.
    #[error("Sizing error: {0}")]
    Sizing(String),

    #[error("Invalid configuration: {0}")]
    ConfigValidation(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, StriderError>;

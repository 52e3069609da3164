//! # Strider
//!
//! A walk-forward analysis engine for breakout trading strategies.
//!
//! Strider loads OHLCV bar data from CSV, generates opening-range breakout
//! signals with ATR-sized exits, simulates them through a single-position
//! backtester with fixed-fractional sizing, and validates parameter choices
//! with walk-forward analysis: optimize on an in-sample window, evaluate on
//! the adjacent unseen window, repeat across consecutive folds, and report
//! how much of the optimized edge survives out of sample.
//!
//! ## Quick start
//!
//! ```no_run
//! use strider::config::WfaFileConfig;
//! use strider::data::{load_csv, DataConfig};
//!
//! fn main() -> strider::Result<()> {
//!     let config = WfaFileConfig::load("wfa.toml")?;
//!     let bars = load_csv("EURUSD_H1.csv", &DataConfig::default())?;
//!
//!     let runner = config.to_runner();
//!     let report = runner.run(&bars)?;
//!
//!     println!("{}", report.summary());
//!     report.write_json("wfa_report.json")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`types`] - bars, signals, positions, closed trades, symbol specs
//! - [`data`] - CSV loading, validation, ATR and range indicators
//! - [`params`] - strategy parameters and the optimization grid
//! - [`signal`] - opening-range breakout signal generation
//! - [`filter`] - trade-quality filters (ATR floor, trend, cost ratio)
//! - [`simulator`] - bar-by-bar single-position backtest
//! - [`analytics`] - profit factor, Sharpe, drawdown and streak metrics
//! - [`walkforward`] - fold planning, grid search and the run driver
//! - [`report`] - fold and run reports, JSON output
//! - [`config`] - TOML/JSON run configuration

pub mod analytics;
pub mod config;
pub mod data;
pub mod error;
pub mod filter;
pub mod params;
pub mod report;
pub mod signal;
pub mod simulator;
pub mod types;
pub mod walkforward;

pub use analytics::{compute_statistics, StatisticsConfig, StatisticsReport};
pub use config::WfaFileConfig;
pub use data::{load_csv, DataConfig};
pub use error::{Result, StriderError};
pub use params::{ParameterGrid, StrategyParameters};
pub use report::{FoldReport, WalkForwardReport};
pub use signal::generate_signal;
pub use simulator::{simulate, SimulationResult, SimulatorConfig};
pub use types::{Bar, ClosedTrade, Direction, ExitReason, Signal, SignalDirection, SymbolSpec};
pub use walkforward::{
    calculate_folds, Fold, OptimizationMetric, WalkForwardConfig, WalkForwardRunner,
};

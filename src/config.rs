//! File-based configuration for a whole walk-forward run.
//!
//! Runs are described by one TOML (or JSON) file gathering the data source,
//! symbol, strategy, simulator, walk-forward plan and optimization grid in
//! one place. Every section is optional; missing sections take their
//! defaults, so an empty file is a valid configuration.

use crate::data::DataConfig;
use crate::error::{Result, StriderError};
use crate::params::{ParameterGrid, StrategyParameters};
use crate::simulator::SimulatorConfig;
use crate::types::SymbolSpec;
use crate::walkforward::{WalkForwardConfig, WalkForwardRunner};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// `[data]` section: where bars come from and how strictly to read them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// Path to the CSV file of bars.
    pub path: Option<String>,
    pub date_format: Option<String>,
    /// Delimiter character; auto-detected when absent.
    pub delimiter: Option<char>,
    pub skip_invalid: bool,
}

impl DataSection {
    pub fn to_data_config(&self) -> DataConfig {
        DataConfig {
            date_format: self.date_format.clone(),
            delimiter: self.delimiter.map(|c| c as u8),
            skip_invalid: self.skip_invalid,
        }
    }
}

/// `[symbol]` section. Unset pricing fields fall back to 5-digit forex
/// conventions; `jpy = true` switches to 3-digit JPY-pair pip arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolSection {
    pub name: String,
    pub jpy: bool,
    pub spread_pips: f64,
    pub pip_value: Option<f64>,
    pub lot_step: Option<f64>,
    pub min_lot: Option<f64>,
    pub max_lot: Option<f64>,
}

impl Default for SymbolSection {
    fn default() -> Self {
        Self {
            name: "EURUSD".to_string(),
            jpy: false,
            spread_pips: 1.0,
            pip_value: None,
            lot_step: None,
            min_lot: None,
            max_lot: None,
        }
    }
}

impl SymbolSection {
    pub fn to_symbol_spec(&self) -> SymbolSpec {
        let mut spec = if self.jpy {
            SymbolSpec::forex_jpy(&self.name)
        } else {
            SymbolSpec::forex(&self.name)
        };
        spec.spread_pips = self.spread_pips;
        if let Some(v) = self.pip_value {
            spec.pip_value = v;
        }
        if let Some(v) = self.lot_step {
            spec.lot_step = v;
        }
        if let Some(v) = self.min_lot {
            spec.min_lot = v;
        }
        if let Some(v) = self.max_lot {
            spec.max_lot = v;
        }
        spec
    }
}

/// The whole run configuration as it appears on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WfaFileConfig {
    pub data: DataSection,
    pub symbol: SymbolSection,
    pub strategy: StrategyParameters,
    pub simulator: SimulatorConfig,
    pub walkforward: WalkForwardConfig,
    pub optimization: ParameterGrid,
}

impl WfaFileConfig {
    /// Load from a TOML or JSON file, chosen by extension (anything other
    /// than `.json` is parsed as TOML).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Self = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&contents)?
        } else {
            toml::from_str(&contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load the file if possible, otherwise warn and use defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Could not load config from {}: {}; using defaults",
                    path.as_ref().display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.strategy
            .validate()
            .map_err(|e| StriderError::ConfigValidation(format!("[strategy] {}", e)))?;

        if self.symbol.name.is_empty() {
            return Err(StriderError::ConfigValidation(
                "[symbol] name must not be empty".to_string(),
            ));
        }
        if self.symbol.spread_pips < 0.0 {
            return Err(StriderError::ConfigValidation(format!(
                "[symbol] spread_pips must be non-negative, got {}",
                self.symbol.spread_pips
            )));
        }
        if self.simulator.initial_balance <= 0.0 {
            return Err(StriderError::ConfigValidation(format!(
                "[simulator] initial_balance must be positive, got {}",
                self.simulator.initial_balance
            )));
        }
        if !(self.simulator.risk_percent > 0.0 && self.simulator.risk_percent <= 100.0) {
            return Err(StriderError::ConfigValidation(format!(
                "[simulator] risk_percent must be in (0, 100], got {}",
                self.simulator.risk_percent
            )));
        }
        if self.walkforward.num_folds == 0 {
            return Err(StriderError::ConfigValidation(
                "[walkforward] num_folds must be at least 1".to_string(),
            ));
        }
        if !(self.walkforward.is_ratio > 0.0 && self.walkforward.is_ratio < 1.0) {
            return Err(StriderError::ConfigValidation(format!(
                "[walkforward] is_ratio must be in (0, 1), got {}",
                self.walkforward.is_ratio
            )));
        }
        Ok(())
    }

    /// Build the runner this configuration describes. The simulator's
    /// starting balance also seeds the statistics baseline so drawdown
    /// percentages refer to the same account.
    pub fn to_runner(&self) -> WalkForwardRunner {
        let mut runner = WalkForwardRunner::new(
            self.symbol.to_symbol_spec(),
            self.strategy.clone(),
            self.optimization.clone(),
        );
        runner.config = self.walkforward.clone();
        runner.simulator = self.simulator.clone();
        runner.statistics.initial_balance = self.simulator.initial_balance;
        runner
    }

    /// A commented example configuration, suitable for `--init` style
    /// scaffolding or documentation.
    pub fn example() -> &'static str {
        r#"# Walk-forward run configuration

[data]
path = "EURUSD_H1.csv"
# date_format = "%Y.%m.%d %H:%M"
skip_invalid = false

[symbol]
name = "EURUSD"
spread_pips = 1.0

[strategy]
lookback_period = 20
atr_period = 14
tp_atr_multiplier = 2.0
sl_atr_multiplier = 1.5
min_break_distance_pips = 5.0
min_profit_pips = 10.0

[simulator]
initial_balance = 10000.0
risk_percent = 1.0
allow_same_bar_reentry = false

[walkforward]
num_folds = 5
is_ratio = 0.7
anchored = false
metric = "sharpe"
parallel = true

[optimization]
lookback_periods = [10, 20, 30]
tp_atr_multipliers = [1.5, 2.0, 2.5]
sl_atr_multipliers = [1.0, 1.5, 2.0]
"#
    }
}

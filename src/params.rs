//! Strategy parameters and the optimization search space.
//!
//! Parameters are a plain value type: optimization produces new values, and
//! nothing mutates a parameter set after creation. A mutated parameter set
//! would mean information leaking across fold boundaries.

use crate::error::{Result, StriderError};
use serde::{Deserialize, Serialize};

/// Parameters of the breakout strategy and its cost filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParameters {
    /// Bars in the breakout range window.
    #[serde(default = "default_lookback")]
    pub lookback_period: usize,
    /// Bars in the ATR window for stop/target sizing.
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    /// Take-profit distance as a multiple of ATR.
    #[serde(default = "default_tp_mult")]
    pub tp_atr_multiplier: f64,
    /// Stop-loss distance as a multiple of ATR.
    #[serde(default = "default_sl_mult")]
    pub sl_atr_multiplier: f64,
    /// Minimum close-beyond-range distance for a valid breakout, in pips.
    #[serde(default = "default_break_distance")]
    pub min_break_distance_pips: f64,
    /// Minimum take-profit distance worth trading, in pips.
    #[serde(default = "default_min_profit")]
    pub min_profit_pips: f64,
    /// ATR must be at least this fraction of min_profit_pips.
    #[serde(default = "default_atr_ratio")]
    pub min_atr_ratio: f64,
    /// Minimum take-profit / spread-cost ratio.
    #[serde(default = "default_cost_ratio")]
    pub min_cost_ratio: f64,
    /// Minimum trend strength in [0, 1].
    #[serde(default = "default_trend_strength")]
    pub min_trend_strength: f64,
}

fn default_lookback() -> usize {
    20
}
fn default_atr_period() -> usize {
    14
}
fn default_tp_mult() -> f64 {
    2.0
}
fn default_sl_mult() -> f64 {
    1.5
}
fn default_break_distance() -> f64 {
    5.0
}
fn default_min_profit() -> f64 {
    10.0
}
fn default_atr_ratio() -> f64 {
    0.5
}
fn default_cost_ratio() -> f64 {
    2.0
}
fn default_trend_strength() -> f64 {
    0.3
}

impl Default for StrategyParameters {
    fn default() -> Self {
        Self {
            lookback_period: default_lookback(),
            atr_period: default_atr_period(),
            tp_atr_multiplier: default_tp_mult(),
            sl_atr_multiplier: default_sl_mult(),
            min_break_distance_pips: default_break_distance(),
            min_profit_pips: default_min_profit(),
            min_atr_ratio: default_atr_ratio(),
            min_cost_ratio: default_cost_ratio(),
            min_trend_strength: default_trend_strength(),
        }
    }
}

impl StrategyParameters {
    /// Validate numeric ranges, failing fast with a descriptive error.
    pub fn validate(&self) -> Result<()> {
        if self.lookback_period < 2 {
            return Err(StriderError::ConfigValidation(format!(
                "lookback_period must be at least 2, got {}",
                self.lookback_period
            )));
        }
        if self.atr_period == 0 {
            return Err(StriderError::ConfigValidation(
                "atr_period must be positive".to_string(),
            ));
        }
        if !(self.tp_atr_multiplier > 0.0) || !(self.sl_atr_multiplier > 0.0) {
            return Err(StriderError::ConfigValidation(format!(
                "ATR multipliers must be positive, got tp={} sl={}",
                self.tp_atr_multiplier, self.sl_atr_multiplier
            )));
        }
        if self.min_break_distance_pips < 0.0 || !self.min_break_distance_pips.is_finite() {
            return Err(StriderError::ConfigValidation(format!(
                "min_break_distance_pips must be finite and non-negative, got {}",
                self.min_break_distance_pips
            )));
        }
        if self.min_profit_pips < 0.0 || !self.min_profit_pips.is_finite() {
            return Err(StriderError::ConfigValidation(format!(
                "min_profit_pips must be finite and non-negative, got {}",
                self.min_profit_pips
            )));
        }
        if self.min_atr_ratio < 0.0 || self.min_cost_ratio < 0.0 {
            return Err(StriderError::ConfigValidation(format!(
                "ratio thresholds must be non-negative, got atr_ratio={} cost_ratio={}",
                self.min_atr_ratio, self.min_cost_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.min_trend_strength) {
            return Err(StriderError::ConfigValidation(format!(
                "min_trend_strength must be in [0, 1], got {}",
                self.min_trend_strength
            )));
        }
        Ok(())
    }

    /// Warmup bars needed before a signal decision is possible.
    pub fn warmup_period(&self) -> usize {
        self.lookback_period.max(self.atr_period + 1)
    }
}

/// Grid of parameter values searched during in-sample optimization.
///
/// Dimensions left empty fall back to the base parameter value, so an empty
/// grid degenerates to evaluating the base parameters once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    #[serde(default)]
    pub lookback_periods: Vec<usize>,
    #[serde(default)]
    pub tp_atr_multipliers: Vec<f64>,
    #[serde(default)]
    pub sl_atr_multipliers: Vec<f64>,
}

impl ParameterGrid {
    /// Expand the grid into concrete candidates around a base parameter set.
    /// Candidate order is deterministic, which makes optimization tie-breaks
    /// deterministic too.
    pub fn expand(&self, base: &StrategyParameters) -> Vec<StrategyParameters> {
        let lookbacks: Vec<usize> = if self.lookback_periods.is_empty() {
            vec![base.lookback_period]
        } else {
            self.lookback_periods.clone()
        };
        let tps: Vec<f64> = if self.tp_atr_multipliers.is_empty() {
            vec![base.tp_atr_multiplier]
        } else {
            self.tp_atr_multipliers.clone()
        };
        let sls: Vec<f64> = if self.sl_atr_multipliers.is_empty() {
            vec![base.sl_atr_multiplier]
        } else {
            self.sl_atr_multipliers.clone()
        };

        let mut candidates = Vec::with_capacity(lookbacks.len() * tps.len() * sls.len());
        for &lookback in &lookbacks {
            for &tp in &tps {
                for &sl in &sls {
                    candidates.push(StrategyParameters {
                        lookback_period: lookback,
                        tp_atr_multiplier: tp,
                        sl_atr_multiplier: sl,
                        ..base.clone()
                    });
                }
            }
        }
        candidates
    }

    /// Number of candidates this grid expands to.
    pub fn size(&self) -> usize {
        self.lookback_periods.len().max(1)
            * self.tp_atr_multipliers.len().max(1)
            * self.sl_atr_multipliers.len().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters_validate() {
        assert!(StrategyParameters::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_ranges() {
        let mut params = StrategyParameters::default();
        params.lookback_period = 1;
        assert!(params.validate().is_err());

        let mut params = StrategyParameters::default();
        params.sl_atr_multiplier = 0.0;
        assert!(params.validate().is_err());

        let mut params = StrategyParameters::default();
        params.min_trend_strength = 1.5;
        assert!(params.validate().is_err());

        let mut params = StrategyParameters::default();
        params.min_profit_pips = f64::NAN;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_warmup_period() {
        let params = StrategyParameters {
            lookback_period: 20,
            atr_period: 14,
            ..Default::default()
        };
        assert_eq!(params.warmup_period(), 20);

        let params = StrategyParameters {
            lookback_period: 10,
            atr_period: 14,
            ..Default::default()
        };
        assert_eq!(params.warmup_period(), 15);
    }

    #[test]
    fn test_empty_grid_yields_base() {
        let base = StrategyParameters::default();
        let grid = ParameterGrid::default();
        let candidates = grid.expand(&base);
        assert_eq!(candidates, vec![base]);
    }

    #[test]
    fn test_grid_expansion_is_cartesian() {
        let base = StrategyParameters::default();
        let grid = ParameterGrid {
            lookback_periods: vec![10, 20],
            tp_atr_multipliers: vec![1.5, 2.0, 2.5],
            sl_atr_multipliers: vec![],
        };

        let candidates = grid.expand(&base);
        assert_eq!(candidates.len(), 6);
        assert_eq!(grid.size(), 6);

        // All candidates keep the base stop multiplier
        assert!(candidates
            .iter()
            .all(|c| (c.sl_atr_multiplier - base.sl_atr_multiplier).abs() < 1e-12));

        // Deterministic order: lookback varies slowest
        assert_eq!(candidates[0].lookback_period, 10);
        assert_eq!(candidates[3].lookback_period, 20);
    }
}

//! Cost-resistant signal filtering.
//!
//! A breakout can be genuine and still untradeable: if the expected move
//! cannot clear spread and minimum-profit thresholds, taking the signal just
//! donates the spread. Every check here is a pure function of its inputs.

use crate::params::StrategyParameters;
use crate::types::{Signal, SymbolSpec};
use serde::Serialize;
use std::fmt;

/// Why a signal was rejected by the cost filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum RejectReason {
    /// ATR too small relative to the minimum profit target.
    AtrTooSmall,
    /// Market not trending enough to sustain a breakout.
    WeakTrend,
    /// Take-profit distance below the minimum worth trading.
    TargetBelowMinProfit,
    /// Take-profit too small relative to the spread cost.
    PoorCostRatio,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::AtrTooSmall => write!(f, "atr-too-small"),
            RejectReason::WeakTrend => write!(f, "weak-trend"),
            RejectReason::TargetBelowMinProfit => write!(f, "target-below-min-profit"),
            RejectReason::PoorCostRatio => write!(f, "poor-cost-ratio"),
        }
    }
}

/// Verdict of the cost filter for a single signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum FilterVerdict {
    Pass,
    Reject(RejectReason),
}

/// Evaluate the cost filter against a signal. Deterministic for identical
/// inputs; checks run in a fixed order and the first failure wins.
pub fn evaluate(
    signal: &Signal,
    atr_pips: f64,
    trend_strength: f64,
    spec: &SymbolSpec,
    params: &StrategyParameters,
) -> FilterVerdict {
    if atr_pips < params.min_atr_ratio * params.min_profit_pips {
        return FilterVerdict::Reject(RejectReason::AtrTooSmall);
    }

    if trend_strength < params.min_trend_strength {
        return FilterVerdict::Reject(RejectReason::WeakTrend);
    }

    let tp_pips = spec.price_to_pips(signal.take_profit_distance);
    if tp_pips < params.min_profit_pips {
        return FilterVerdict::Reject(RejectReason::TargetBelowMinProfit);
    }

    // Zero spread makes the ratio unconstrained
    if spec.spread_pips > 0.0 && tp_pips / spec.spread_pips < params.min_cost_ratio {
        return FilterVerdict::Reject(RejectReason::PoorCostRatio);
    }

    FilterVerdict::Pass
}

/// Convenience boolean form of [`evaluate`].
pub fn passes_filters(
    signal: &Signal,
    atr_pips: f64,
    trend_strength: f64,
    spec: &SymbolSpec,
    params: &StrategyParameters,
) -> bool {
    matches!(
        evaluate(signal, atr_pips, trend_strength, spec, params),
        FilterVerdict::Pass
    )
}

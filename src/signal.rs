//! Breakout signal generation.
//!
//! The decision at bar `i` is made at that bar's close: the range extrema are
//! computed from `bars[i - lookback .. i]` only, and the close of bar `i` is
//! used solely to test whether the prior range was broken. Nothing at index
//! `i + 1` or later can influence the output, which is what the
//! no-look-ahead tests pin down.

use crate::data::{atr, highest_high, lowest_low};
use crate::error::{Result, StriderError};
use crate::params::StrategyParameters;
use crate::types::{Bar, Signal, SignalDirection, SymbolSpec};

/// Generate a breakout signal for the bar at `current_index`.
///
/// Returns `InsufficientHistory` when fewer than `lookback_period` bars
/// precede the index. A window whose high equals its low (a dead market)
/// never produces a signal.
pub fn generate_signal(
    bars: &[Bar],
    current_index: usize,
    params: &StrategyParameters,
    spec: &SymbolSpec,
) -> Result<Signal> {
    if current_index < params.lookback_period {
        return Err(StriderError::InsufficientHistory {
            index: current_index,
            lookback: params.lookback_period,
        });
    }
    if current_index >= bars.len() {
        return Err(StriderError::Data(format!(
            "Bar index {} out of range ({} bars)",
            current_index,
            bars.len()
        )));
    }

    let window_start = current_index - params.lookback_period;
    // Both extrema exist: the window is non-empty by the history check above
    let range_high = match highest_high(bars, window_start, current_index) {
        Some(h) => h,
        None => return Ok(Signal::none(current_index)),
    };
    let range_low = match lowest_low(bars, window_start, current_index) {
        Some(l) => l,
        None => return Ok(Signal::none(current_index)),
    };

    // Flat window: no range to break, and downstream distance normalization
    // would divide by zero.
    if range_high - range_low <= f64::EPSILON {
        return Ok(Signal::none(current_index));
    }

    // ATR from history only; the current bar is excluded from every decision
    // variable.
    let atr_value = match atr(&bars[..current_index], params.atr_period) {
        Some(a) if a > 0.0 => a,
        _ => return Ok(Signal::none(current_index)),
    };

    let break_distance = spec.pips_to_price(params.min_break_distance_pips);
    let close = bars[current_index].close;

    let direction = if close > range_high + break_distance {
        SignalDirection::Buy
    } else if close < range_low - break_distance {
        SignalDirection::Sell
    } else {
        SignalDirection::None
    };

    if direction == SignalDirection::None {
        return Ok(Signal::none(current_index));
    }

    Ok(Signal {
        direction,
        reference_bar_index: current_index,
        entry_price_hint: close,
        stop_loss_distance: params.sl_atr_multiplier * atr_value,
        take_profit_distance: params.tp_atr_multiplier * atr_value,
    })
}

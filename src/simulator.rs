//! Bar-by-bar backtest simulator.
//!
//! A single-position state machine: FLAT until a filtered breakout signal is
//! accepted, OPEN until the stop, the target, or a reversal signal closes the
//! position. All mutable state lives in an explicit [`SimulationContext`]
//! owned by the caller's stack frame; there are no globals, which is what
//! lets folds run in parallel over one shared bar slice.

use crate::data::{atr, trend_strength};
use crate::error::{Result, StriderError};
use crate::filter::{evaluate, FilterVerdict};
use crate::params::StrategyParameters;
use crate::signal::generate_signal;
use crate::types::{Bar, ClosedTrade, Direction, ExitReason, Position, SymbolSpec};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Starting account balance in account currency.
    pub initial_balance: f64,
    /// Fixed-fractional risk per trade, as a percentage of balance.
    pub risk_percent: f64,
    /// Allow a new entry on the same bar that closed a position.
    /// Default off: one bar should not be counted twice.
    pub allow_same_bar_reentry: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            risk_percent: 1.0,
            allow_same_bar_reentry: false,
        }
    }
}

/// Mutable state of one simulation, owned by the caller.
#[derive(Debug, Clone)]
pub struct SimulationContext {
    pub balance: f64,
    pub open_position: Option<Position>,
    pub trades: Vec<ClosedTrade>,
    /// Signals dropped because sizing fell below the broker minimum.
    pub skipped_signals: usize,
    /// Signals dropped by the cost filter.
    pub filtered_signals: usize,
}

impl SimulationContext {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            balance: initial_balance,
            open_position: None,
            trades: Vec::new(),
            skipped_signals: 0,
            filtered_signals: 0,
        }
    }

    fn close_position(
        &mut self,
        time: chrono::DateTime<chrono::Utc>,
        price: f64,
        reason: ExitReason,
        spec: &SymbolSpec,
    ) {
        if let Some(position) = self.open_position.take() {
            let trade = position.close(time, price, reason, spec);
            debug!(
                "Closed {} at {:.5} ({}): {:+.1} pips",
                trade.direction, price, reason, trade.pnl_pips
            );
            self.balance += trade.pnl_currency;
            self.trades.push(trade);
        }
    }
}

/// Outcome of a simulation over one bar range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub trades: Vec<ClosedTrade>,
    pub final_balance: f64,
    pub skipped_signals: usize,
    pub filtered_signals: usize,
}

/// Compute trade volume from fixed-fractional risk, floored to the broker's
/// lot step and clamped to the allowed lot range.
pub fn size_position(
    balance: f64,
    risk_percent: f64,
    stop_loss_pips: f64,
    spec: &SymbolSpec,
) -> Result<f64> {
    if stop_loss_pips <= 0.0 {
        return Err(StriderError::Sizing(format!(
            "Non-positive stop distance: {} pips",
            stop_loss_pips
        )));
    }

    let risk_amount = balance * (risk_percent / 100.0);
    let raw = risk_amount / (stop_loss_pips * spec.pip_value);
    let stepped = ((raw / spec.lot_step) + 1e-9).floor() * spec.lot_step;

    if stepped < spec.min_lot {
        return Err(StriderError::Sizing(format!(
            "Computed volume {:.4} below minimum lot {:.2}",
            stepped, spec.min_lot
        )));
    }

    Ok(stepped.min(spec.max_lot))
}

/// Run the simulator over `bars[range]`.
///
/// Indices are absolute into `bars`: signal lookback may read history before
/// `range.start` (chronologically past data), while position state and the
/// ledger always start cold. Exits are evaluated on bars after the entry bar,
/// stop before target; a reversal signal closes at the bar's close. Any
/// position still open at the end of the range is force-closed at the final
/// close.
pub fn simulate(
    bars: &[Bar],
    range: Range<usize>,
    params: &StrategyParameters,
    spec: &SymbolSpec,
    config: &SimulatorConfig,
) -> Result<SimulationResult> {
    if range.start >= range.end || range.end > bars.len() {
        return Err(StriderError::Data(format!(
            "Invalid simulation range {}..{} over {} bars",
            range.start,
            range.end,
            bars.len()
        )));
    }

    let mut ctx = SimulationContext::new(config.initial_balance);

    for i in range.clone() {
        let bar = &bars[i];
        let mut closed_this_bar = false;

        if let Some(position) = ctx.open_position.clone() {
            let exit = intrabar_exit(&position, bar);

            if let Some((price, reason)) = exit {
                ctx.close_position(bar.timestamp, price, reason, spec);
                closed_this_bar = true;
            } else {
                // Reversal check at the bar's close
                match generate_signal(bars, i, params, spec) {
                    Ok(signal) if signal.direction.opposes(position.direction) => {
                        ctx.close_position(bar.timestamp, bar.close, ExitReason::Reversal, spec);
                        closed_this_bar = true;
                    }
                    Ok(_) => {}
                    Err(StriderError::InsufficientHistory { .. }) => {}
                    Err(e) => return Err(e),
                }
            }

            if closed_this_bar && !config.allow_same_bar_reentry {
                continue;
            }
        }

        if ctx.open_position.is_none() {
            // Entries wait for full indicator history; the lookback window
            // and the ATR both need settled bars behind them.
            if i < params.warmup_period() {
                continue;
            }
            let signal = generate_signal(bars, i, params, spec)?;

            let direction = match signal.direction.as_direction() {
                Some(d) => d,
                None => continue,
            };

            let atr_pips = atr(&bars[..i], params.atr_period)
                .map(|a| spec.price_to_pips(a))
                .unwrap_or(0.0);
            let trend = trend_strength(&bars[..i], params.lookback_period).unwrap_or(0.0);

            match evaluate(&signal, atr_pips, trend, spec, params) {
                FilterVerdict::Pass => {}
                FilterVerdict::Reject(reason) => {
                    debug!("Signal at bar {} filtered: {}", i, reason);
                    ctx.filtered_signals += 1;
                    continue;
                }
            }

            let stop_loss_pips = spec.price_to_pips(signal.stop_loss_distance);
            let volume =
                match size_position(ctx.balance, config.risk_percent, stop_loss_pips, spec) {
                    Ok(v) => v,
                    Err(StriderError::Sizing(msg)) => {
                        debug!("Signal at bar {} skipped: {}", i, msg);
                        ctx.skipped_signals += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                };

            // Entry at the signal bar's close, adjusted adversely by the
            // spread: longs pay the ask, shorts receive the bid.
            let spread = spec.pips_to_price(spec.spread_pips);
            let open_price = match direction {
                Direction::Buy => bar.close + spread,
                Direction::Sell => bar.close - spread,
            };
            let (stop_loss, take_profit) = match direction {
                Direction::Buy => (
                    open_price - signal.stop_loss_distance,
                    open_price + signal.take_profit_distance,
                ),
                Direction::Sell => (
                    open_price + signal.stop_loss_distance,
                    open_price - signal.take_profit_distance,
                ),
            };

            debug!(
                "Opening {} at bar {} ({:.5}), vol {:.2}",
                direction, i, open_price, volume
            );
            ctx.open_position = Some(Position::new(
                direction,
                bar.timestamp,
                open_price,
                stop_loss,
                take_profit,
                volume,
            ));
        }
    }

    // Force-close anything still open at the end of the range
    let last = &bars[range.end - 1];
    ctx.close_position(last.timestamp, last.close, ExitReason::EndOfData, spec);

    Ok(SimulationResult {
        final_balance: ctx.balance,
        trades: ctx.trades,
        skipped_signals: ctx.skipped_signals,
        filtered_signals: ctx.filtered_signals,
    })
}

/// Intrabar exit for an open position: stop first, then target.
fn intrabar_exit(position: &Position, bar: &Bar) -> Option<(f64, ExitReason)> {
    match position.direction {
        Direction::Buy => {
            if bar.low <= position.stop_loss {
                Some((position.stop_loss, ExitReason::StopLoss))
            } else if bar.high >= position.take_profit {
                Some((position.take_profit, ExitReason::TakeProfit))
            } else {
                None
            }
        }
        Direction::Sell => {
            if bar.high >= position.stop_loss {
                Some((position.stop_loss, ExitReason::StopLoss))
            } else if bar.low <= position.take_profit {
                Some((position.take_profit, ExitReason::TakeProfit))
            } else {
                None
            }
        }
    }
}

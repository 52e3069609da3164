//! Performance statistics over a closed-trade ledger.
//!
//! All metrics are pure functions of the ledger plus a [`StatisticsConfig`];
//! trades are sorted by close time before any sequential metric (drawdown,
//! streaks) is computed, so callers may pass ledgers in any order.

use crate::types::ClosedTrade;
use serde::{Deserialize, Serialize};

/// Parameters for metric computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// Annual risk-free rate used in Sharpe and Sortino, as a fraction.
    pub risk_free_rate: f64,
    /// Annualization factor for ratio metrics.
    pub periods_per_year: f64,
    /// Balance the drawdown percentage is measured against.
    pub initial_balance: f64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            periods_per_year: 252.0,
            initial_balance: 10_000.0,
        }
    }
}

/// Aggregate statistics for one ledger.
///
/// `profit_factor` is `f64::INFINITY` when there are winners and no losers;
/// note that serde_json serializes non-finite floats as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub total_pnl: f64,
    pub profit_factor: f64,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_drawdown_abs: f64,
    pub max_drawdown_pct: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

impl StatisticsReport {
    /// The all-zero report for an empty ledger.
    pub fn empty() -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            gross_profit: 0.0,
            gross_loss: 0.0,
            total_pnl: 0.0,
            profit_factor: 0.0,
            win_rate: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            calmar_ratio: 0.0,
            max_drawdown_abs: 0.0,
            max_drawdown_pct: 0.0,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
        }
    }
}

/// Compute the full report for a ledger.
pub fn compute_statistics(trades: &[ClosedTrade], config: &StatisticsConfig) -> StatisticsReport {
    if trades.is_empty() {
        return StatisticsReport::empty();
    }

    let mut sorted: Vec<&ClosedTrade> = trades.iter().collect();
    sorted.sort_by_key(|t| t.close_time);

    let pnls: Vec<f64> = sorted.iter().map(|t| t.pnl_currency).collect();

    let winning_trades = pnls.iter().filter(|&&p| p > 0.0).count();
    let losing_trades = pnls.iter().filter(|&&p| p < 0.0).count();
    let gross_profit: f64 = pnls.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = pnls.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();
    let total_pnl: f64 = pnls.iter().sum();

    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let win_rate = winning_trades as f64 / pnls.len() as f64;
    let avg_win = if winning_trades > 0 {
        gross_profit / winning_trades as f64
    } else {
        0.0
    };
    let avg_loss = if losing_trades > 0 {
        gross_loss / losing_trades as f64
    } else {
        0.0
    };

    let (max_drawdown_abs, max_drawdown_pct) = max_drawdown(&pnls, config.initial_balance);
    let (max_consecutive_wins, max_consecutive_losses) = streaks(&pnls);

    let sharpe_ratio = sharpe(&pnls, config);
    let sortino_ratio = sortino(&pnls, config);
    let calmar_ratio = if max_drawdown_pct > 0.0 {
        (total_pnl / config.initial_balance * 100.0) / max_drawdown_pct
    } else {
        0.0
    };

    StatisticsReport {
        total_trades: pnls.len(),
        winning_trades,
        losing_trades,
        gross_profit,
        gross_loss,
        total_pnl,
        profit_factor,
        win_rate,
        avg_win,
        avg_loss,
        sharpe_ratio,
        sortino_ratio,
        calmar_ratio,
        max_drawdown_abs,
        max_drawdown_pct,
        max_consecutive_wins,
        max_consecutive_losses,
    }
}

/// Largest peak-to-trough loss of the cumulative P&L curve, absolute and as
/// a percentage of the balance at the peak.
fn max_drawdown(pnls: &[f64], initial_balance: f64) -> (f64, f64) {
    let mut cumulative = 0.0;
    let mut peak = 0.0_f64;
    let mut max_abs = 0.0_f64;
    let mut max_pct = 0.0_f64;

    for pnl in pnls {
        cumulative += pnl;
        peak = peak.max(cumulative);
        let drawdown = peak - cumulative;
        if drawdown > max_abs {
            max_abs = drawdown;
        }
        let balance_at_peak = initial_balance + peak;
        if balance_at_peak > 0.0 {
            let pct = drawdown / balance_at_peak * 100.0;
            if pct > max_pct {
                max_pct = pct;
            }
        }
    }

    (max_abs, max_pct)
}

/// Longest win streak and loss streak. Break-even trades end both.
fn streaks(pnls: &[f64]) -> (usize, usize) {
    let mut max_wins = 0;
    let mut max_losses = 0;
    let mut wins = 0;
    let mut losses = 0;

    for &pnl in pnls {
        if pnl > 0.0 {
            wins += 1;
            losses = 0;
        } else if pnl < 0.0 {
            losses += 1;
            wins = 0;
        } else {
            wins = 0;
            losses = 0;
        }
        max_wins = max_wins.max(wins);
        max_losses = max_losses.max(losses);
    }

    (max_wins, max_losses)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Annualized Sharpe ratio of per-trade returns. Zero when fewer than two
/// trades or when the returns have no variance.
fn sharpe(pnls: &[f64], config: &StatisticsConfig) -> f64 {
    if pnls.len() < 2 {
        return 0.0;
    }
    let per_period_rf = config.risk_free_rate / config.periods_per_year;
    let returns: Vec<f64> = pnls
        .iter()
        .map(|p| p / config.initial_balance - per_period_rf)
        .collect();
    let m = mean(&returns);
    let sd = std_dev(&returns, m);
    if sd <= f64::EPSILON {
        return 0.0;
    }
    m / sd * config.periods_per_year.sqrt()
}

/// Sortino ratio: like Sharpe but penalizing only downside deviation. Zero
/// when there is no downside at all.
fn sortino(pnls: &[f64], config: &StatisticsConfig) -> f64 {
    if pnls.len() < 2 {
        return 0.0;
    }
    let per_period_rf = config.risk_free_rate / config.periods_per_year;
    let returns: Vec<f64> = pnls
        .iter()
        .map(|p| p / config.initial_balance - per_period_rf)
        .collect();
    let m = mean(&returns);
    let downside_sq: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    let downside_dev = (downside_sq / returns.len() as f64).sqrt();
    if downside_dev <= f64::EPSILON {
        return 0.0;
    }
    m / downside_dev * config.periods_per_year.sqrt()
}

//! Walk-forward analysis: repeated in-sample optimization followed by
//! out-of-sample evaluation on the adjacent unseen segment.
//!
//! The first `is_ratio` of the data seeds the in-sample window; the rest is
//! split into `num_folds` consecutive out-of-sample segments. Rolling folds
//! slide a fixed-length in-sample window forward with each segment, anchored
//! folds grow it from the first bar. Every fold runs the same `run_fold`
//! code path whether the run is sequential or parallel, so results are
//! bit-identical either way.

use crate::analytics::{compute_statistics, StatisticsConfig, StatisticsReport};
use crate::error::{Result, StriderError};
use crate::params::{ParameterGrid, StrategyParameters};
use crate::report::{FoldReport, WalkForwardReport};
use crate::simulator::{simulate, SimulatorConfig};
use crate::types::{Bar, ClosedTrade, SymbolSpec};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Objective used to rank candidates during in-sample optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMetric {
    Sharpe,
    ProfitFactor,
    NetPnl,
    WinRate,
}

impl OptimizationMetric {
    pub fn extract(&self, stats: &StatisticsReport) -> f64 {
        match self {
            Self::Sharpe => stats.sharpe_ratio,
            Self::ProfitFactor => stats.profit_factor,
            Self::NetPnl => stats.total_pnl,
            Self::WinRate => stats.win_rate,
        }
    }
}

/// Walk-forward run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    pub num_folds: usize,
    /// Fraction of the data seeding the in-sample window, in (0, 1).
    pub is_ratio: f64,
    /// Grow the in-sample window from bar zero instead of sliding it.
    pub anchored: bool,
    pub min_is_bars: usize,
    pub min_oos_bars: usize,
    pub metric: OptimizationMetric,
    /// Wall-clock budget for one fold's grid search, in seconds.
    pub optimization_budget_secs: Option<u64>,
    pub parallel: bool,
    pub show_progress: bool,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            num_folds: 5,
            is_ratio: 0.7,
            anchored: false,
            min_is_bars: 50,
            min_oos_bars: 10,
            metric: OptimizationMetric::Sharpe,
            optimization_budget_secs: None,
            parallel: true,
            show_progress: false,
        }
    }
}

impl WalkForwardConfig {
    pub fn budget(&self) -> Option<Duration> {
        self.optimization_budget_secs.map(Duration::from_secs)
    }
}

/// One fold's index windows, half-open over a shared bar slice. The
/// out-of-sample segment starts exactly where the in-sample segment ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub fold_id: usize,
    pub is_start: usize,
    pub is_end: usize,
    pub oos_start: usize,
    pub oos_end: usize,
}

impl Fold {
    pub fn is_bars(&self) -> usize {
        self.is_end - self.is_start
    }

    pub fn oos_bars(&self) -> usize {
        self.oos_end - self.oos_start
    }
}

/// Partition `total_bars` into fold windows. Folds too small to be
/// meaningful are skipped with a warning; a plan with no valid fold at all
/// is an error.
pub fn calculate_folds(total_bars: usize, config: &WalkForwardConfig) -> Result<Vec<Fold>> {
    if config.num_folds == 0 {
        return Err(StriderError::ConfigValidation(
            "num_folds must be at least 1".to_string(),
        ));
    }
    if !(config.is_ratio > 0.0 && config.is_ratio < 1.0) {
        return Err(StriderError::ConfigValidation(format!(
            "is_ratio must be in (0, 1), got {}",
            config.is_ratio
        )));
    }

    let is_len = (total_bars as f64 * config.is_ratio) as usize;
    if is_len == 0 || is_len >= total_bars {
        return Err(StriderError::Data(format!(
            "Not enough bars ({}) to split at ratio {}",
            total_bars, config.is_ratio
        )));
    }
    let oos_len = (total_bars - is_len) / config.num_folds;

    let mut folds = Vec::with_capacity(config.num_folds);
    for k in 0..config.num_folds {
        let oos_start = is_len + k * oos_len;
        // Leftover bars from integer division land in the last fold
        let oos_end = if k == config.num_folds - 1 {
            total_bars
        } else {
            oos_start + oos_len
        };
        let is_start = if config.anchored { 0 } else { oos_start - is_len };

        let fold = Fold {
            fold_id: k,
            is_start,
            is_end: oos_start,
            oos_start,
            oos_end,
        };

        if fold.is_bars() < config.min_is_bars {
            warn!(
                "Skipping fold {}: {} in-sample bars < minimum {}",
                k,
                fold.is_bars(),
                config.min_is_bars
            );
            continue;
        }
        if fold.oos_bars() < config.min_oos_bars {
            warn!(
                "Skipping fold {}: {} out-of-sample bars < minimum {}",
                k,
                fold.oos_bars(),
                config.min_oos_bars
            );
            continue;
        }
        folds.push(fold);
    }

    if folds.is_empty() {
        return Err(StriderError::Data(format!(
            "No valid folds from {} bars with {} requested",
            total_bars, config.num_folds
        )));
    }
    Ok(folds)
}

/// Drives a full walk-forward run over one symbol's bar series.
#[derive(Debug, Clone)]
pub struct WalkForwardRunner {
    pub config: WalkForwardConfig,
    pub simulator: SimulatorConfig,
    pub statistics: StatisticsConfig,
    pub spec: SymbolSpec,
    pub base_params: StrategyParameters,
    pub grid: ParameterGrid,
}

impl WalkForwardRunner {
    pub fn new(spec: SymbolSpec, base_params: StrategyParameters, grid: ParameterGrid) -> Self {
        Self {
            config: WalkForwardConfig::default(),
            simulator: SimulatorConfig::default(),
            statistics: StatisticsConfig::default(),
            spec,
            base_params,
            grid,
        }
    }

    /// Optimize on the fold's in-sample window and evaluate the winner on
    /// its out-of-sample window. Candidates are scored in fixed grid order;
    /// a later candidate replaces the incumbent only on a strictly greater
    /// score, so ties resolve deterministically to the earliest candidate.
    pub fn run_fold(&self, bars: &[Bar], fold: &Fold) -> Result<(FoldReport, Vec<ClosedTrade>)> {
        let started = Instant::now();
        let budget = self.config.budget();
        let candidates = self.grid.expand(&self.base_params);

        let mut best: Option<(StrategyParameters, f64)> = None;
        for candidate in candidates {
            if let Some(limit) = budget {
                if started.elapsed() > limit {
                    return Err(StriderError::OptimizationTimeout {
                        fold_id: fold.fold_id,
                    });
                }
            }
            candidate.validate()?;

            let is_result = simulate(
                bars,
                fold.is_start..fold.is_end,
                &candidate,
                &self.spec,
                &self.simulator,
            )?;
            let is_stats = compute_statistics(&is_result.trades, &self.statistics);
            let score = self.config.metric.extract(&is_stats);
            if score.is_nan() {
                continue;
            }

            let replace = match &best {
                Some((_, incumbent)) => score > *incumbent,
                None => true,
            };
            if replace {
                debug!(
                    "Fold {}: new best score {:.4} (lookback {}, tp {:.2}, sl {:.2})",
                    fold.fold_id,
                    score,
                    candidate.lookback_period,
                    candidate.tp_atr_multiplier,
                    candidate.sl_atr_multiplier
                );
                best = Some((candidate, score));
            }
        }

        let (winner, is_score) = best.ok_or_else(|| {
            StriderError::Data(format!(
                "Fold {}: every candidate produced an unusable score",
                fold.fold_id
            ))
        })?;

        // Out-of-sample evaluation: cold-started state, unseen bars
        let oos_result = simulate(
            bars,
            fold.oos_start..fold.oos_end,
            &winner,
            &self.spec,
            &self.simulator,
        )?;
        let oos_stats = compute_statistics(&oos_result.trades, &self.statistics);

        let report = FoldReport {
            fold_id: fold.fold_id,
            parameters_used: winner,
            is_score,
            oos_stats,
            oos_start: bars[fold.oos_start].timestamp,
            oos_end: bars[fold.oos_end - 1].timestamp,
            trade_count: oos_result.trades.len(),
        };
        Ok((report, oos_result.trades))
    }

    /// Run every fold and assemble the aggregate report. Individual fold
    /// failures are recorded and do not abort the run.
    pub fn run(&self, bars: &[Bar]) -> Result<WalkForwardReport> {
        let folds = calculate_folds(bars.len(), &self.config)?;
        info!(
            "Walk-forward: {} folds over {} bars, {} candidates each",
            folds.len(),
            bars.len(),
            self.grid.size()
        );

        let progress = if self.config.show_progress {
            let pb = ProgressBar::new(folds.len() as u64);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} folds ({eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
            );
            Some(pb)
        } else {
            None
        };

        let run_one = |fold: &Fold| {
            let outcome = self.run_fold(bars, fold);
            if let Some(pb) = &progress {
                pb.inc(1);
            }
            (fold.fold_id, outcome)
        };

        let mut outcomes: Vec<(usize, Result<(FoldReport, Vec<ClosedTrade>)>)> =
            if self.config.parallel {
                folds.par_iter().map(run_one).collect()
            } else {
                folds.iter().map(run_one).collect()
            };
        outcomes.sort_by_key(|(fold_id, _)| *fold_id);

        if let Some(pb) = &progress {
            pb.finish_and_clear();
        }

        let mut fold_reports = Vec::new();
        let mut all_trades = Vec::new();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for (fold_id, outcome) in outcomes {
            match outcome {
                Ok((report, trades)) => {
                    if report.trade_count == 0 {
                        warnings.push(format!("fold {}: no out-of-sample trades", fold_id));
                    }
                    all_trades.extend(trades);
                    fold_reports.push(report);
                }
                Err(e) => {
                    warn!("Fold {} failed: {}", fold_id, e);
                    errors.push(format!("fold {}: {}", fold_id, e));
                }
            }
        }

        let aggregate = compute_statistics(&all_trades, &self.statistics);
        let avg_is_score = average(fold_reports.iter().map(|f| f.is_score));
        let avg_oos_score = average(
            fold_reports
                .iter()
                .map(|f| self.config.metric.extract(&f.oos_stats)),
        );
        let efficiency = if avg_is_score.abs() > f64::EPSILON && avg_is_score.is_finite() {
            avg_oos_score / avg_is_score
        } else {
            0.0
        };

        let report = WalkForwardReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            symbol: self.spec.symbol.clone(),
            config: self.config.clone(),
            folds: fold_reports,
            aggregate,
            avg_is_score,
            avg_oos_score,
            efficiency,
            warnings,
            errors,
        };
        info!("{}", report.summary());
        Ok(report)
    }
}

fn average<I: Iterator<Item = f64>>(values: I) -> f64 {
    let collected: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    if collected.is_empty() {
        return 0.0;
    }
    collected.iter().sum::<f64>() / collected.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(num_folds: usize, is_ratio: f64, anchored: bool) -> WalkForwardConfig {
        WalkForwardConfig {
            num_folds,
            is_ratio,
            anchored,
            min_is_bars: 10,
            min_oos_bars: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_rolling_folds_are_consecutive() {
        let folds = calculate_folds(1000, &config(5, 0.7, false)).unwrap();
        assert_eq!(folds.len(), 5);
        for fold in &folds {
            assert_eq!(fold.oos_start, fold.is_end);
            assert_eq!(fold.is_bars(), 700);
        }
        for pair in folds.windows(2) {
            assert_eq!(pair[0].oos_end, pair[1].oos_start);
        }
        assert_eq!(folds.last().unwrap().oos_end, 1000);
    }

    #[test]
    fn test_anchored_folds_grow_from_zero() {
        let folds = calculate_folds(1000, &config(4, 0.6, true)).unwrap();
        for fold in &folds {
            assert_eq!(fold.is_start, 0);
        }
        assert!(folds[1].is_bars() > folds[0].is_bars());
    }

    #[test]
    fn test_leftover_bars_land_in_last_fold() {
        // 103 bars, 0.7 ratio -> 72 IS, 31 OOS over 3 folds of 10 + last 11
        let folds = calculate_folds(103, &config(3, 0.7, false)).unwrap();
        assert_eq!(folds.last().unwrap().oos_end, 103);
        let covered: usize = folds.iter().map(Fold::oos_bars).sum();
        assert_eq!(covered, 103 - 72);
    }

    #[test]
    fn test_undersized_folds_are_rejected() {
        // 20 bars cannot satisfy min_is_bars 10 / min_oos_bars 5 over 4 folds
        let result = calculate_folds(20, &config(4, 0.7, false));
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_folds_is_config_error() {
        let err = calculate_folds(1000, &config(0, 0.7, false)).unwrap_err();
        assert!(matches!(err, StriderError::ConfigValidation(_)));
    }

    #[test]
    fn test_bad_ratio_is_config_error() {
        assert!(calculate_folds(1000, &config(5, 0.0, false)).is_err());
        assert!(calculate_folds(1000, &config(5, 1.0, false)).is_err());
    }

    #[test]
    fn test_metric_extraction() {
        let mut stats = StatisticsReport::empty();
        stats.sharpe_ratio = 1.2;
        stats.profit_factor = 1.8;
        stats.total_pnl = 340.0;
        stats.win_rate = 0.55;
        assert_eq!(OptimizationMetric::Sharpe.extract(&stats), 1.2);
        assert_eq!(OptimizationMetric::ProfitFactor.extract(&stats), 1.8);
        assert_eq!(OptimizationMetric::NetPnl.extract(&stats), 340.0);
        assert_eq!(OptimizationMetric::WinRate.extract(&stats), 0.55);
    }

    #[test]
    fn test_average_skips_non_finite() {
        assert_eq!(average([1.0, f64::INFINITY, 3.0].into_iter()), 2.0);
        assert_eq!(average(std::iter::empty()), 0.0);
    }
}

//! End-to-end tests: CSV loading, configuration files, and full
//! walk-forward runs over synthetic bar series.

use chrono::{TimeZone, Utc};
use std::io::Write;
use strider::{
    calculate_folds, load_csv, Bar, DataConfig, OptimizationMetric, ParameterGrid,
    StrategyParameters, SymbolSpec, WalkForwardConfig, WalkForwardRunner, WfaFileConfig,
};
use tempfile::NamedTempFile;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(i as i64),
        open,
        high,
        low,
        close,
        250.0,
    )
}

/// Repeating consolidation-then-breakout cycles stepping the price level up,
/// so every fold of a walk-forward split contains tradable breakouts.
fn cyclic_breakout_series(cycles: usize) -> Vec<Bar> {
    let mut bars = Vec::new();
    let mut level = 1.1000;
    let mut i = 0;

    for _ in 0..cycles {
        for k in 0..30 {
            let wiggle = (k % 3) as f64 * 0.0002 - 0.0002;
            bars.push(bar(
                i,
                level + wiggle,
                level + 0.0004,
                level - 0.0004,
                level + wiggle,
            ));
            i += 1;
        }
        for k in 0..15 {
            let base = level + 0.0012 + k as f64 * 0.0009;
            bars.push(bar(i, base, base + 0.0012, base - 0.0003, base + 0.0008));
            i += 1;
        }
        level += 0.0012 + 14.0 * 0.0009;
    }
    bars
}

fn permissive_params() -> StrategyParameters {
    StrategyParameters {
        lookback_period: 20,
        atr_period: 14,
        min_break_distance_pips: 5.0,
        min_profit_pips: 1.0,
        min_atr_ratio: 0.1,
        min_cost_ratio: 0.1,
        min_trend_strength: 0.0,
        ..Default::default()
    }
}

fn runner(parallel: bool) -> WalkForwardRunner {
    let mut runner = WalkForwardRunner::new(
        SymbolSpec::forex("EURUSD").with_spread(0.5),
        permissive_params(),
        ParameterGrid {
            lookback_periods: vec![15, 20],
            tp_atr_multipliers: vec![1.5, 2.0],
            sl_atr_multipliers: vec![],
        },
    );
    runner.config = WalkForwardConfig {
        num_folds: 4,
        is_ratio: 0.6,
        anchored: false,
        min_is_bars: 50,
        min_oos_bars: 20,
        metric: OptimizationMetric::NetPnl,
        optimization_budget_secs: None,
        parallel,
        show_progress: false,
    };
    runner
}

#[test]
fn full_walk_forward_run_produces_trades() {
    init_tracing();
    let bars = cyclic_breakout_series(20);
    let report = runner(false).run(&bars).unwrap();

    assert!(report.is_complete(), "errors: {:?}", report.errors);
    assert_eq!(report.folds.len(), 4);
    assert!(report.aggregate.total_trades > 0);

    for fold in &report.folds {
        assert_eq!(fold.trade_count, fold.oos_stats.total_trades);
        assert!(fold.oos_start < fold.oos_end);
        // The winning candidate came from the configured grid
        assert!([15, 20].contains(&fold.parameters_used.lookback_period));
        assert!([1.5, 2.0].contains(&fold.parameters_used.tp_atr_multiplier));
    }
}

#[test]
fn parallel_and_sequential_runs_agree() {
    init_tracing();
    let bars = cyclic_breakout_series(20);
    let sequential = runner(false).run(&bars).unwrap();
    let parallel = runner(true).run(&bars).unwrap();

    assert_eq!(sequential.folds.len(), parallel.folds.len());
    for (s, p) in sequential.folds.iter().zip(parallel.folds.iter()) {
        assert_eq!(s.fold_id, p.fold_id);
        assert_eq!(s.parameters_used, p.parameters_used);
        assert_eq!(s.is_score, p.is_score);
        assert_eq!(s.oos_stats, p.oos_stats);
    }
    assert_eq!(sequential.aggregate, parallel.aggregate);
}

#[test]
fn exhausted_optimization_budget_fails_folds_without_killing_the_run() {
    init_tracing();
    let bars = cyclic_breakout_series(20);
    let mut r = runner(false);
    r.config.optimization_budget_secs = Some(0);

    let report = r.run(&bars).unwrap();

    assert!(!report.is_complete());
    assert!(report.folds.is_empty());
    assert_eq!(report.errors.len(), 4);
    for err in &report.errors {
        assert!(err.contains("budget"), "unexpected fold error: {}", err);
    }
    assert_eq!(report.aggregate.total_trades, 0);
    assert_eq!(report.efficiency, 0.0);
}

#[test]
fn fold_results_do_not_depend_on_execution_order() {
    let bars = cyclic_breakout_series(20);
    let r = runner(false);
    let folds = calculate_folds(bars.len(), &r.config).unwrap();

    let forward: Vec<_> = folds.iter().map(|f| r.run_fold(&bars, f).unwrap()).collect();
    let reversed: Vec<_> = folds
        .iter()
        .rev()
        .map(|f| r.run_fold(&bars, f).unwrap())
        .collect();

    for (fwd, rev) in forward.iter().zip(reversed.iter().rev()) {
        assert_eq!(fwd.0.fold_id, rev.0.fold_id);
        assert_eq!(fwd.0.parameters_used, rev.0.parameters_used);
        assert_eq!(fwd.0.is_score, rev.0.is_score);
        assert_eq!(fwd.0.oos_stats, rev.0.oos_stats);
        assert_eq!(fwd.1, rev.1);
    }
}

#[test]
fn fold_oos_segments_cover_tail_exactly_once() {
    let bars = cyclic_breakout_series(20);
    let config = runner(false).config;
    let folds = calculate_folds(bars.len(), &config).unwrap();

    for pair in folds.windows(2) {
        assert_eq!(pair[0].oos_end, pair[1].oos_start);
    }
    assert_eq!(folds.last().unwrap().oos_end, bars.len());
}

#[test]
fn report_json_has_stable_schema() {
    let bars = cyclic_breakout_series(20);
    let report = runner(false).run(&bars).unwrap();
    let json = report.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    for key in [
        "run_id",
        "generated_at",
        "symbol",
        "config",
        "folds",
        "aggregate",
        "avg_is_score",
        "avg_oos_score",
        "efficiency",
    ] {
        assert!(value.get(key).is_some(), "missing top-level key {}", key);
    }
    let aggregate = &value["aggregate"];
    for key in [
        "total_trades",
        "winning_trades",
        "losing_trades",
        "profit_factor",
        "win_rate",
        "sharpe_ratio",
        "max_drawdown_pct",
        "max_drawdown_abs",
        "max_consecutive_wins",
        "max_consecutive_losses",
    ] {
        assert!(aggregate.get(key).is_some(), "missing aggregate key {}", key);
    }
}

#[test]
fn report_written_to_disk_parses_back() {
    let bars = cyclic_breakout_series(20);
    let report = runner(false).run(&bars).unwrap();

    let file = NamedTempFile::new().unwrap();
    report.write_json(file.path()).unwrap();

    let contents = std::fs::read_to_string(file.path()).unwrap();
    let parsed: strider::WalkForwardReport = serde_json::from_str(&contents).unwrap();
    assert_eq!(parsed.run_id, report.run_id);
    assert_eq!(parsed.folds.len(), report.folds.len());
}

#[test]
fn csv_load_round_trip() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Date,Open,High,Low,Close,Volume").unwrap();
    writeln!(file, "2024-01-01 00:00:00,1.1000,1.1010,1.0990,1.1005,150").unwrap();
    writeln!(file, "2024-01-01 01:00:00,1.1005,1.1020,1.1000,1.1015,180").unwrap();
    writeln!(file, "2024-01-01 02:00:00,1.1015,1.1030,1.1010,1.1025,120").unwrap();
    file.flush().unwrap();

    let bars = load_csv(file.path(), &DataConfig::default()).unwrap();
    assert_eq!(bars.len(), 3);
    assert!((bars[0].open - 1.1000).abs() < 1e-9);
    assert!((bars[2].close - 1.1025).abs() < 1e-9);
    assert!(bars[0].timestamp < bars[1].timestamp);
}

#[test]
fn csv_load_rejects_unordered_rows_in_strict_mode() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Date,Open,High,Low,Close,Volume").unwrap();
    writeln!(file, "2024-01-01 01:00:00,1.1005,1.1020,1.1000,1.1015,180").unwrap();
    writeln!(file, "2024-01-01 00:00:00,1.1000,1.1010,1.0990,1.1005,150").unwrap();
    file.flush().unwrap();

    assert!(load_csv(file.path(), &DataConfig::default()).is_err());
}

#[test]
fn csv_load_sorts_in_lenient_mode() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Date,Open,High,Low,Close,Volume").unwrap();
    writeln!(file, "2024-01-01 01:00:00,1.1005,1.1020,1.1000,1.1015,180").unwrap();
    writeln!(file, "2024-01-01 00:00:00,1.1000,1.1010,1.0990,1.1005,150").unwrap();
    file.flush().unwrap();

    let config = DataConfig {
        skip_invalid: true,
        ..Default::default()
    };
    let bars = load_csv(file.path(), &config).unwrap();
    assert_eq!(bars.len(), 2);
    assert!(bars[0].timestamp < bars[1].timestamp);
}

#[test]
fn config_file_drives_runner() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        r#"
[symbol]
name = "GBPUSD"
spread_pips = 1.2

[simulator]
initial_balance = 50000.0
risk_percent = 0.5

[walkforward]
num_folds = 3
metric = "profit_factor"

[optimization]
lookback_periods = [10, 25]
"#
    )
    .unwrap();
    file.flush().unwrap();

    let config = WfaFileConfig::load(file.path()).unwrap();
    let runner = config.to_runner();
    assert_eq!(runner.spec.symbol, "GBPUSD");
    assert_eq!(runner.simulator.initial_balance, 50_000.0);
    assert_eq!(runner.statistics.initial_balance, 50_000.0);
    assert_eq!(runner.config.num_folds, 3);
    assert_eq!(runner.config.metric, OptimizationMetric::ProfitFactor);
    assert_eq!(runner.grid.lookback_periods, vec![10, 25]);
}

#[test]
fn config_load_or_default_survives_missing_file() {
    let config = WfaFileConfig::load_or_default("/nonexistent/wfa.toml");
    assert_eq!(config, WfaFileConfig::default());
}

#[test]
fn shipped_example_config_is_valid() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(file, "{}", WfaFileConfig::example()).unwrap();
    file.flush().unwrap();
    let config = WfaFileConfig::load(file.path()).unwrap();
    assert_eq!(config.symbol.name, "EURUSD");
}

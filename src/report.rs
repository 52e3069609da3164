//! Walk-forward run reports and JSON serialization.

use crate::analytics::StatisticsReport;
use crate::error::Result;
use crate::params::StrategyParameters;
use crate::walkforward::WalkForwardConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Outcome of one fold: the parameters that won the in-sample search and the
/// out-of-sample statistics they produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldReport {
    pub fold_id: usize,
    pub parameters_used: StrategyParameters,
    /// Score of the winning candidate on the in-sample segment.
    pub is_score: f64,
    pub oos_stats: StatisticsReport,
    pub oos_start: DateTime<Utc>,
    pub oos_end: DateTime<Utc>,
    pub trade_count: usize,
}

/// Full report for one walk-forward run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub symbol: String,
    /// Echo of the fold plan and optimization settings that produced this
    /// report, so a report file is interpretable on its own.
    pub config: WalkForwardConfig,
    pub folds: Vec<FoldReport>,
    /// Statistics over the concatenated out-of-sample ledgers of all folds.
    pub aggregate: StatisticsReport,
    pub avg_is_score: f64,
    pub avg_oos_score: f64,
    /// `avg_oos_score / avg_is_score`: how much of the optimized edge
    /// survives out of sample. Zero when the in-sample average is zero.
    pub efficiency: f64,
    pub warnings: Vec<String>,
    /// One entry per fold that failed; the run continues past them.
    pub errors: Vec<String>,
}

impl WalkForwardReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// True when every planned fold produced a result.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Short human-readable digest for log output.
    pub fn summary(&self) -> String {
        format!(
            "{}: {} folds, {} trades, PF {:.2}, win rate {:.1}%, efficiency {:.2}",
            self.symbol,
            self.folds.len(),
            self.aggregate.total_trades,
            self.aggregate.profit_factor,
            self.aggregate.win_rate * 100.0,
            self.efficiency
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> WalkForwardReport {
        WalkForwardReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            symbol: "EURUSD".to_string(),
            config: WalkForwardConfig::default(),
            folds: Vec::new(),
            aggregate: StatisticsReport::empty(),
            avg_is_score: 1.5,
            avg_oos_score: 0.9,
            efficiency: 0.6,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let original = report();
        let json = original.to_json().unwrap();
        let parsed: WalkForwardReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, original.run_id);
        assert_eq!(parsed.symbol, "EURUSD");
        assert_eq!(parsed.efficiency, 0.6);
    }

    #[test]
    fn test_json_uses_stable_keys() {
        let json = report().to_json().unwrap();
        for key in [
            "run_id",
            "generated_at",
            "config",
            "aggregate",
            "avg_is_score",
            "avg_oos_score",
            "efficiency",
            "total_trades",
            "profit_factor",
            "max_drawdown_pct",
        ] {
            assert!(json.contains(key), "missing key {}", key);
        }
    }

    #[test]
    fn test_is_complete() {
        let mut r = report();
        assert!(r.is_complete());
        r.errors.push("fold 2: optimization budget exceeded".to_string());
        assert!(!r.is_complete());
    }

    #[test]
    fn test_summary_mentions_symbol() {
        assert!(report().summary().starts_with("EURUSD"));
    }
}

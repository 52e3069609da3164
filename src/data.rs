//! Historical bar loading and indicator helpers.
//!
//! Bars are loaded from CSV exports (`time, open, high, low, close, volume`)
//! as produced by the trading platform. The loader is strict by default:
//! non-monotonic or duplicate timestamps and non-finite prices abort the run,
//! since no fold can be trusted on top of a corrupt series.

use crate::error::{Result, StriderError};
use crate::types::Bar;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

/// Raw CSV row with flexible column naming.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(
        alias = "Date",
        alias = "date",
        alias = "Timestamp",
        alias = "timestamp",
        alias = "Time",
        alias = "time",
        alias = "datetime",
        alias = "Datetime"
    )]
    date: String,
    #[serde(alias = "Open", alias = "open", alias = "o")]
    open: f64,
    #[serde(alias = "High", alias = "high", alias = "h")]
    high: f64,
    #[serde(alias = "Low", alias = "low", alias = "l")]
    low: f64,
    #[serde(alias = "Close", alias = "close", alias = "c")]
    close: f64,
    #[serde(alias = "Volume", alias = "volume", alias = "v", alias = "vol", default)]
    volume: f64,
}

/// Data source configuration.
#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Date format string for parsing (e.g. "%Y-%m-%d %H:%M:%S").
    pub date_format: Option<String>,
    /// CSV delimiter character. If None, the delimiter is auto-detected.
    pub delimiter: Option<u8>,
    /// Skip invalid rows and sort/dedup instead of failing the load.
    pub skip_invalid: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            date_format: None,
            delimiter: None,
            skip_invalid: false,
        }
    }
}

/// Detect the CSV delimiter from the first few lines of the file.
///
/// Tries comma, tab and semicolon (MT4/MT5 exports vary) and returns the one
/// producing a consistent column count of at least five fields.
fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let lines: Vec<String> = reader.lines().take(5).map_while(|l| l.ok()).collect();

    if lines.is_empty() {
        return Ok(b',');
    }

    for &delim in &[b',', b'\t', b';'] {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| line.as_bytes().iter().filter(|&&b| b == delim).count() + 1)
            .collect();

        let consistent = counts.iter().all(|&c| c == counts[0]);
        if consistent && counts[0] >= 5 {
            debug!("Detected delimiter {:?}", delim as char);
            return Ok(delim);
        }
    }

    Ok(b',')
}

/// Parse a date string with multiple format attempts.
fn parse_datetime(s: &str, format: Option<&str>) -> Result<DateTime<Utc>> {
    if let Some(fmt) = format {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)));
        }
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y.%m.%d %H:%M:%S",
        "%Y.%m.%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y/%m/%d %H:%M:%S",
    ];

    for fmt in &datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d", "%d/%m/%Y"];
    for fmt in &date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)));
        }
    }

    // Unix timestamp fallback
    if let Ok(ts) = s.parse::<i64>() {
        if let Some(dt) = DateTime::from_timestamp(ts, 0) {
            return Ok(dt);
        }
    }

    Err(StriderError::Data(format!("Could not parse date: '{}'", s)))
}

/// Load OHLCV bars from a CSV file.
pub fn load_csv(path: impl AsRef<Path>, config: &DataConfig) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    info!("Loading data from: {}", path.display());

    let delimiter = match config.delimiter {
        Some(d) => d,
        None => detect_delimiter(path)?,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;

    let mut bars = Vec::new();
    let mut skipped = 0usize;
    let mut row_num = 0usize;

    for result in reader.deserialize() {
        row_num += 1;
        let row: CsvRow = match result {
            Ok(r) => r,
            Err(e) => {
                if config.skip_invalid {
                    debug!("Skipping row {}: {}", row_num, e);
                    skipped += 1;
                    continue;
                }
                return Err(StriderError::Csv(e));
            }
        };

        let timestamp = match parse_datetime(&row.date, config.date_format.as_deref()) {
            Ok(ts) => ts,
            Err(e) => {
                if config.skip_invalid {
                    debug!("Skipping row {} due to date parse error: {}", row_num, e);
                    skipped += 1;
                    continue;
                }
                return Err(e);
            }
        };

        let bar = Bar::new(timestamp, row.open, row.high, row.low, row.close, row.volume);
        if !bar.validate() {
            if config.skip_invalid {
                debug!("Skipping row {} due to invalid bar data: {:?}", row_num, bar);
                skipped += 1;
                continue;
            }
            return Err(StriderError::Data(format!(
                "Invalid bar data at row {}: {:?}",
                row_num, bar
            )));
        }

        bars.push(bar);
    }

    if skipped > 0 {
        warn!("Skipped {} invalid rows", skipped);
    }

    if config.skip_invalid {
        bars.sort_by_key(|b| b.timestamp);
        let before = bars.len();
        bars.dedup_by_key(|b| b.timestamp);
        if bars.len() < before {
            warn!("Removed {} duplicate timestamps", before - bars.len());
        }
    } else {
        validate_series(&bars)?;
    }

    if bars.is_empty() {
        return Err(StriderError::Data("No bars loaded".to_string()));
    }

    info!(
        "Loaded {} bars from {} to {}",
        bars.len(),
        bars.first().map(|b| b.timestamp.to_string()).unwrap_or_default(),
        bars.last().map(|b| b.timestamp.to_string()).unwrap_or_default()
    );

    Ok(bars)
}

/// Validate that a bar series is strictly time-ordered with no duplicates.
pub fn validate_series(bars: &[Bar]) -> Result<()> {
    for (i, pair) in bars.windows(2).enumerate() {
        if pair[1].timestamp == pair[0].timestamp {
            return Err(StriderError::Data(format!(
                "Duplicate timestamp at row {}: {}",
                i + 1,
                pair[1].timestamp
            )));
        }
        if pair[1].timestamp < pair[0].timestamp {
            return Err(StriderError::Data(format!(
                "Non-monotonic timestamps at row {}: {} after {}",
                i + 1,
                pair[1].timestamp,
                pair[0].timestamp
            )));
        }
    }
    Ok(())
}

/// Highest high over the half-open window `bars[start..end]`.
pub fn highest_high(bars: &[Bar], start: usize, end: usize) -> Option<f64> {
    if start >= end || end > bars.len() {
        return None;
    }
    Some(
        bars[start..end]
            .iter()
            .map(|b| b.high)
            .fold(f64::NEG_INFINITY, f64::max),
    )
}

/// Lowest low over the half-open window `bars[start..end]`.
pub fn lowest_low(bars: &[Bar], start: usize, end: usize) -> Option<f64> {
    if start >= end || end > bars.len() {
        return None;
    }
    Some(
        bars[start..end]
            .iter()
            .map(|b| b.low)
            .fold(f64::INFINITY, f64::min),
    )
}

/// Calculate the Average True Range over the trailing `period` bars.
pub fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    if bars.len() < period + 1 || period == 0 {
        return None;
    }

    let true_ranges: Vec<f64> = bars
        .windows(2)
        .map(|w| {
            let prev = &w[0];
            let curr = &w[1];
            let hl = curr.range();
            let hc = (curr.high - prev.close).abs();
            let lc = (curr.low - prev.close).abs();
            hl.max(hc).max(lc)
        })
        .collect();

    if true_ranges.len() < period {
        return None;
    }

    let sum: f64 = true_ranges[true_ranges.len() - period..].iter().sum();
    Some(sum / period as f64)
}

/// Trend strength over the trailing `period` bars: net close-to-close
/// movement divided by the summed path length, in [0, 1]. A straight
/// directional move scores 1.0; pure chop scores near 0.
pub fn trend_strength(bars: &[Bar], period: usize) -> Option<f64> {
    if bars.len() < period + 1 || period == 0 {
        return None;
    }

    let window = &bars[bars.len() - period - 1..];
    let net = (window[window.len() - 1].close - window[0].close).abs();
    let path: f64 = window.windows(2).map(|w| (w[1].close - w[0].close).abs()).sum();

    if path <= 0.0 {
        return Some(0.0);
    }
    Some(net / path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Bar::new(
                    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                        + chrono::Duration::hours(i as i64),
                    c,
                    c + 0.0005,
                    c - 0.0005,
                    c,
                    100.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_load_csv_strict() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "time,open,high,low,close,volume").unwrap();
        writeln!(file, "2024-01-01 00:00:00,1.1000,1.1010,1.0990,1.1005,120").unwrap();
        writeln!(file, "2024-01-01 01:00:00,1.1005,1.1020,1.1000,1.1015,98").unwrap();

        let bars = load_csv(file.path(), &DataConfig::default()).unwrap();
        assert_eq!(bars.len(), 2);
        assert!((bars[0].close - 1.1005).abs() < 1e-9);
    }

    #[test]
    fn test_load_csv_rejects_non_monotonic() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "time,open,high,low,close,volume").unwrap();
        writeln!(file, "2024-01-01 01:00:00,1.1,1.2,1.0,1.1,1").unwrap();
        writeln!(file, "2024-01-01 00:00:00,1.1,1.2,1.0,1.1,1").unwrap();

        let err = load_csv(file.path(), &DataConfig::default()).unwrap_err();
        assert!(matches!(err, StriderError::Data(_)));
    }

    #[test]
    fn test_load_csv_rejects_duplicates() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "time,open,high,low,close,volume").unwrap();
        writeln!(file, "2024-01-01 00:00:00,1.1,1.2,1.0,1.1,1").unwrap();
        writeln!(file, "2024-01-01 00:00:00,1.1,1.2,1.0,1.1,1").unwrap();

        let err = load_csv(file.path(), &DataConfig::default()).unwrap_err();
        assert!(matches!(err, StriderError::Data(_)));
    }

    #[test]
    fn test_load_csv_lenient_dedups() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "time,open,high,low,close,volume").unwrap();
        writeln!(file, "2024-01-01 01:00:00,1.1,1.2,1.0,1.1,1").unwrap();
        writeln!(file, "2024-01-01 00:00:00,1.1,1.2,1.0,1.1,1").unwrap();
        writeln!(file, "2024-01-01 00:00:00,1.1,1.2,1.0,1.1,1").unwrap();

        let config = DataConfig {
            skip_invalid: true,
            ..Default::default()
        };
        let bars = load_csv(file.path(), &config).unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp < bars[1].timestamp);
    }

    #[test]
    fn test_load_csv_tab_delimited() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "time\topen\thigh\tlow\tclose\tvolume").unwrap();
        writeln!(file, "2024-01-01 00:00:00\t1.1\t1.2\t1.0\t1.1\t1").unwrap();

        let bars = load_csv(file.path(), &DataConfig::default()).unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn test_parse_mt_datetime() {
        let dt = parse_datetime("2024.03.15 14:30", None).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap());
    }

    #[test]
    fn test_window_extrema() {
        let bars = make_bars(&[1.10, 1.12, 1.11, 1.15, 1.09]);
        assert!((highest_high(&bars, 0, 4).unwrap() - 1.1505).abs() < 1e-9);
        assert!((lowest_low(&bars, 0, 4).unwrap() - 1.0995).abs() < 1e-9);
        assert!(highest_high(&bars, 4, 4).is_none());
        assert!(highest_high(&bars, 0, 6).is_none());
    }

    #[test]
    fn test_atr_insufficient_history() {
        let bars = make_bars(&[1.10, 1.11]);
        assert!(atr(&bars, 14).is_none());
        assert!(atr(&bars, 0).is_none());
    }

    #[test]
    fn test_atr_constant_range() {
        // Identical consecutive bars: TR collapses to the bar range
        let bars = make_bars(&[1.10; 10]);
        let value = atr(&bars, 5).unwrap();
        assert!((value - 0.0010).abs() < 1e-9);
    }

    #[test]
    fn test_trend_strength_directional() {
        let bars = make_bars(&[1.10, 1.11, 1.12, 1.13, 1.14, 1.15]);
        let ts = trend_strength(&bars, 5).unwrap();
        assert!((ts - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_strength_choppy() {
        let bars = make_bars(&[1.10, 1.11, 1.10, 1.11, 1.10, 1.11, 1.10]);
        let ts = trend_strength(&bars, 6).unwrap();
        assert!(ts < 0.2);
    }

    #[test]
    fn test_trend_strength_flat() {
        let bars = make_bars(&[1.10; 8]);
        assert_eq!(trend_strength(&bars, 5), Some(0.0));
    }
}

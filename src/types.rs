//! Core data types for the walk-forward engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV bar representing a single time period of market data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Validate that bar data is consistent and all prices are finite.
    pub fn validate(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
    }

    /// Calculate the bar range.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Trade direction (long or short).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// The opposite direction.
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// Direction emitted by the signal generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SignalDirection {
    Buy,
    Sell,
    #[default]
    None,
}

impl SignalDirection {
    /// Convert to a tradeable direction, if any.
    pub fn as_direction(&self) -> Option<Direction> {
        match self {
            SignalDirection::Buy => Some(Direction::Buy),
            SignalDirection::Sell => Some(Direction::Sell),
            SignalDirection::None => None,
        }
    }

    /// Whether this signal opposes an open position's direction.
    pub fn opposes(&self, direction: Direction) -> bool {
        self.as_direction() == Some(direction.opposite())
    }
}

/// A breakout signal derived from bars strictly before the reference bar.
/// The reference bar's close acts only as the breakout trigger price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: SignalDirection,
    /// Index of the bar on which the entry decision is made (at its close).
    pub reference_bar_index: usize,
    /// Suggested entry price (the reference bar's close).
    pub entry_price_hint: f64,
    /// Stop-loss distance in price units.
    pub stop_loss_distance: f64,
    /// Take-profit distance in price units.
    pub take_profit_distance: f64,
}

impl Signal {
    /// A no-trade signal at the given bar index.
    pub fn none(reference_bar_index: usize) -> Self {
        Self {
            direction: SignalDirection::None,
            reference_bar_index,
            entry_price_hint: 0.0,
            stop_loss_distance: 0.0,
            take_profit_distance: 0.0,
        }
    }

    /// Check if the signal is actionable.
    pub fn is_actionable(&self) -> bool {
        !matches!(self.direction, SignalDirection::None)
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Reversal,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop-loss"),
            ExitReason::TakeProfit => write!(f, "take-profit"),
            ExitReason::Reversal => write!(f, "reversal"),
            ExitReason::EndOfData => write!(f, "end-of-data"),
        }
    }
}

/// An open position. At most one exists at any time during a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub direction: Direction,
    pub open_time: DateTime<Utc>,
    pub open_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub volume: f64,
}

impl Position {
    pub fn new(
        direction: Direction,
        open_time: DateTime<Utc>,
        open_price: f64,
        stop_loss: f64,
        take_profit: f64,
        volume: f64,
    ) -> Self {
        Self {
            direction,
            open_time,
            open_price,
            stop_loss,
            take_profit,
            volume,
        }
    }

    /// Close into a ledger entry at the given price and time.
    pub fn close(
        &self,
        close_time: DateTime<Utc>,
        close_price: f64,
        reason: ExitReason,
        spec: &SymbolSpec,
    ) -> ClosedTrade {
        let signed = match self.direction {
            Direction::Buy => close_price - self.open_price,
            Direction::Sell => self.open_price - close_price,
        };
        let pnl_pips = spec.price_to_pips(signed);
        let pnl_currency = pnl_pips * spec.pip_value * self.volume;

        ClosedTrade {
            direction: self.direction,
            open_time: self.open_time,
            open_price: self.open_price,
            close_time,
            close_price,
            volume: self.volume,
            pnl_pips,
            pnl_currency,
            exit_reason: reason,
        }
    }
}

/// A completed round-trip trade in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub direction: Direction,
    pub open_time: DateTime<Utc>,
    pub open_price: f64,
    pub close_time: DateTime<Utc>,
    pub close_price: f64,
    pub volume: f64,
    pub pnl_pips: f64,
    pub pnl_currency: f64,
    pub exit_reason: ExitReason,
}

impl ClosedTrade {
    /// Check if this trade was profitable.
    pub fn is_winner(&self) -> bool {
        self.pnl_currency > 0.0
    }
}

/// Symbol metadata used for pip and lot arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub symbol: String,
    /// Number of decimal digits in quoted prices.
    pub digits: u32,
    /// Smallest price increment.
    pub point: f64,
    /// Pip size in price units (10 points for 3/5-digit symbols).
    pub pip: f64,
    /// Account-currency value of one pip per 1.0 lot.
    pub pip_value: f64,
    /// Typical spread in pips, charged on entry.
    pub spread_pips: f64,
    /// Broker volume step.
    pub lot_step: f64,
    pub min_lot: f64,
    pub max_lot: f64,
}

impl SymbolSpec {
    /// A 5-digit FX major (e.g. EURUSD): point 0.00001, pip 0.0001.
    pub fn forex(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            digits: 5,
            point: 0.00001,
            pip: 0.0001,
            pip_value: 10.0,
            spread_pips: 1.0,
            lot_step: 0.01,
            min_lot: 0.01,
            max_lot: 100.0,
        }
    }

    /// A 3-digit JPY cross (e.g. USDJPY): point 0.001, pip 0.01.
    pub fn forex_jpy(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            digits: 3,
            point: 0.001,
            pip: 0.01,
            pip_value: 9.0,
            spread_pips: 1.5,
            lot_step: 0.01,
            min_lot: 0.01,
            max_lot: 100.0,
        }
    }

    /// Override the typical spread.
    pub fn with_spread(mut self, spread_pips: f64) -> Self {
        self.spread_pips = spread_pips;
        self
    }

    /// Convert a price distance to pips.
    pub fn price_to_pips(&self, distance: f64) -> f64 {
        distance / self.pip
    }

    /// Convert a pip distance to price units.
    pub fn pips_to_price(&self, pips: f64) -> f64 {
        pips * self.pip
    }
}

//! Re-entry interval segmentation.
//!
//! Splits one expiry cycle's spot bars into ordered intervals, closing the
//! running interval and opening a new one whenever the spot has moved beyond
//! the configured trigger since the last re-entry. Each interval is one
//! hypothetical position's life; consecutive intervals share their boundary
//! day (exit and re-entry happen at the same close).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::SpotBar;
use crate::error::{Error, Result};

/// Which direction of spot movement re-triggers entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdjustmentMode {
    /// Never adjust: the whole cycle is one interval.
    None,
    /// Re-enter after a rise of at least the threshold.
    RiseOnly,
    /// Re-enter after a fall of at least the threshold.
    FallOnly,
    /// Re-enter after a move of at least the threshold in either direction.
    Either,
}

impl AdjustmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::RiseOnly => "rise-only",
            Self::FallOnly => "fall-only",
            Self::Either => "either",
        }
    }
}

/// Unit of the adjustment threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdUnit {
    /// Percent of the running entry price, compared after rounding the move
    /// to two decimals.
    PercentOfEntry,
    /// Absolute index points.
    Points,
}

impl ThresholdUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PercentOfEntry => "percent-of-entry",
            Self::Points => "points",
        }
    }
}

impl Default for ThresholdUnit {
    fn default() -> Self {
        Self::Points
    }
}

/// The re-entry rule for one strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdjustmentRule {
    pub mode: AdjustmentMode,
    #[serde(default)]
    pub threshold: Decimal,
    #[serde(default)]
    pub unit: ThresholdUnit,
}

impl AdjustmentRule {
    /// No adjustment: one interval per cycle.
    pub fn none() -> Self {
        Self {
            mode: AdjustmentMode::None,
            threshold: Decimal::ZERO,
            unit: ThresholdUnit::Points,
        }
    }

    pub fn new(mode: AdjustmentMode, threshold: Decimal, unit: ThresholdUnit) -> Self {
        Self {
            mode,
            threshold,
            unit,
        }
    }

    /// The signed move from the running entry price to a close, in the
    /// configured unit. Percent moves are rounded to two decimals before
    /// the threshold comparison.
    fn signed_move(&self, entry_price: Decimal, close: Decimal) -> Decimal {
        match self.unit {
            ThresholdUnit::Points => close - entry_price,
            ThresholdUnit::PercentOfEntry => {
                (Decimal::ONE_HUNDRED * (close - entry_price) / entry_price).round_dp(2)
            }
        }
    }

    /// Whether this close re-triggers entry against the running entry price.
    fn fires(&self, entry_price: Decimal, close: Decimal) -> bool {
        let mv = self.signed_move(entry_price, close);
        match self.mode {
            AdjustmentMode::None => false,
            AdjustmentMode::RiseOnly => mv >= self.threshold,
            AdjustmentMode::FallOnly => mv <= -self.threshold,
            AdjustmentMode::Either => mv.abs() >= self.threshold,
        }
    }
}

/// A contiguous sub-range of trading days: one hypothetical position's life.
///
/// The engine sets `expiry_override` on re-entry intervals of roll-adjusted
/// strategies; leg resolution then targets the override instead of the leg's
/// nominal expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub expiry_override: Option<NaiveDate>,
}

impl Interval {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from,
            to,
            expiry_override: None,
        }
    }
}

/// Splits a cycle's spot bars into re-entry intervals under one rule.
pub struct IntervalSegmenter {
    rule: AdjustmentRule,
}

impl IntervalSegmenter {
    pub fn new(rule: AdjustmentRule) -> Self {
        Self { rule }
    }

    /// Segment ordered bars into intervals.
    ///
    /// Invariants on the output: intervals are adjacent (`to[i]` equals
    /// `from[i+1]`), their union covers the full bar range, and no interval
    /// is zero-length. A trigger on the last bar would open a zero-length
    /// trailing interval; that one is dropped.
    pub fn segment(&self, bars: &[SpotBar]) -> Result<Vec<Interval>> {
        if bars.len() < 2 {
            return Err(Error::DegenerateRange { bars: bars.len() });
        }

        let first = bars[0];
        let last = bars[bars.len() - 1];

        if self.rule.mode == AdjustmentMode::None {
            return Ok(vec![Interval::new(first.date, last.date)]);
        }

        let mut intervals = Vec::new();
        let mut open_from = first.date;
        let mut entry_price = first.close;

        for bar in &bars[1..] {
            if self.rule.fires(entry_price, bar.close) {
                intervals.push(Interval::new(open_from, bar.date));
                open_from = bar.date;
                entry_price = bar.close;
            }
        }

        if open_from < last.date {
            intervals.push(Interval::new(open_from, last.date));
        }

        Ok(intervals)
    }
}

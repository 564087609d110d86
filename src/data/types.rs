//! Core data types for end-of-day backtesting.
//!
//! These types mirror the reference tables the engine consumes: the spot
//! history, the weekly/monthly expiry calendars, the regime windows for
//! directional strategies, and the per-day contract settlement book
//! (bhavcopy-style rows with close and turnover).

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    #[serde(alias = "CALL", alias = "call", alias = "C")]
    Ce,
    #[serde(alias = "PUT", alias = "put", alias = "P")]
    Pe,
}

impl OptionType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CE" | "C" | "CALL" => Some(Self::Ce),
            "PE" | "P" | "PUT" => Some(Self::Pe),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ce => "CE",
            Self::Pe => "PE",
        }
    }
}

/// Instrument segment of a contract row (index options vs index futures).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentKind {
    #[serde(rename = "OPTIDX", alias = "option")]
    OptIdx,
    #[serde(rename = "FUTIDX", alias = "future")]
    FutIdx,
}

impl InstrumentKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "OPTIDX" | "OPTION" => Some(Self::OptIdx),
            "FUTIDX" | "FUTURE" => Some(Self::FutIdx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OptIdx => "OPTIDX",
            Self::FutIdx => "FUTIDX",
        }
    }
}

/// Expiry cycle kind. Weekly and monthly calendars are tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleKind {
    Weekly,
    Monthly,
}

impl CycleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

/// One spot settlement bar: close price for one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotBar {
    pub date: NaiveDate,
    pub close: Decimal,
}

/// One row of an expiry calendar: the previous, current, and next expiry
/// around a point in the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryTriple {
    pub previous: NaiveDate,
    pub current: NaiveDate,
    pub next: NaiveDate,
}

/// An expiry calendar for one cycle kind, sorted ascending by `current`.
#[derive(Debug, Clone, Default)]
pub struct ExpirySchedule {
    rows: Vec<ExpiryTriple>,
}

impl ExpirySchedule {
    /// Build a schedule from rows, sorting by current expiry.
    pub fn new(mut rows: Vec<ExpiryTriple>) -> Self {
        rows.sort_by_key(|r| r.current);
        Self { rows }
    }

    pub fn rows(&self) -> &[ExpiryTriple] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Find the triple governing an anchor date: the row with
    /// `previous < anchor <= current`.
    pub fn triple_for(&self, anchor: NaiveDate) -> Option<&ExpiryTriple> {
        self.rows
            .iter()
            .find(|r| r.previous < anchor && anchor <= r.current)
    }

    /// Rows whose current expiry falls within `[start, end]`, in order.
    /// Each row is one tradable cycle.
    pub fn cycles_within(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Iterator<Item = &ExpiryTriple> {
        self.rows
            .iter()
            .filter(move |r| r.current >= start && r.current <= end)
    }
}

/// A date range during which a directional strategy may open trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl RegimeWindow {
    /// Whether a date falls inside this window (inclusive on both ends).
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Whether any window in a sorted list covers the date.
pub fn in_any_window(windows: &[RegimeWindow], date: NaiveDate) -> bool {
    windows.iter().any(|w| w.contains(date))
}

/// One settlement quote for one contract on one trading day.
///
/// For futures the strike is zero and `option_type` is `None`. Turnover is
/// traded value for the day; the resolver uses it purely as a
/// nonzero-liquidity screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractQuote {
    pub trade_date: NaiveDate,
    pub instrument: InstrumentKind,
    pub option_type: Option<OptionType>,
    pub expiry: NaiveDate,
    pub strike: Decimal,
    pub close: Decimal,
    pub turnover: Decimal,
}

impl ContractQuote {
    /// Whether the quote traded at all on this day.
    pub fn is_liquid(&self) -> bool {
        self.turnover > Decimal::ZERO
    }

    /// Whether this quote's expiry matches a target within the one-day
    /// tolerance that absorbs weekday/holiday shifts in the calendar.
    pub fn expiry_matches(&self, target: NaiveDate) -> bool {
        (self.expiry - target).num_days().abs() <= 1
    }

    /// Whether this quote expires in the same calendar month as the target.
    /// Futures are matched per month, not per exact date.
    pub fn expiry_in_month_of(&self, target: NaiveDate) -> bool {
        self.expiry.year() == target.year() && self.expiry.month() == target.month()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_option_type_parsing() {
        assert_eq!(OptionType::from_str("CE"), Some(OptionType::Ce));
        assert_eq!(OptionType::from_str("pe"), Some(OptionType::Pe));
        assert_eq!(OptionType::from_str("CALL"), Some(OptionType::Ce));
        assert_eq!(OptionType::from_str("P"), Some(OptionType::Pe));
        assert_eq!(OptionType::from_str("X"), None);
    }

    #[test]
    fn test_instrument_parsing() {
        assert_eq!(InstrumentKind::from_str("OPTIDX"), Some(InstrumentKind::OptIdx));
        assert_eq!(InstrumentKind::from_str("futidx"), Some(InstrumentKind::FutIdx));
        assert_eq!(InstrumentKind::from_str("EQ"), None);
    }

    #[test]
    fn test_schedule_triple_lookup() {
        let schedule = ExpirySchedule::new(vec![
            ExpiryTriple {
                previous: d(2024, 1, 4),
                current: d(2024, 1, 11),
                next: d(2024, 1, 18),
            },
            ExpiryTriple {
                previous: d(2024, 1, 11),
                current: d(2024, 1, 18),
                next: d(2024, 1, 25),
            },
        ]);

        // A date strictly after the previous and at-or-before the current.
        let t = schedule.triple_for(d(2024, 1, 15)).unwrap();
        assert_eq!(t.current, d(2024, 1, 18));

        // The expiry day itself belongs to the ending cycle.
        let t = schedule.triple_for(d(2024, 1, 11)).unwrap();
        assert_eq!(t.current, d(2024, 1, 11));

        assert!(schedule.triple_for(d(2024, 2, 1)).is_none());
    }

    #[test]
    fn test_cycles_within_range() {
        let schedule = ExpirySchedule::new(vec![
            ExpiryTriple {
                previous: d(2024, 1, 4),
                current: d(2024, 1, 11),
                next: d(2024, 1, 18),
            },
            ExpiryTriple {
                previous: d(2024, 1, 11),
                current: d(2024, 1, 18),
                next: d(2024, 1, 25),
            },
            ExpiryTriple {
                previous: d(2024, 1, 18),
                current: d(2024, 1, 25),
                next: d(2024, 2, 1),
            },
        ]);

        let cycles: Vec<_> = schedule.cycles_within(d(2024, 1, 12), d(2024, 1, 25)).collect();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].current, d(2024, 1, 18));
        assert_eq!(cycles[1].current, d(2024, 1, 25));
    }

    #[test]
    fn test_regime_window_contains() {
        let w = RegimeWindow {
            start: d(2024, 3, 1),
            end: d(2024, 3, 31),
        };
        assert!(w.contains(d(2024, 3, 1)));
        assert!(w.contains(d(2024, 3, 31)));
        assert!(!w.contains(d(2024, 4, 1)));

        let windows = vec![
            w,
            RegimeWindow {
                start: d(2024, 6, 1),
                end: d(2024, 6, 15),
            },
        ];
        assert!(in_any_window(&windows, d(2024, 6, 10)));
        assert!(!in_any_window(&windows, d(2024, 5, 10)));
    }

    #[test]
    fn test_expiry_tolerance() {
        let quote = ContractQuote {
            trade_date: d(2024, 1, 15),
            instrument: InstrumentKind::OptIdx,
            option_type: Some(OptionType::Ce),
            expiry: d(2024, 1, 25),
            strike: dec!(21000),
            close: dec!(145.20),
            turnover: dec!(1_250_000),
        };

        assert!(quote.expiry_matches(d(2024, 1, 25)));
        // Holiday-shifted calendar entries differ by one day either way.
        assert!(quote.expiry_matches(d(2024, 1, 24)));
        assert!(quote.expiry_matches(d(2024, 1, 26)));
        assert!(!quote.expiry_matches(d(2024, 1, 27)));
    }

    #[test]
    fn test_future_month_match() {
        let quote = ContractQuote {
            trade_date: d(2024, 1, 15),
            instrument: InstrumentKind::FutIdx,
            option_type: None,
            expiry: d(2024, 1, 25),
            strike: Decimal::ZERO,
            close: dec!(21480.50),
            turnover: dec!(9_000_000),
        };

        assert!(quote.expiry_in_month_of(d(2024, 1, 31)));
        assert!(!quote.expiry_in_month_of(d(2024, 2, 1)));
    }
}

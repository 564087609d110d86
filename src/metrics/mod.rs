//! Performance metrics module.
//!
//! Provides the aggregate statistics for one strategy run:
//! - Win/loss rates and side averages
//! - Maximum drawdown over the spot-anchored equity curve
//! - CAGR, expectancy, recovery factor, CAR/MDD
//! - Monthly P&L pivot

pub mod calculator;

pub use calculator::{EquityPoint, MonthlyPivot, PerformanceSummarizer, PivotRow, SummaryRow};

//! Backtesting engine for end-of-day option and future strategies.
//!
//! This module provides the full trade pipeline:
//! - Re-entry interval segmentation over a cycle's spot bars
//! - Leg resolution against per-day contract books
//! - Trade recording with signed, rounded P&L
//! - A per-run journal of abandoned trade attempts

pub mod engine;
pub mod journal;
pub mod recorder;
pub mod resolver;
pub mod segmenter;

pub use engine::{BacktestEngine, ReferenceTables, RunArtifacts};
pub use journal::{LogEntry, RunJournal};
pub use recorder::{LegFill, LegSide, TradeRecord};
pub use resolver::{LegResolver, LiquidityRule, SearchDirection};
pub use segmenter::{AdjustmentMode, AdjustmentRule, Interval, IntervalSegmenter, ThresholdUnit};

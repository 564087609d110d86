//! Report bundle writing.
//!
//! Persists one strategy run as a directory of plain CSV files: trades,
//! journal, summary, and the monthly pivot.

pub mod writer;

pub use writer::ReportWriter;

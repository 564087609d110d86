//! Error types for the backtesting engine.
//!
//! Failures split into two families: recoverable ones (a single trade or
//! cycle is skipped and journaled, the run continues) and fatal ones (the
//! configuration or its reference data is unusable, the run aborts).

use std::path::PathBuf;

use thiserror::Error;

use crate::data::DateParseError;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the backtesting engine.
#[derive(Error, Debug)]
pub enum Error {
    /// A per-day contract file or reference table file is absent.
    #[error("Missing input file: {}", path.display())]
    MissingInputFile { path: PathBuf },

    /// The expiry/strike/liquidity filters left no tradable contract.
    #[error("No eligible contract: {target}")]
    NoEligibleContract { target: String },

    /// A cycle produced fewer than two spot bars; nothing to trade.
    #[error("Degenerate range: {bars} bar(s), need at least 2")]
    DegenerateRange { bars: usize },

    /// A required reference table is absent or empty, or the configuration
    /// itself is invalid. Aborts the whole run.
    #[error("Fatal configuration error: {message}")]
    ConfigurationFatal { message: String },

    /// Unparseable date in a reference table.
    #[error(transparent)]
    DateParse(#[from] DateParseError),

    /// Malformed row in a reference table.
    #[error("Invalid data in {}: {message}", path.display())]
    InvalidData { path: PathBuf, message: String },

    /// CSV decode error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a fatal configuration error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::ConfigurationFatal {
            message: message.into(),
        }
    }

    /// Create a no-eligible-contract error with the concrete target.
    pub fn no_contract(target: impl Into<String>) -> Self {
        Self::NoEligibleContract {
            target: target.into(),
        }
    }

    /// Whether the run may continue after journaling this error.
    ///
    /// Missing per-day files, empty contract matches, and degenerate cycles
    /// skip only the affected trade or cycle. Everything else halts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MissingInputFile { .. }
                | Self::NoEligibleContract { .. }
                | Self::DegenerateRange { .. }
        )
    }
}

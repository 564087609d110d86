//! Reference-table loaders.
//!
//! Loads the four tables the engine consumes from CSV files under a base
//! directory:
//! - `spot.csv`: spot settlement history (`symbol,date,close`)
//! - `weekly_expiries.csv` / `monthly_expiries.csv`: expiry calendars
//!   (`previous,current,next`)
//! - `regime_windows.csv`: directional-entry windows (`start,end`)
//! - `books/<YYYY-MM-DD>.csv`: per-day contract settlement books
//!   (`instrument,symbol,option_type,expiry,strike,close,turnover`)
//!
//! Reference tables are loaded once per run. Contract books are loaded
//! lazily as the backtest touches each trading day and cached afterwards;
//! an absent book file is a recoverable per-trade failure, not a fatal one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::dates::parse_date;
use super::types::{
    ContractQuote, CycleKind, ExpirySchedule, ExpiryTriple, InstrumentKind, OptionType,
    RegimeWindow, SpotBar,
};

fn default_spot_file() -> String {
    "spot.csv".to_string()
}

fn default_weekly_file() -> String {
    "weekly_expiries.csv".to_string()
}

fn default_monthly_file() -> String {
    "monthly_expiries.csv".to_string()
}

fn default_regime_file() -> String {
    "regime_windows.csv".to_string()
}

fn default_books_dir() -> String {
    "books".to_string()
}

/// Location of the reference tables relative to a base directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Base data directory.
    pub dir: PathBuf,
    #[serde(default = "default_spot_file")]
    pub spot_file: String,
    #[serde(default = "default_weekly_file")]
    pub weekly_file: String,
    #[serde(default = "default_monthly_file")]
    pub monthly_file: String,
    #[serde(default = "default_regime_file")]
    pub regime_file: String,
    #[serde(default = "default_books_dir")]
    pub books_dir: String,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::new("data")
    }
}

impl DataPaths {
    /// Conventional layout under a base directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            spot_file: default_spot_file(),
            weekly_file: default_weekly_file(),
            monthly_file: default_monthly_file(),
            regime_file: default_regime_file(),
            books_dir: default_books_dir(),
        }
    }

    pub fn spot_path(&self) -> PathBuf {
        self.dir.join(&self.spot_file)
    }

    pub fn schedule_path(&self, cycle: CycleKind) -> PathBuf {
        match cycle {
            CycleKind::Weekly => self.dir.join(&self.weekly_file),
            CycleKind::Monthly => self.dir.join(&self.monthly_file),
        }
    }

    pub fn regime_path(&self) -> PathBuf {
        self.dir.join(&self.regime_file)
    }

    pub fn books_path(&self) -> PathBuf {
        self.dir.join(&self.books_dir)
    }
}

/// CSV loader for the run's reference tables.
pub struct DataLoader {
    paths: DataPaths,
}

#[derive(Debug, Deserialize)]
struct SpotRow {
    symbol: String,
    date: String,
    close: Decimal,
}

#[derive(Debug, Deserialize)]
struct ExpiryRow {
    previous: String,
    current: String,
    next: String,
}

#[derive(Debug, Deserialize)]
struct RegimeRow {
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
struct BookRow {
    instrument: String,
    symbol: String,
    option_type: String,
    expiry: String,
    strike: Option<Decimal>,
    close: Decimal,
    turnover: Decimal,
}

impl DataLoader {
    pub fn new(paths: DataPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    /// Load the spot history for one symbol, sorted ascending by date.
    pub fn load_spot_history(&self, symbol: &str) -> Result<Vec<SpotBar>> {
        let path = self.paths.spot_path();
        let mut reader = open_csv(&path)?;

        let mut bars = Vec::new();
        for row in reader.deserialize::<SpotRow>() {
            let row = row?;
            if !row.symbol.eq_ignore_ascii_case(symbol) {
                continue;
            }
            bars.push(SpotBar {
                date: parse_date(&row.date)?,
                close: row.close,
            });
        }
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    /// Load one cycle's expiry calendar.
    pub fn load_expiry_schedule(&self, cycle: CycleKind) -> Result<ExpirySchedule> {
        let path = self.paths.schedule_path(cycle);
        let mut reader = open_csv(&path)?;

        let mut rows = Vec::new();
        for row in reader.deserialize::<ExpiryRow>() {
            let row = row?;
            rows.push(ExpiryTriple {
                previous: parse_date(&row.previous)?,
                current: parse_date(&row.current)?,
                next: parse_date(&row.next)?,
            });
        }
        Ok(ExpirySchedule::new(rows))
    }

    /// Load the regime windows, sorted by start date. An absent file is an
    /// empty list; whether that is fatal depends on the strategy.
    pub fn load_regime_windows(&self) -> Result<Vec<RegimeWindow>> {
        let path = self.paths.regime_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = open_csv(&path)?;

        let mut windows = Vec::new();
        for row in reader.deserialize::<RegimeRow>() {
            let row = row?;
            windows.push(RegimeWindow {
                start: parse_date(&row.start)?,
                end: parse_date(&row.end)?,
            });
        }
        windows.sort_by_key(|w| w.start);
        Ok(windows)
    }

    /// Build the lazy per-day contract book store for one symbol.
    pub fn contract_book(&self, symbol: &str) -> ContractBook {
        ContractBook::new(self.paths.books_path(), symbol)
    }
}

fn open_csv(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    if !path.exists() {
        return Err(Error::MissingInputFile {
            path: path.to_path_buf(),
        });
    }
    Ok(csv::Reader::from_path(path)?)
}

/// Per-day contract settlement books, loaded lazily and cached.
///
/// Rows for other symbols or non-index segments are dropped at load. The
/// two-step `ensure_loaded` / `day` split lets a caller hold the entry and
/// exit books of one trade at the same time.
#[derive(Debug)]
pub struct ContractBook {
    dir: PathBuf,
    symbol: String,
    cache: HashMap<NaiveDate, Vec<ContractQuote>>,
    memory_only: bool,
}

impl ContractBook {
    pub fn new(dir: impl Into<PathBuf>, symbol: &str) -> Self {
        Self {
            dir: dir.into(),
            symbol: symbol.to_string(),
            cache: HashMap::new(),
            memory_only: false,
        }
    }

    /// A book backed purely by pre-built days; absent days report as
    /// missing input. Used by tests and in-memory runs.
    pub fn in_memory(symbol: &str, days: HashMap<NaiveDate, Vec<ContractQuote>>) -> Self {
        Self {
            dir: PathBuf::from("<memory>"),
            symbol: symbol.to_string(),
            cache: days,
            memory_only: true,
        }
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.csv", date))
    }

    /// Make sure the book for a date is cached, reading its file on first
    /// touch. An absent file is `MissingInputFile` (recoverable).
    pub fn ensure_loaded(&mut self, date: NaiveDate) -> Result<()> {
        if self.cache.contains_key(&date) {
            return Ok(());
        }
        if self.memory_only {
            return Err(Error::MissingInputFile {
                path: self.path_for(date),
            });
        }

        let path = self.path_for(date);
        let mut reader = open_csv(&path)?;

        let mut quotes = Vec::new();
        for row in reader.deserialize::<BookRow>() {
            let row = row?;
            if !row.symbol.eq_ignore_ascii_case(&self.symbol) {
                continue;
            }
            let Some(instrument) = InstrumentKind::from_str(&row.instrument) else {
                // Other segments (stock options, bonds) share the book file.
                continue;
            };
            let option_type = match instrument {
                InstrumentKind::OptIdx => {
                    Some(OptionType::from_str(&row.option_type).ok_or_else(|| {
                        Error::InvalidData {
                            path: path.clone(),
                            message: format!("bad option type {:?}", row.option_type),
                        }
                    })?)
                }
                InstrumentKind::FutIdx => None,
            };
            quotes.push(ContractQuote {
                trade_date: date,
                instrument,
                option_type,
                expiry: parse_date(&row.expiry)?,
                strike: row.strike.unwrap_or(Decimal::ZERO),
                close: row.close,
                turnover: row.turnover,
            });
        }

        self.cache.insert(date, quotes);
        Ok(())
    }

    /// The cached book for a date. Call `ensure_loaded` first.
    pub fn day(&self, date: NaiveDate) -> Option<&[ContractQuote]> {
        self.cache.get(&date).map(|v| v.as_slice())
    }

    /// Number of days currently cached.
    pub fn cached_days(&self) -> usize {
        self.cache.len()
    }
}

//! Tolerant date parsing for reference tables.
//!
//! Source tables arrive with mixed date conventions (ISO, `25-Jan-2024`,
//! `25/01/2024` from older exports). Every loader funnels through the one
//! parser here so a new format is added in exactly one place.

use chrono::NaiveDate;
use thiserror::Error;

/// Formats tried in order.
const FORMATS: &[&str] = &["%Y-%m-%d", "%d-%b-%Y", "%d/%m/%Y"];

/// A date string that matched none of the accepted formats.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unparseable date: {input:?} (accepted: YYYY-MM-DD, DD-Mon-YYYY, DD/MM/YYYY)")]
pub struct DateParseError {
    pub input: String,
}

/// Parse a date in any accepted format.
pub fn parse_date(s: &str) -> Result<NaiveDate, DateParseError> {
    let trimmed = s.trim();
    for fmt in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(date);
        }
    }
    Err(DateParseError {
        input: s.to_string(),
    })
}

//! Contract resolution against one day's book.
//!
//! Maps a leg's target (instrument, option type, expiry, strike rule) to an
//! actual quoted contract. Entry legs are screened for liquidity before the
//! strike search; exit re-pricing looks the already-held contract up again
//! and is exempt from screening.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::{ContractQuote, InstrumentKind, OptionType};
use crate::error::{Error, Result};

/// Strike search direction relative to the target strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchDirection {
    /// Lowest quoted strike at or above the target.
    AtOrAbove,
    /// Highest quoted strike at or below the target.
    AtOrBelow,
    /// The target strike itself, or nothing.
    Exact,
}

impl SearchDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AtOrAbove => "at-or-above",
            Self::AtOrBelow => "at-or-below",
            Self::Exact => "exact",
        }
    }
}

/// Whether a search screens candidates for liquidity.
///
/// Entries screen; exits re-price a contract already held, so an illiquid
/// print is still the only truth available and passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiquidityRule {
    Screened { round_ladder: bool },
    Exempt,
}

/// Resolves legs against the quotes of a single trading day.
pub struct LegResolver<'a> {
    date: NaiveDate,
    quotes: &'a [ContractQuote],
}

impl<'a> LegResolver<'a> {
    pub fn new(date: NaiveDate, quotes: &'a [ContractQuote]) -> Self {
        Self { date, quotes }
    }

    /// Find the option contract for a target expiry and strike.
    ///
    /// Expiry matching tolerates one calendar day of drift either side of
    /// the target. Ties on strike break toward the earlier expiry, so the
    /// pick is stable across input orderings.
    pub fn resolve_option(
        &self,
        option_type: OptionType,
        expiry: NaiveDate,
        target_strike: Decimal,
        direction: SearchDirection,
        liquidity: LiquidityRule,
    ) -> Result<&'a ContractQuote> {
        let mut candidates: Vec<&ContractQuote> = self
            .quotes
            .iter()
            .filter(|q| {
                q.instrument == InstrumentKind::OptIdx
                    && q.option_type == Some(option_type)
                    && q.expiry_matches(expiry)
                    && self.passes_screen(q, liquidity)
            })
            .collect();

        match direction {
            SearchDirection::AtOrAbove => {
                candidates.retain(|q| q.strike >= target_strike);
                candidates.sort_by(|a, b| a.strike.cmp(&b.strike).then(a.expiry.cmp(&b.expiry)));
            }
            SearchDirection::AtOrBelow => {
                candidates.retain(|q| q.strike <= target_strike);
                candidates.sort_by(|a, b| b.strike.cmp(&a.strike).then(a.expiry.cmp(&b.expiry)));
            }
            SearchDirection::Exact => {
                candidates.retain(|q| q.strike == target_strike);
                candidates.sort_by(|a, b| a.expiry.cmp(&b.expiry));
            }
        }

        candidates.first().copied().ok_or_else(|| {
            Error::no_contract(format!(
                "{} {} expiring {} strike {} {} on {}",
                InstrumentKind::OptIdx.as_str(),
                option_type.as_str(),
                expiry,
                target_strike,
                direction.as_str(),
                self.date,
            ))
        })
    }

    /// Find the future contract expiring in the target's month.
    ///
    /// Futures match on expiry month and year only; within the month the
    /// earliest expiry wins.
    pub fn resolve_future(
        &self,
        expiry: NaiveDate,
        liquidity: LiquidityRule,
    ) -> Result<&'a ContractQuote> {
        let mut candidates: Vec<&ContractQuote> = self
            .quotes
            .iter()
            .filter(|q| {
                q.instrument == InstrumentKind::FutIdx
                    && q.expiry_in_month_of(expiry)
                    && self.passes_screen(q, liquidity)
            })
            .collect();
        candidates.sort_by(|a, b| a.expiry.cmp(&b.expiry));

        candidates.first().copied().ok_or_else(|| {
            Error::no_contract(format!(
                "{} expiring in {} on {}",
                InstrumentKind::FutIdx.as_str(),
                expiry.format("%Y-%m"),
                self.date,
            ))
        })
    }

    fn passes_screen(&self, quote: &ContractQuote, liquidity: LiquidityRule) -> bool {
        match liquidity {
            LiquidityRule::Exempt => true,
            LiquidityRule::Screened { round_ladder } => {
                if !quote.is_liquid() {
                    return false;
                }
                if round_ladder && quote.instrument == InstrumentKind::OptIdx {
                    quote.strike % Decimal::ONE_HUNDRED == Decimal::ZERO
                } else {
                    true
                }
            }
        }
    }
}

//! Trade records and per-leg P&L.
//!
//! A trade exists only when every leg priced on both the entry and exit
//! day. Leg P&L is signed by side and rounded to two decimals before
//! summing, so the net is the exact sum of the already-rounded legs.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::ContractQuote;

/// Which way a leg trades at entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegSide {
    Buy,
    Sell,
}

impl LegSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

/// One resolved and priced leg of a trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegFill {
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub entry_price: Decimal,
    pub entry_turnover: Decimal,
    pub exit_price: Decimal,
    pub exit_turnover: Decimal,
    pub pnl: Decimal,
}

impl LegFill {
    /// Price a leg from its entry and exit quotes.
    ///
    /// Sold legs earn entry minus exit; bought legs earn exit minus entry.
    /// The result is rounded to two decimals, half to even.
    pub fn from_quotes(side: LegSide, entry: &ContractQuote, exit: &ContractQuote) -> Self {
        let pnl = match side {
            LegSide::Sell => entry.close - exit.close,
            LegSide::Buy => exit.close - entry.close,
        }
        .round_dp(2);

        Self {
            strike: entry.strike,
            expiry: entry.expiry,
            entry_price: entry.close,
            entry_turnover: entry.turnover,
            exit_price: exit.close,
            exit_turnover: exit.turnover,
            pnl,
        }
    }
}

/// One completed trade over one interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_spot: Decimal,
    pub exit_spot: Decimal,
    pub legs: Vec<LegFill>,
    pub net_pnl: Decimal,
}

impl TradeRecord {
    /// Assemble a trade from fully priced legs.
    ///
    /// Net P&L is the plain sum of the leg pnl values, which are already
    /// rounded; no further rounding happens here.
    pub fn new(
        entry_date: NaiveDate,
        exit_date: NaiveDate,
        entry_spot: Decimal,
        exit_spot: Decimal,
        legs: Vec<LegFill>,
    ) -> Self {
        let net_pnl = legs.iter().map(|leg| leg.pnl).sum();
        Self {
            entry_date,
            exit_date,
            entry_spot,
            exit_spot,
            legs,
            net_pnl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{InstrumentKind, OptionType};
    use rust_decimal_macros::dec;

    fn quote(close: Decimal) -> ContractQuote {
        ContractQuote {
            trade_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            instrument: InstrumentKind::OptIdx,
            option_type: Some(OptionType::Ce),
            expiry: NaiveDate::from_ymd_opt(2024, 1, 25).unwrap(),
            strike: dec!(20100),
            close,
            turnover: dec!(500),
        }
    }

    #[test]
    fn test_sold_leg_earns_premium_decay() {
        let fill = LegFill::from_quotes(LegSide::Sell, &quote(dec!(150)), &quote(dec!(90)));
        assert_eq!(fill.pnl, dec!(60));
        assert_eq!(fill.entry_price, dec!(150));
        assert_eq!(fill.exit_price, dec!(90));
    }

    #[test]
    fn test_bought_leg_flips_the_sign() {
        let fill = LegFill::from_quotes(LegSide::Buy, &quote(dec!(150)), &quote(dec!(90)));
        assert_eq!(fill.pnl, dec!(-60));
    }

    #[test]
    fn test_leg_pnl_rounds_half_to_even() {
        // 150.125 - 150.00 = 0.125, which lands on 0.12 (even), not 0.13.
        let fill = LegFill::from_quotes(LegSide::Sell, &quote(dec!(150.125)), &quote(dec!(150)));
        assert_eq!(fill.pnl, dec!(0.12));

        let flipped = LegFill::from_quotes(LegSide::Buy, &quote(dec!(150.125)), &quote(dec!(150)));
        assert_eq!(flipped.pnl, dec!(-0.12));
    }

    #[test]
    fn test_net_is_sum_of_rounded_legs() {
        // Each leg rounds 0.125 to 0.12 first; the net is 0.24, not the
        // 0.25 a round-after-summing would give.
        let leg = LegFill::from_quotes(LegSide::Sell, &quote(dec!(150.125)), &quote(dec!(150)));
        let trade = TradeRecord::new(
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 25).unwrap(),
            dec!(20000),
            dec!(20150),
            vec![leg.clone(), leg],
        );
        assert_eq!(trade.net_pnl, dec!(0.24));
    }

    #[test]
    fn test_net_spans_mixed_sides() {
        let sold = LegFill::from_quotes(LegSide::Sell, &quote(dec!(150)), &quote(dec!(90)));
        let bought = LegFill::from_quotes(LegSide::Buy, &quote(dec!(40)), &quote(dec!(15)));
        let trade = TradeRecord::new(
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 25).unwrap(),
            dec!(20000),
            dec!(20150),
            vec![sold, bought],
        );
        // +60 on the short leg, -25 on the long hedge.
        assert_eq!(trade.net_pnl, dec!(35));
    }
}

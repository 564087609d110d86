//! Performance metrics calculator.
//!
//! Derives aggregate statistics, a spot-anchored equity curve, and a
//! month-by-year pivot from one strategy's ordered trade sequence.
//!
//! Metrics whose defining population is empty (for example the average
//! winner of a run with no winning trades) are `None`, never zero; zero is
//! a value these metrics can legitimately take.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::backtest::TradeRecord;

/// One point of the equity curve, dated at a trade's exit.
///
/// The curve is anchored in spot points: it starts at the first trade's
/// entry spot plus its P&L, not at zero, so drawdown percentages are
/// relative to index levels.
#[derive(Debug, Clone, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub cumulative: Decimal,
    pub peak: Decimal,
    pub drawdown_points: Decimal,
    pub drawdown_pct: Decimal,
}

/// Aggregate statistics for one completed trade sequence.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    // Population
    pub trades: usize,
    pub winners: usize,
    pub losers: usize,

    // P&L
    pub total_pnl: Decimal,
    pub win_pct: Option<f64>,
    pub lose_pct: Option<f64>,
    pub avg_win: Option<Decimal>,
    pub avg_loss: Option<Decimal>,

    // Risk
    pub max_drawdown_points: Decimal,
    pub max_drawdown_pct: Decimal,

    // Returns
    pub cagr_pct: f64,
    pub expectancy: Option<f64>,
    pub recovery_factor: Option<Decimal>,
    pub car_mdd: Option<f64>,
}

/// One pivot row: a year's P&L by calendar month.
#[derive(Debug, Clone, Serialize)]
pub struct PivotRow {
    pub year: i32,
    pub months: [Option<Decimal>; 12],
    pub total: Decimal,
}

/// Net P&L grouped by exit month and year, with totals both ways.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonthlyPivot {
    pub rows: Vec<PivotRow>,
    pub month_totals: [Option<Decimal>; 12],
    pub grand_total: Decimal,
}

/// Performance summarizer.
pub struct PerformanceSummarizer;

impl PerformanceSummarizer {
    /// The spot-anchored equity curve for an ordered trade sequence.
    pub fn equity_curve(trades: &[TradeRecord]) -> Vec<EquityPoint> {
        let mut points = Vec::with_capacity(trades.len());
        let mut cumulative = Decimal::ZERO;
        let mut peak = Decimal::ZERO;

        for (i, trade) in trades.iter().enumerate() {
            cumulative = if i == 0 {
                trade.entry_spot + trade.net_pnl
            } else {
                cumulative + trade.net_pnl
            };
            if i == 0 || cumulative > peak {
                peak = cumulative;
            }

            let drawdown_points = if cumulative < peak {
                cumulative - peak
            } else {
                Decimal::ZERO
            };
            let drawdown_pct = if drawdown_points.is_zero() || peak.is_zero() {
                Decimal::ZERO
            } else {
                Decimal::ONE_HUNDRED * drawdown_points / peak
            };

            points.push(EquityPoint {
                date: trade.exit_date,
                cumulative,
                peak,
                drawdown_points,
                drawdown_pct,
            });
        }

        points
    }

    /// All aggregate metrics for an ordered trade sequence.
    pub fn summarize(trades: &[TradeRecord]) -> SummaryRow {
        let total = trades.len();
        let total_pnl: Decimal = trades.iter().map(|t| t.net_pnl).sum();

        let winner_pnls: Vec<Decimal> = trades
            .iter()
            .map(|t| t.net_pnl)
            .filter(|p| *p > Decimal::ZERO)
            .collect();
        let loser_pnls: Vec<Decimal> = trades
            .iter()
            .map(|t| t.net_pnl)
            .filter(|p| *p < Decimal::ZERO)
            .collect();
        let winners = winner_pnls.len();
        let losers = loser_pnls.len();

        let win_pct = if winners > 0 {
            Some(100.0 * winners as f64 / total as f64)
        } else {
            None
        };
        let lose_pct = if losers > 0 {
            Some(100.0 * losers as f64 / total as f64)
        } else {
            None
        };
        let avg_win = if winners > 0 {
            Some(winner_pnls.iter().copied().sum::<Decimal>() / Decimal::from(winners as i64))
        } else {
            None
        };
        let avg_loss = if losers > 0 {
            Some(loser_pnls.iter().copied().sum::<Decimal>() / Decimal::from(losers as i64))
        } else {
            None
        };

        let curve = Self::equity_curve(trades);
        let max_drawdown_points = curve
            .iter()
            .map(|p| p.drawdown_points)
            .min()
            .unwrap_or(Decimal::ZERO);
        let max_drawdown_pct = curve
            .iter()
            .map(|p| p.drawdown_pct)
            .min()
            .unwrap_or(Decimal::ZERO);

        let cagr_pct = match (trades.first(), trades.last()) {
            (Some(first), Some(last)) => {
                Self::cagr_pct(first.entry_spot, total_pnl, first.entry_date, last.exit_date)
            }
            _ => 0.0,
        };

        let expectancy = Self::expectancy(total_pnl, win_pct, lose_pct, avg_win, avg_loss);

        let recovery_factor = if max_drawdown_points.is_zero() {
            None
        } else {
            Some(total_pnl / max_drawdown_points.abs())
        };

        let car_mdd = if max_drawdown_pct.is_zero() {
            None
        } else {
            let dd: f64 = max_drawdown_pct.abs().try_into().unwrap_or(0.0);
            if dd == 0.0 {
                None
            } else {
                Some(cagr_pct / dd)
            }
        };

        SummaryRow {
            trades: total,
            winners,
            losers,
            total_pnl,
            win_pct,
            lose_pct,
            avg_win,
            avg_loss,
            max_drawdown_points,
            max_drawdown_pct,
            cagr_pct,
            expectancy,
            recovery_factor,
            car_mdd,
        }
    }

    /// Net P&L pivoted by exit year and month.
    pub fn monthly_pivot(trades: &[TradeRecord]) -> MonthlyPivot {
        let mut by_year: BTreeMap<i32, [Option<Decimal>; 12]> = BTreeMap::new();
        for trade in trades {
            let months = by_year.entry(trade.exit_date.year()).or_insert([None; 12]);
            let cell = &mut months[trade.exit_date.month0() as usize];
            *cell = Some(cell.unwrap_or(Decimal::ZERO) + trade.net_pnl);
        }

        let mut month_totals = [None; 12];
        let mut grand_total = Decimal::ZERO;
        let rows = by_year
            .into_iter()
            .map(|(year, months)| {
                let total: Decimal = months.iter().flatten().copied().sum();
                for (m, value) in months.iter().enumerate() {
                    if let Some(value) = value {
                        month_totals[m] = Some(month_totals[m].unwrap_or(Decimal::ZERO) + *value);
                    }
                }
                grand_total += total;
                PivotRow {
                    year,
                    months,
                    total,
                }
            })
            .collect();

        MonthlyPivot {
            rows,
            month_totals,
            grand_total,
        }
    }

    /// Annualized growth of the first trade's entry spot by the summed P&L.
    ///
    /// Returns 0 when the elapsed time is not positive or when the growth
    /// base `1 + pnl/spot` is not positive; a fractional power of a
    /// non-positive base has no real value.
    fn cagr_pct(
        entry_spot: Decimal,
        total_pnl: Decimal,
        first_entry: NaiveDate,
        last_exit: NaiveDate,
    ) -> f64 {
        let years = (last_exit - first_entry).num_days() as f64 / 365.25;
        if years <= 0.0 {
            return 0.0;
        }
        let spot: f64 = entry_spot.try_into().unwrap_or(0.0);
        if spot <= 0.0 {
            return 0.0;
        }
        let pnl: f64 = total_pnl.try_into().unwrap_or(0.0);
        let base = 1.0 + pnl / spot;
        if base <= 0.0 {
            return 0.0;
        }
        100.0 * (base.powf(1.0 / years) - 1.0)
    }

    /// Expected value per unit risked, from side averages expressed as a
    /// percent of the total summed P&L. Undefined whenever either side is
    /// empty or the total is zero.
    fn expectancy(
        total_pnl: Decimal,
        win_pct: Option<f64>,
        lose_pct: Option<f64>,
        avg_win: Option<Decimal>,
        avg_loss: Option<Decimal>,
    ) -> Option<f64> {
        let (win_pct, lose_pct, avg_win, avg_loss) = match (win_pct, lose_pct, avg_win, avg_loss)
        {
            (Some(w), Some(l), Some(aw), Some(al)) => (w, l, aw, al),
            _ => return None,
        };
        if total_pnl.is_zero() {
            return None;
        }

        let avg_win_pct: f64 = (Decimal::ONE_HUNDRED * avg_win / total_pnl)
            .try_into()
            .unwrap_or(0.0);
        let avg_loss_pct: f64 = (Decimal::ONE_HUNDRED * avg_loss / total_pnl)
            .try_into()
            .unwrap_or(0.0);
        if avg_loss_pct == 0.0 {
            return None;
        }

        Some(((avg_win_pct / avg_loss_pct.abs()) * win_pct - lose_pct) / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn trade(entry: NaiveDate, exit: NaiveDate, entry_spot: Decimal, net: Decimal) -> TradeRecord {
        TradeRecord {
            entry_date: entry,
            exit_date: exit,
            entry_spot,
            exit_spot: entry_spot,
            legs: Vec::new(),
            net_pnl: net,
        }
    }

    fn weekly_trades(nets: &[Decimal]) -> Vec<TradeRecord> {
        let base = date(2024, 1, 4);
        nets.iter()
            .enumerate()
            .map(|(i, &net)| {
                let entry = base + chrono::Duration::days(7 * i as i64);
                trade(entry, entry + chrono::Duration::days(7), dec!(20000), net)
            })
            .collect()
    }

    #[test]
    fn test_equity_curve_is_spot_anchored() {
        let trades = weekly_trades(&[dec!(100), dec!(-201), dec!(51)]);
        let curve = PerformanceSummarizer::equity_curve(&trades);

        assert_eq!(curve[0].cumulative, dec!(20100));
        assert_eq!(curve[1].cumulative, dec!(19899));
        assert_eq!(curve[2].cumulative, dec!(19950));

        assert_eq!(curve[0].drawdown_points, dec!(0));
        assert_eq!(curve[1].peak, dec!(20100));
        assert_eq!(curve[1].drawdown_points, dec!(-201));
        // -201 on a peak of 20100 is exactly -1%.
        assert_eq!(curve[1].drawdown_pct, dec!(-1));
    }

    #[test]
    fn test_summary_on_mixed_population() {
        let trades = weekly_trades(&[dec!(100), dec!(100), dec!(-50), dec!(-50)]);
        let summary = PerformanceSummarizer::summarize(&trades);

        assert_eq!(summary.trades, 4);
        assert_eq!(summary.winners, 2);
        assert_eq!(summary.losers, 2);
        assert_eq!(summary.total_pnl, dec!(100));
        assert_eq!(summary.win_pct, Some(50.0));
        assert_eq!(summary.lose_pct, Some(50.0));
        assert_eq!(summary.avg_win, Some(dec!(100)));
        assert_eq!(summary.avg_loss, Some(dec!(-50)));

        // avg win is 100% of total, avg loss -50%; ((100/50)*50 - 50)/100.
        let expectancy = summary.expectancy.unwrap();
        assert!((expectancy - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_no_losers_leaves_loss_metrics_undefined() {
        let trades = weekly_trades(&[dec!(100), dec!(40)]);
        let summary = PerformanceSummarizer::summarize(&trades);

        assert_eq!(summary.lose_pct, None);
        assert_eq!(summary.avg_loss, None);
        assert_eq!(summary.expectancy, None);
        // A monotone rising curve has no drawdown to recover from.
        assert_eq!(summary.max_drawdown_points, dec!(0));
        assert_eq!(summary.recovery_factor, None);
        assert_eq!(summary.car_mdd, None);
    }

    #[test]
    fn test_no_winners_leaves_win_metrics_undefined() {
        let trades = weekly_trades(&[dec!(-100), dec!(-40)]);
        let summary = PerformanceSummarizer::summarize(&trades);

        assert_eq!(summary.win_pct, None);
        assert_eq!(summary.avg_win, None);
        assert_eq!(summary.expectancy, None);
        assert_eq!(summary.lose_pct, Some(100.0));
    }

    #[test]
    fn test_cagr_guard_on_non_positive_base() {
        // A 25000-point loss on a 20000 base: 1 + pnl/spot is negative.
        let cagr = PerformanceSummarizer::cagr_pct(
            dec!(20000),
            dec!(-25000),
            date(2023, 1, 1),
            date(2024, 1, 1),
        );
        assert_eq!(cagr, 0.0);

        let same_day =
            PerformanceSummarizer::cagr_pct(dec!(20000), dec!(500), date(2024, 1, 1), date(2024, 1, 1));
        assert_eq!(same_day, 0.0);
    }

    #[test]
    fn test_cagr_over_one_year() {
        // +10% over slightly under a year annualizes just above 10%.
        let cagr = PerformanceSummarizer::cagr_pct(
            dec!(20000),
            dec!(2000),
            date(2023, 1, 1),
            date(2024, 1, 1),
        );
        assert!(cagr > 9.9 && cagr < 10.2, "cagr = {}", cagr);
    }

    #[test]
    fn test_monthly_pivot_totals() {
        let trades = vec![
            trade(date(2024, 1, 4), date(2024, 1, 11), dec!(20000), dec!(10)),
            trade(date(2024, 1, 11), date(2024, 1, 18), dec!(20000), dec!(20)),
            trade(date(2024, 3, 7), date(2024, 3, 14), dec!(20000), dec!(30)),
            trade(date(2025, 1, 2), date(2025, 1, 9), dec!(20000), dec!(40)),
        ];
        let pivot = PerformanceSummarizer::monthly_pivot(&trades);

        assert_eq!(pivot.rows.len(), 2);
        assert_eq!(pivot.rows[0].year, 2024);
        assert_eq!(pivot.rows[0].months[0], Some(dec!(30)));
        assert_eq!(pivot.rows[0].months[2], Some(dec!(30)));
        assert_eq!(pivot.rows[0].months[1], None);
        assert_eq!(pivot.rows[0].total, dec!(60));
        assert_eq!(pivot.rows[1].total, dec!(40));

        assert_eq!(pivot.month_totals[0], Some(dec!(70)));
        assert_eq!(pivot.month_totals[2], Some(dec!(30)));
        assert_eq!(pivot.month_totals[5], None);
        assert_eq!(pivot.grand_total, dec!(100));
    }

    #[test]
    fn test_empty_sequence() {
        let summary = PerformanceSummarizer::summarize(&[]);
        assert_eq!(summary.trades, 0);
        assert_eq!(summary.total_pnl, dec!(0));
        assert_eq!(summary.win_pct, None);
        assert_eq!(summary.cagr_pct, 0.0);

        assert!(PerformanceSummarizer::equity_curve(&[]).is_empty());
        assert!(PerformanceSummarizer::monthly_pivot(&[]).rows.is_empty());
    }
}

//! Report bundle writer.
//!
//! One directory per strategy under the output root:
//! - `trades.csv`: one row per trade, leg fields flattened
//! - `journal.csv`: one row per abandoned trade attempt
//! - `summary.csv`: `metric,value` pairs
//! - `pivot.csv`: net P&L by year and calendar month
//!
//! Undefined metrics and empty pivot cells are written as empty fields,
//! never as zero; a zero in these files is a computed value.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::backtest::{LogEntry, RunArtifacts, TradeRecord};
use crate::error::Result;
use crate::metrics::{MonthlyPivot, SummaryRow};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn fmt_opt_date(value: Option<NaiveDate>) -> String {
    value.map(|d| d.to_string()).unwrap_or_default()
}

fn fmt_opt_dec(value: Option<Decimal>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn fmt_opt_f64(value: Option<f64>) -> String {
    value.map(|v| format!("{:.4}", v)).unwrap_or_default()
}

/// Writes one strategy's artifacts as a CSV bundle.
pub struct ReportWriter {
    out_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// The directory a strategy's bundle lands in.
    pub fn strategy_dir(&self, name: &str) -> PathBuf {
        self.out_dir.join(name)
    }

    /// Write the full bundle for one run, returning its directory.
    pub fn write_all(
        &self,
        artifacts: &RunArtifacts,
        summary: &SummaryRow,
        pivot: &MonthlyPivot,
    ) -> Result<PathBuf> {
        let dir = self.strategy_dir(&artifacts.strategy);
        fs::create_dir_all(&dir)?;

        self.write_trades(&dir.join("trades.csv"), &artifacts.trades)?;
        self.write_journal(&dir.join("journal.csv"), artifacts.journal.entries())?;
        self.write_summary(&dir.join("summary.csv"), summary)?;
        self.write_pivot(&dir.join("pivot.csv"), pivot)?;

        Ok(dir)
    }

    fn write_trades(&self, path: &Path, trades: &[TradeRecord]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(fs::File::create(path)?);

        // Leg count is fixed by the strategy's leg specs, so the first
        // trade determines the header.
        let leg_count = trades.first().map(|t| t.legs.len()).unwrap_or(0);
        let mut header = vec![
            "entry_date".to_string(),
            "exit_date".to_string(),
            "entry_spot".to_string(),
            "exit_spot".to_string(),
        ];
        for i in 1..=leg_count {
            header.push(format!("leg{}_strike", i));
            header.push(format!("leg{}_expiry", i));
            header.push(format!("leg{}_entry", i));
            header.push(format!("leg{}_entry_turnover", i));
            header.push(format!("leg{}_exit", i));
            header.push(format!("leg{}_exit_turnover", i));
            header.push(format!("leg{}_pnl", i));
        }
        header.push("net_pnl".to_string());
        writer.write_record(&header)?;

        for trade in trades {
            let mut row = vec![
                trade.entry_date.to_string(),
                trade.exit_date.to_string(),
                trade.entry_spot.to_string(),
                trade.exit_spot.to_string(),
            ];
            for leg in &trade.legs {
                row.push(leg.strike.to_string());
                row.push(leg.expiry.to_string());
                row.push(leg.entry_price.to_string());
                row.push(leg.entry_turnover.to_string());
                row.push(leg.exit_price.to_string());
                row.push(leg.exit_turnover.to_string());
                row.push(leg.pnl.to_string());
            }
            row.push(trade.net_pnl.to_string());
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(())
    }

    fn write_journal(&self, path: &Path, entries: &[LogEntry]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(fs::File::create(path)?);
        writer.write_record([
            "symbol",
            "reason",
            "call_expiry",
            "put_expiry",
            "future_expiry",
            "from",
            "to",
        ])?;

        for entry in entries {
            writer.write_record(&[
                entry.symbol.clone(),
                entry.reason.clone(),
                fmt_opt_date(entry.call_expiry),
                fmt_opt_date(entry.put_expiry),
                fmt_opt_date(entry.future_expiry),
                entry.from.to_string(),
                entry.to.to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }

    fn write_summary(&self, path: &Path, summary: &SummaryRow) -> Result<()> {
        let mut writer = csv::Writer::from_writer(fs::File::create(path)?);
        writer.write_record(["metric", "value"])?;

        let rows = [
            ("trades", summary.trades.to_string()),
            ("winners", summary.winners.to_string()),
            ("losers", summary.losers.to_string()),
            ("total_pnl", summary.total_pnl.to_string()),
            ("win_pct", fmt_opt_f64(summary.win_pct)),
            ("lose_pct", fmt_opt_f64(summary.lose_pct)),
            ("avg_win", fmt_opt_dec(summary.avg_win)),
            ("avg_loss", fmt_opt_dec(summary.avg_loss)),
            (
                "max_drawdown_points",
                summary.max_drawdown_points.to_string(),
            ),
            ("max_drawdown_pct", summary.max_drawdown_pct.to_string()),
            ("cagr_pct", format!("{:.4}", summary.cagr_pct)),
            ("expectancy", fmt_opt_f64(summary.expectancy)),
            ("recovery_factor", fmt_opt_dec(summary.recovery_factor)),
            ("car_mdd", fmt_opt_f64(summary.car_mdd)),
        ];
        for (metric, value) in rows {
            writer.write_record([metric.to_string(), value])?;
        }

        writer.flush()?;
        Ok(())
    }

    fn write_pivot(&self, path: &Path, pivot: &MonthlyPivot) -> Result<()> {
        let mut writer = csv::Writer::from_writer(fs::File::create(path)?);

        let mut header = vec!["year".to_string()];
        header.extend(MONTHS.iter().map(|m| m.to_string()));
        header.push("total".to_string());
        writer.write_record(&header)?;

        for row in &pivot.rows {
            let mut record = vec![row.year.to_string()];
            record.extend(row.months.iter().map(|cell| fmt_opt_dec(*cell)));
            record.push(row.total.to_string());
            writer.write_record(&record)?;
        }

        let mut totals = vec!["total".to_string()];
        totals.extend(pivot.month_totals.iter().map(|cell| fmt_opt_dec(*cell)));
        totals.push(pivot.grand_total.to_string());
        writer.write_record(&totals)?;

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{LegFill, RunJournal};
    use crate::metrics::PerformanceSummarizer;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn leg(pnl: Decimal) -> LegFill {
        LegFill {
            strike: dec!(20000),
            expiry: date(2024, 1, 11),
            entry_price: dec!(150),
            entry_turnover: dec!(1000),
            exit_price: dec!(90),
            exit_turnover: dec!(800),
            pnl,
        }
    }

    fn artifacts() -> RunArtifacts {
        let trades = vec![TradeRecord {
            entry_date: date(2024, 1, 4),
            exit_date: date(2024, 1, 11),
            entry_spot: dec!(20000),
            exit_spot: dec!(20040),
            legs: vec![leg(dec!(60)), leg(dec!(90))],
            net_pnl: dec!(150),
        }];

        let mut journal = RunJournal::new();
        let mut entry = LogEntry::new(
            "NIFTY",
            "No eligible contract: CE expiring 2024-01-11",
            date(2024, 1, 4),
            date(2024, 1, 11),
        );
        entry.call_expiry = Some(date(2024, 1, 11));
        journal.record(entry);

        RunArtifacts {
            strategy: "short-straddle".to_string(),
            trades,
            journal,
        }
    }

    #[test]
    fn test_bundle_layout_and_trades() {
        let out = tempfile::tempdir().unwrap();
        let artifacts = artifacts();
        let summary = PerformanceSummarizer::summarize(&artifacts.trades);
        let pivot = PerformanceSummarizer::monthly_pivot(&artifacts.trades);

        let dir = ReportWriter::new(out.path())
            .write_all(&artifacts, &summary, &pivot)
            .unwrap();
        assert_eq!(dir, out.path().join("short-straddle"));

        let trades = fs::read_to_string(dir.join("trades.csv")).unwrap();
        let mut lines = trades.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("entry_date,exit_date,entry_spot,exit_spot,leg1_strike"));
        assert!(header.contains("leg2_pnl"));
        assert!(header.ends_with("net_pnl"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("2024-01-04,2024-01-11,20000,20040"));
        assert!(row.ends_with("150"));
    }

    #[test]
    fn test_journal_row_carries_targets() {
        let out = tempfile::tempdir().unwrap();
        let artifacts = artifacts();
        let summary = PerformanceSummarizer::summarize(&artifacts.trades);
        let pivot = PerformanceSummarizer::monthly_pivot(&artifacts.trades);

        let dir = ReportWriter::new(out.path())
            .write_all(&artifacts, &summary, &pivot)
            .unwrap();

        let journal = fs::read_to_string(dir.join("journal.csv")).unwrap();
        let row = journal.lines().nth(1).unwrap();
        assert!(row.starts_with("NIFTY,"));
        // The put and future targets were never computed; the cells stay
        // empty rather than showing a stand-in date.
        assert!(row.contains("2024-01-11,,,2024-01-04,2024-01-11"));
    }

    #[test]
    fn test_summary_undefined_metrics_are_empty_cells() {
        let out = tempfile::tempdir().unwrap();
        let artifacts = artifacts();
        // A single winning trade: the loss-side metrics are undefined.
        let summary = PerformanceSummarizer::summarize(&artifacts.trades);
        let pivot = PerformanceSummarizer::monthly_pivot(&artifacts.trades);

        let dir = ReportWriter::new(out.path())
            .write_all(&artifacts, &summary, &pivot)
            .unwrap();

        let text = fs::read_to_string(dir.join("summary.csv")).unwrap();
        assert!(text.contains("trades,1\n"));
        assert!(text.contains("lose_pct,\n"));
        assert!(text.contains("avg_loss,\n"));
        assert!(text.contains("expectancy,\n"));
        assert!(text.contains("total_pnl,150\n"));
    }

    #[test]
    fn test_pivot_file_shape() {
        let out = tempfile::tempdir().unwrap();
        let artifacts = artifacts();
        let summary = PerformanceSummarizer::summarize(&artifacts.trades);
        let pivot = PerformanceSummarizer::monthly_pivot(&artifacts.trades);

        let dir = ReportWriter::new(out.path())
            .write_all(&artifacts, &summary, &pivot)
            .unwrap();

        let text = fs::read_to_string(dir.join("pivot.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "year,jan,feb,mar,apr,may,jun,jul,aug,sep,oct,nov,dec,total");
        assert!(lines[1].starts_with("2024,150,"));
        assert!(lines[1].ends_with(",150"));
        assert!(lines[2].starts_with("total,150,"));
        assert!(lines[2].ends_with(",150"));
    }
}

//! # Run a backtest batch
//! fno-backtest run --config config/default.toml --data data --out results
//!
//! # Show the parsed strategy table
//! fno-backtest inspect --config config/default.toml

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use fno_backtest::backtest::{AdjustmentMode, BacktestEngine};
use fno_backtest::config::{RunConfig, StrikeRule};
use fno_backtest::metrics::PerformanceSummarizer;
use fno_backtest::report::ReportWriter;

#[derive(Parser)]
#[command(name = "fno-backtest")]
#[command(about = "End-of-day index option and future strategy backtester")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured strategy and write its report bundle
    Run {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Data directory (overrides the config's data.dir)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Output directory for report bundles
        #[arg(short, long, default_value = "results")]
        out: PathBuf,
    },

    /// Parse a configuration file and print the strategy table
    Inspect {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fno_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, data, out } => cmd_run(&config, data, &out),
        Commands::Inspect { config } => cmd_inspect(&config),
    }
}

fn cmd_run(config_path: &Path, data: Option<PathBuf>, out: &Path) -> Result<()> {
    let mut config = RunConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(dir) = data {
        config.data.dir = dir;
    }

    let mut engine = BacktestEngine::from_config(&config).context("loading reference data")?;
    let writer = ReportWriter::new(out);

    for strategy in &config.strategies {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
                )?
                .progress_chars("=>-"),
        );
        pb.set_message(strategy.name.clone());

        let artifacts = engine
            .run_with_progress(strategy, |done, total| {
                pb.set_length(total as u64);
                pb.set_position(done as u64);
            })
            .with_context(|| format!("running strategy {}", strategy.name))?;
        pb.finish_and_clear();

        let summary = PerformanceSummarizer::summarize(&artifacts.trades);
        let pivot = PerformanceSummarizer::monthly_pivot(&artifacts.trades);
        let dir = writer
            .write_all(&artifacts, &summary, &pivot)
            .with_context(|| format!("writing report for {}", strategy.name))?;

        println!(
            "{}: {} trades, {} abandoned, total P&L {} -> {}",
            artifacts.strategy,
            summary.trades,
            artifacts.journal.len(),
            summary.total_pnl,
            dir.display()
        );
    }

    Ok(())
}

fn cmd_inspect(config_path: &Path) -> Result<()> {
    let config = RunConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    println!(
        "Symbol: {} (strike step {})",
        config.symbol, config.strike_step
    );
    println!("Range: {} to {}", config.start, config.end);
    println!("Data: {}", config.data.dir.display());

    for strategy in &config.strategies {
        println!();
        println!("{}", strategy.name);
        println!(
            "  cycle: {}, holding: {}",
            strategy.cycle.as_str(),
            strategy.holding.as_str()
        );
        if strategy.adjustment.mode == AdjustmentMode::None {
            println!("  adjustment: none");
        } else {
            println!(
                "  adjustment: {} at {} {}",
                strategy.adjustment.mode.as_str(),
                strategy.adjustment.threshold,
                strategy.adjustment.unit.as_str()
            );
        }

        let mut flags = Vec::new();
        if strategy.regime_gated {
            flags.push("regime-gated");
        }
        if strategy.round_ladder {
            flags.push("round-ladder");
        }
        if strategy.roll_adjusted_entries {
            flags.push("roll-adjusted-entries");
        }
        if !flags.is_empty() {
            println!("  flags: {}", flags.join(", "));
        }

        for (i, leg) in strategy.legs.iter().enumerate() {
            println!(
                "  leg {}: {} {} @ {} ({}, expiry {}/{})",
                i + 1,
                leg.side.as_str(),
                leg.instrument.as_str(),
                describe_strike(&leg.strike_rule),
                leg.search.as_str(),
                leg.expiry.schedule.as_str(),
                leg.expiry.which.as_str(),
            );
        }
    }

    Ok(())
}

fn describe_strike(rule: &StrikeRule) -> String {
    match rule {
        StrikeRule::Atm => "atm".to_string(),
        StrikeRule::AtmOffsetSteps { steps } => format!("atm{:+} steps", steps),
        StrikeRule::SpotOffsetPct { pct } => {
            if pct.is_sign_negative() {
                format!("spot{}%", pct)
            } else {
                format!("spot+{}%", pct)
            }
        }
    }
}

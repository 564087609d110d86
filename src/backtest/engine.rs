//! The backtest engine.
//!
//! Runs one strategy against the loaded reference data:
//! 1. Walk the strategy's expiry cycles inside the run's date range
//! 2. Segment each cycle's spot bars into re-entry intervals
//! 3. Resolve every leg on each interval's entry and exit day
//! 4. Record the trade, or journal why it could not happen
//!
//! Recoverable failures (missing book file, no eligible contract, too few
//! bars) skip the affected trade or cycle and keep going; only broken
//! configuration or broken input tables abort a run.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::{ExpirySource, ExpiryWhich, LegInstrument, LegSpec, RunConfig, StrategySpec};
use crate::data::{
    in_any_window, ContractBook, ContractQuote, CycleKind, DataLoader, ExpirySchedule,
    ExpiryTriple, RegimeWindow, SpotBar,
};
use crate::error::{Error, Result};

use super::journal::{LogEntry, RunJournal};
use super::recorder::{LegFill, TradeRecord};
use super::resolver::{LegResolver, LiquidityRule, SearchDirection};
use super::segmenter::{Interval, IntervalSegmenter};

/// The reference tables one run works from, loaded once and then immutable.
pub struct ReferenceTables {
    pub spot: Vec<SpotBar>,
    pub weekly: ExpirySchedule,
    pub monthly: ExpirySchedule,
    pub regime_windows: Vec<RegimeWindow>,
}

/// Everything one strategy run produces.
#[derive(Debug)]
pub struct RunArtifacts {
    pub strategy: String,
    pub trades: Vec<TradeRecord>,
    pub journal: RunJournal,
}

/// Runs strategies against one symbol's reference data.
///
/// The contract book cache is shared across strategies run on the same
/// engine, so a day's book is read from disk at most once per process.
#[derive(Debug)]
pub struct BacktestEngine {
    symbol: String,
    strike_step: Decimal,
    start: NaiveDate,
    end: NaiveDate,
    spot: Vec<SpotBar>,
    weekly: ExpirySchedule,
    monthly: ExpirySchedule,
    regime_windows: Vec<RegimeWindow>,
    book: ContractBook,
}

impl BacktestEngine {
    /// Build an engine from already-loaded tables, failing fast when a
    /// table a configured strategy depends on is empty.
    pub fn new(config: &RunConfig, tables: ReferenceTables, book: ContractBook) -> Result<Self> {
        if tables.spot.is_empty() {
            return Err(Error::fatal(format!(
                "no spot history for {}",
                config.symbol
            )));
        }
        if needs_cycle(&config.strategies, CycleKind::Weekly) && tables.weekly.is_empty() {
            return Err(Error::fatal("weekly expiry schedule is empty"));
        }
        if needs_cycle(&config.strategies, CycleKind::Monthly) && tables.monthly.is_empty() {
            return Err(Error::fatal("monthly expiry schedule is empty"));
        }
        if config.strategies.iter().any(|s| s.regime_gated) && tables.regime_windows.is_empty() {
            return Err(Error::fatal(
                "a strategy is regime-gated but no regime windows are loaded",
            ));
        }

        Ok(Self {
            symbol: config.symbol.clone(),
            strike_step: config.strike_step,
            start: config.start,
            end: config.end,
            spot: tables.spot,
            weekly: tables.weekly,
            monthly: tables.monthly,
            regime_windows: tables.regime_windows,
            book,
        })
    }

    /// Load all reference tables from the config's data directory and
    /// build an engine.
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        let loader = DataLoader::new(config.data.clone());

        let spot = loader.load_spot_history(&config.symbol)?;
        let weekly = load_schedule(
            &loader,
            CycleKind::Weekly,
            needs_cycle(&config.strategies, CycleKind::Weekly),
        )?;
        let monthly = load_schedule(
            &loader,
            CycleKind::Monthly,
            needs_cycle(&config.strategies, CycleKind::Monthly),
        )?;
        let regime_windows = if config.strategies.iter().any(|s| s.regime_gated) {
            loader.load_regime_windows()?
        } else {
            Vec::new()
        };
        let book = loader.contract_book(&config.symbol);

        Self::new(
            config,
            ReferenceTables {
                spot,
                weekly,
                monthly,
                regime_windows,
            },
            book,
        )
    }

    /// Run one strategy over the configured date range.
    pub fn run(&mut self, strategy: &StrategySpec) -> Result<RunArtifacts> {
        self.run_with_progress(strategy, |_, _| {})
    }

    /// Like [`run`](Self::run), reporting `(cycles done, cycles total)`
    /// after each cycle so a caller can drive a progress bar.
    pub fn run_with_progress(
        &mut self,
        strategy: &StrategySpec,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<RunArtifacts> {
        let cycles: Vec<ExpiryTriple> = self
            .schedule_for(strategy.cycle)
            .cycles_within(self.start, self.end)
            .copied()
            .collect();

        info!(
            "{}: {} {} cycles between {} and {}",
            strategy.name,
            cycles.len(),
            strategy.cycle.as_str(),
            self.start,
            self.end
        );

        let segmenter = IntervalSegmenter::new(strategy.adjustment);
        let mut trades = Vec::new();
        let mut journal = RunJournal::new();

        for (done, triple) in cycles.iter().enumerate() {
            self.run_cycle(strategy, triple, &segmenter, &mut trades, &mut journal)?;
            progress(done + 1, cycles.len());
        }

        info!(
            "{}: {} trades, {} abandoned attempts",
            strategy.name,
            trades.len(),
            journal.len()
        );

        Ok(RunArtifacts {
            strategy: strategy.name.clone(),
            trades,
            journal,
        })
    }

    fn schedule_for(&self, cycle: CycleKind) -> &ExpirySchedule {
        match cycle {
            CycleKind::Weekly => &self.weekly,
            CycleKind::Monthly => &self.monthly,
        }
    }

    /// One expiry cycle: segment, then attempt a trade per interval.
    /// Recoverable failures are journaled here; only fatal errors bubble.
    fn run_cycle(
        &mut self,
        strategy: &StrategySpec,
        triple: &ExpiryTriple,
        segmenter: &IntervalSegmenter,
        trades: &mut Vec<TradeRecord>,
        journal: &mut RunJournal,
    ) -> Result<()> {
        let offset = strategy.holding.offset_sessions();
        let segmented = self
            .cycle_bars(triple, offset)
            .map(|slice| slice.to_vec())
            .and_then(|bars| {
                let intervals = segmenter.segment(&bars)?;
                Ok((bars, intervals))
            });

        let (bars, mut intervals) = match segmented {
            Ok(pair) => pair,
            Err(e) if e.is_recoverable() => {
                warn!(
                    "{}: skipping cycle ending {}: {}",
                    strategy.name, triple.current, e
                );
                journal.record(LogEntry::new(
                    self.symbol.clone(),
                    e.to_string(),
                    triple.previous,
                    triple.current,
                ));
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if strategy.roll_adjusted_entries {
            for interval in intervals.iter_mut().skip(1) {
                interval.expiry_override = Some(triple.next);
            }
        }

        for interval in &intervals {
            if strategy.regime_gated && !in_any_window(&self.regime_windows, interval.from) {
                debug!(
                    "{}: {} outside regime windows, not entering",
                    strategy.name, interval.from
                );
                continue;
            }

            debug!(
                "{}: attempting {} -> {}",
                strategy.name, interval.from, interval.to
            );
            let mut log = LogEntry::new(
                self.symbol.clone(),
                String::new(),
                interval.from,
                interval.to,
            );
            match self.attempt_trade(strategy, triple, interval, &bars, &mut log) {
                Ok(trade) => trades.push(trade),
                Err(e) if e.is_recoverable() => {
                    warn!(
                        "{}: no trade {} -> {}: {}",
                        strategy.name, interval.from, interval.to, e
                    );
                    log.reason = e.to_string();
                    journal.record(log);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// The spot bars for a cycle: from the session at or before the
    /// previous expiry to the session at or before the current expiry,
    /// both shifted back by the holding rule's offset.
    fn cycle_bars(&self, triple: &ExpiryTriple, offset: usize) -> Result<&[SpotBar]> {
        let entry_anchor = self
            .position_at_or_before(triple.previous)
            .ok_or(Error::DegenerateRange { bars: 0 })?;
        let exit_anchor = self
            .position_at_or_before(triple.current)
            .ok_or(Error::DegenerateRange { bars: 0 })?;

        let entry_pos = entry_anchor
            .checked_sub(offset)
            .ok_or(Error::DegenerateRange { bars: 0 })?;
        let exit_pos = exit_anchor
            .checked_sub(offset)
            .ok_or(Error::DegenerateRange { bars: 0 })?;

        if exit_pos < entry_pos {
            return Err(Error::DegenerateRange { bars: 0 });
        }
        Ok(&self.spot[entry_pos..=exit_pos])
    }

    /// Index of the last spot bar dated at or before `date`.
    fn position_at_or_before(&self, date: NaiveDate) -> Option<usize> {
        let idx = self.spot.partition_point(|bar| bar.date <= date);
        idx.checked_sub(1)
    }

    /// Resolve and price every leg over one interval, all or nothing.
    ///
    /// Target expiries are recorded on the log entry as soon as they are
    /// known, so an abandoned attempt still names what it was looking for.
    fn attempt_trade(
        &mut self,
        strategy: &StrategySpec,
        triple: &ExpiryTriple,
        interval: &Interval,
        bars: &[SpotBar],
        log: &mut LogEntry,
    ) -> Result<TradeRecord> {
        let entry_spot = spot_close(bars, interval.from)?;
        let exit_spot = spot_close(bars, interval.to)?;

        let mut targets = Vec::with_capacity(strategy.legs.len());
        for leg in &strategy.legs {
            let expiry = match interval.expiry_override {
                Some(override_expiry) => override_expiry,
                None => self.nominal_expiry(leg, triple, interval.from)?,
            };
            match leg.instrument {
                LegInstrument::Call => log.call_expiry = Some(expiry),
                LegInstrument::Put => log.put_expiry = Some(expiry),
                LegInstrument::Future => log.future_expiry = Some(expiry),
            }
            targets.push(expiry);
        }

        self.book.ensure_loaded(interval.from)?;
        let entry_quotes: Vec<ContractQuote> = {
            let day = self.book.day(interval.from).unwrap_or(&[]);
            let resolver = LegResolver::new(interval.from, day);
            let screen = LiquidityRule::Screened {
                round_ladder: strategy.round_ladder,
            };
            let mut picked = Vec::with_capacity(strategy.legs.len());
            for (leg, &expiry) in strategy.legs.iter().zip(&targets) {
                let quote = match leg.instrument.option_type() {
                    Some(option_type) => {
                        let strike = leg.strike_rule.target(entry_spot, self.strike_step);
                        resolver.resolve_option(option_type, expiry, strike, leg.search, screen)?
                    }
                    None => resolver.resolve_future(expiry, screen)?,
                };
                picked.push(quote.clone());
            }
            picked
        };

        // Exit re-prices exactly what was entered; an open position must be
        // closable even if it has gone illiquid since.
        self.book.ensure_loaded(interval.to)?;
        let day = self.book.day(interval.to).unwrap_or(&[]);
        let resolver = LegResolver::new(interval.to, day);
        let mut legs = Vec::with_capacity(strategy.legs.len());
        for (leg, held) in strategy.legs.iter().zip(&entry_quotes) {
            let exit = match leg.instrument.option_type() {
                Some(option_type) => resolver.resolve_option(
                    option_type,
                    held.expiry,
                    held.strike,
                    SearchDirection::Exact,
                    LiquidityRule::Exempt,
                )?,
                None => resolver.resolve_future(held.expiry, LiquidityRule::Exempt)?,
            };
            legs.push(LegFill::from_quotes(leg.side, held, exit));
        }

        Ok(TradeRecord::new(
            interval.from,
            interval.to,
            entry_spot,
            exit_spot,
            legs,
        ))
    }

    /// A leg's nominal target expiry for an interval entered on `anchor`.
    fn nominal_expiry(
        &self,
        leg: &LegSpec,
        triple: &ExpiryTriple,
        anchor: NaiveDate,
    ) -> Result<NaiveDate> {
        let row = match leg.expiry.schedule {
            ExpirySource::Cycle => triple,
            ExpirySource::Weekly => self.weekly.triple_for(anchor).ok_or_else(|| {
                Error::no_contract(format!("no weekly expiry row covering {}", anchor))
            })?,
            ExpirySource::Monthly => self.monthly.triple_for(anchor).ok_or_else(|| {
                Error::no_contract(format!("no monthly expiry row covering {}", anchor))
            })?,
        };
        Ok(match leg.expiry.which {
            ExpiryWhich::Current => row.current,
            ExpiryWhich::Next => row.next,
        })
    }
}

fn needs_cycle(strategies: &[StrategySpec], kind: CycleKind) -> bool {
    strategies.iter().any(|s| {
        s.cycle == kind
            || s.legs.iter().any(|leg| match leg.expiry.schedule {
                ExpirySource::Cycle => s.cycle == kind,
                ExpirySource::Weekly => kind == CycleKind::Weekly,
                ExpirySource::Monthly => kind == CycleKind::Monthly,
            })
    })
}

/// Load one cycle's schedule; an absent file is only an error when some
/// strategy actually uses that cycle.
fn load_schedule(loader: &DataLoader, cycle: CycleKind, required: bool) -> Result<ExpirySchedule> {
    match loader.load_expiry_schedule(cycle) {
        Ok(schedule) => Ok(schedule),
        Err(Error::MissingInputFile { .. }) if !required => Ok(ExpirySchedule::new(Vec::new())),
        Err(e) => Err(e),
    }
}

fn spot_close(bars: &[SpotBar], date: NaiveDate) -> Result<Decimal> {
    bars.iter()
        .find(|bar| bar.date == date)
        .map(|bar| bar.close)
        .ok_or_else(|| Error::fatal(format!("interval boundary {} is not a cycle bar", date)))
}

//! Run and strategy configuration.
//!
//! A run is described by one TOML file: the symbol, its strike ladder step,
//! the date range, the data layout, and a list of strategies. A strategy is
//! data rather than code: cycle kind, holding rule, adjustment rule, leg
//! specs, and gating flags, all consumed by the one engine implementation.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::backtest::{AdjustmentMode, AdjustmentRule, LegSide, SearchDirection};
use crate::data::{CycleKind, DataPaths, OptionType};
use crate::error::{Error, Result};

/// What a leg trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegInstrument {
    Call,
    Put,
    Future,
}

impl LegInstrument {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
            Self::Future => "future",
        }
    }

    /// The option type this leg resolves as, if it is an option.
    pub fn option_type(&self) -> Option<OptionType> {
        match self {
            Self::Call => Some(OptionType::Ce),
            Self::Put => Some(OptionType::Pe),
            Self::Future => None,
        }
    }
}

/// How a leg's target strike derives from the entry-day spot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StrikeRule {
    /// Spot rounded to the nearest ladder step.
    Atm,
    /// ATM shifted by a whole number of ladder steps (negative for lower).
    AtmOffsetSteps { steps: i32 },
    /// Spot shifted by a percentage, then rounded to the ladder.
    SpotOffsetPct { pct: Decimal },
}

impl Default for StrikeRule {
    fn default() -> Self {
        Self::Atm
    }
}

/// Round a price to the nearest multiple of the ladder step, half up.
fn round_to_step(value: Decimal, step: Decimal) -> Decimal {
    (value / step).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero) * step
}

impl StrikeRule {
    /// The target strike for an entry-day spot on a given ladder.
    ///
    /// ATM rounds half up, so a spot exactly between two strikes targets
    /// the higher one; offsets apply after that rounding.
    pub fn target(&self, spot: Decimal, step: Decimal) -> Decimal {
        match *self {
            Self::Atm => round_to_step(spot, step),
            Self::AtmOffsetSteps { steps } => {
                round_to_step(spot, step) + step * Decimal::from(steps)
            }
            Self::SpotOffsetPct { pct } => {
                round_to_step(spot * (Decimal::ONE + pct / Decimal::ONE_HUNDRED), step)
            }
        }
    }
}

/// How long a position is held within its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoldingRule {
    /// Enter at the previous expiry, exit at the current one.
    #[serde(rename = "expiry-to-expiry")]
    ExpiryToExpiry,
    /// Anchor entry and exit one session before each expiry.
    #[serde(rename = "t-minus-1")]
    TMinus1,
    /// Anchor entry and exit two sessions before each expiry.
    #[serde(rename = "t-minus-2")]
    TMinus2,
}

impl Default for HoldingRule {
    fn default() -> Self {
        Self::ExpiryToExpiry
    }
}

impl HoldingRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExpiryToExpiry => "expiry-to-expiry",
            Self::TMinus1 => "t-minus-1",
            Self::TMinus2 => "t-minus-2",
        }
    }

    /// How many sessions before each expiry the cycle window is anchored.
    pub fn offset_sessions(&self) -> usize {
        match self {
            Self::ExpiryToExpiry => 0,
            Self::TMinus1 => 1,
            Self::TMinus2 => 2,
        }
    }
}

/// Which expiry calendar a leg targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpirySource {
    /// The strategy's own cycle calendar.
    Cycle,
    Weekly,
    Monthly,
}

impl Default for ExpirySource {
    fn default() -> Self {
        Self::Cycle
    }
}

impl ExpirySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cycle => "cycle",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

/// Which expiry of the chosen calendar a leg targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpiryWhich {
    Current,
    Next,
}

impl Default for ExpiryWhich {
    fn default() -> Self {
        Self::Current
    }
}

impl ExpiryWhich {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Next => "next",
        }
    }
}

/// A leg's expiry target: which calendar, and which of its expiries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryChoice {
    #[serde(default)]
    pub schedule: ExpirySource,
    #[serde(default)]
    pub which: ExpiryWhich,
}

/// One leg of a strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegSpec {
    pub instrument: LegInstrument,
    pub side: LegSide,
    #[serde(default)]
    pub strike_rule: StrikeRule,
    #[serde(default)]
    pub expiry: ExpiryChoice,
    pub search: SearchDirection,
}

/// One strategy: everything the engine needs to run it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySpec {
    pub name: String,
    pub cycle: CycleKind,
    #[serde(default)]
    pub holding: HoldingRule,
    #[serde(default = "AdjustmentRule::none")]
    pub adjustment: AdjustmentRule,
    pub legs: Vec<LegSpec>,
    /// Only open trades inside a regime window.
    #[serde(default)]
    pub regime_gated: bool,
    /// Restrict entry strikes to multiples of 100.
    #[serde(default)]
    pub round_ladder: bool,
    /// Re-entry intervals roll their legs to the cycle's next expiry.
    #[serde(default)]
    pub roll_adjusted_entries: bool,
}

impl StrategySpec {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::fatal("strategy name must not be empty"));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        {
            return Err(Error::fatal(format!(
                "strategy name {:?} is not filesystem-safe (allowed: alphanumeric, '-', '_')",
                self.name
            )));
        }
        if self.legs.is_empty() {
            return Err(Error::fatal(format!(
                "strategy {:?} has no legs",
                self.name
            )));
        }
        if self.adjustment.mode != AdjustmentMode::None
            && self.adjustment.threshold <= Decimal::ZERO
        {
            return Err(Error::fatal(format!(
                "strategy {:?}: adjustment mode {} needs a positive threshold",
                self.name,
                self.adjustment.mode.as_str()
            )));
        }
        Ok(())
    }
}

/// The full description of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub symbol: String,
    pub strike_step: Decimal,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default)]
    pub data: DataPaths,
    pub strategies: Vec<StrategySpec>,
}

impl RunConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::fatal(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| {
            Error::fatal(format!("cannot parse config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(Error::fatal("symbol must not be empty"));
        }
        if self.strike_step <= Decimal::ZERO {
            return Err(Error::fatal("strike_step must be positive"));
        }
        if self.start > self.end {
            return Err(Error::fatal(format!(
                "start {} is after end {}",
                self.start, self.end
            )));
        }
        if self.strategies.is_empty() {
            return Err(Error::fatal("no strategies configured"));
        }
        let mut names = HashSet::new();
        for strategy in &self.strategies {
            strategy.validate()?;
            if !names.insert(strategy.name.as_str()) {
                return Err(Error::fatal(format!(
                    "duplicate strategy name {:?}",
                    strategy.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
symbol = "NIFTY"
strike_step = 100
start = "2024-01-01"
end = "2024-03-28"

[data]
dir = "data"

[[strategies]]
name = "weekly-short-straddle"
cycle = "weekly"
holding = "expiry-to-expiry"

[strategies.adjustment]
mode = "either"
threshold = 200
unit = "points"

[[strategies.legs]]
instrument = "call"
side = "sell"
strike_rule = { kind = "atm" }
search = "at-or-above"

[[strategies.legs]]
instrument = "put"
side = "sell"
strike_rule = { kind = "atm" }
search = "at-or-below"
"#;

    fn sample() -> RunConfig {
        toml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_parses_sample_toml() {
        let config = sample();
        config.validate().unwrap();

        assert_eq!(config.symbol, "NIFTY");
        assert_eq!(config.strike_step, dec!(100));
        assert_eq!(config.data.dir, std::path::PathBuf::from("data"));

        let strategy = &config.strategies[0];
        assert_eq!(strategy.cycle, CycleKind::Weekly);
        assert_eq!(strategy.holding, HoldingRule::ExpiryToExpiry);
        assert_eq!(strategy.adjustment.mode, AdjustmentMode::Either);
        assert_eq!(strategy.adjustment.threshold, dec!(200));
        assert!(!strategy.regime_gated);
        assert!(!strategy.roll_adjusted_entries);

        assert_eq!(strategy.legs.len(), 2);
        assert_eq!(strategy.legs[0].instrument, LegInstrument::Call);
        assert_eq!(strategy.legs[0].side, LegSide::Sell);
        assert_eq!(strategy.legs[0].search, SearchDirection::AtOrAbove);
        assert_eq!(strategy.legs[1].search, SearchDirection::AtOrBelow);
        assert_eq!(strategy.legs[1].expiry.schedule, ExpirySource::Cycle);
        assert_eq!(strategy.legs[1].expiry.which, ExpiryWhich::Current);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.strategies.len(), 1);

        let err = RunConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_atm_rounds_half_up() {
        // 20050 sits exactly between 20000 and 20100; half-up takes the
        // higher strike where banker's rounding would take 20000.
        assert_eq!(StrikeRule::Atm.target(dec!(20050), dec!(100)), dec!(20100));
        assert_eq!(StrikeRule::Atm.target(dec!(20049), dec!(100)), dec!(20000));
        assert_eq!(StrikeRule::Atm.target(dec!(20051), dec!(100)), dec!(20100));
    }

    #[test]
    fn test_strike_offsets() {
        let step = dec!(100);
        assert_eq!(
            StrikeRule::AtmOffsetSteps { steps: 2 }.target(dec!(20020), step),
            dec!(20200)
        );
        assert_eq!(
            StrikeRule::AtmOffsetSteps { steps: -1 }.target(dec!(20020), step),
            dec!(19900)
        );
        assert_eq!(
            StrikeRule::SpotOffsetPct { pct: dec!(2) }.target(dec!(20000), step),
            dec!(20400)
        );
        assert_eq!(
            StrikeRule::SpotOffsetPct { pct: dec!(-2.5) }.target(dec!(20000), step),
            dec!(19500)
        );
    }

    #[test]
    fn test_validation_rejects_bad_configs() {
        let mut config = sample();
        config.strategies.push(config.strategies[0].clone());
        assert!(config.validate().unwrap_err().to_string().contains("duplicate"));

        let mut config = sample();
        config.strategies[0].legs.clear();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.strategies[0].adjustment.threshold = Decimal::ZERO;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.strategies[0].name = "weekly/straddle".to_string();
        assert!(config.validate().is_err());

        let mut config = sample();
        std::mem::swap(&mut config.start, &mut config.end);
        assert!(config.validate().is_err());

        let mut config = sample();
        config.strategies.clear();
        let err = config.validate().unwrap_err();
        assert!(!err.is_recoverable());
    }
}

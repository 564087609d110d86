pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod report;

// Re-export commonly used types
pub use backtest::{BacktestEngine, RunArtifacts, TradeRecord};
pub use config::{RunConfig, StrategySpec};
pub use data::{ContractBook, ContractQuote, DataLoader, OptionType, SpotBar};
pub use error::{Error, Result};
pub use metrics::{MonthlyPivot, PerformanceSummarizer, SummaryRow};
pub use report::ReportWriter;

pub mod dates;
pub mod loader;
pub mod types;

pub use dates::{parse_date, DateParseError};
pub use loader::{ContractBook, DataLoader, DataPaths};
pub use types::{
    in_any_window, ContractQuote, CycleKind, ExpirySchedule, ExpiryTriple, InstrumentKind,
    OptionType, RegimeWindow, SpotBar,
};

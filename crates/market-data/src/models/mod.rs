//! Data models for market data operations.

mod fundamentals;
mod history;
mod instrument;
mod quote;
mod types;

pub use fundamentals::Fundamentals;
pub use history::{HistoryRange, PricePoint};
pub use instrument::Instrument;
pub use quote::Quote;
pub use types::{Currency, SourceId};

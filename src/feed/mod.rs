pub mod gate;
pub mod poller;
pub mod quote;
pub mod rate;

pub use gate::{Direction, QuoteGate, RateGate, RateObservation, RateRecord, QuoteRecord};
pub use poller::{run_quote_poller, run_rate_poller};
pub use quote::{GoogleFinanceClient, QuoteFetch};
pub use rate::{RateFetch, TreasuryClient};

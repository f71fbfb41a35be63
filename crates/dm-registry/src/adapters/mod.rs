//! # Adapters
//!
//! In-memory implementations of the outbound ports.

pub mod clock;
pub mod event_log;
pub mod token_ledger;

pub use clock::{ManualClock, SystemClock};
pub use event_log::InMemoryEventLog;
pub use token_ledger::InMemoryTokenLedger;

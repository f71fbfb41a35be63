//! # Dataset Market Registry
//!
//! Ledger core of a dataset marketplace. Uploaders register content-addressed
//! datasets and mark them public, private or paid; buyers pay an allow-listed
//! fungible token for download rights, and the ledger tracks grants and
//! earnings.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Dataset CIDs are unique and non-empty | `domain/registry.rs` - `validate_upload()` |
//! | Never both public and private; private never paid | `domain/registry.rs` - `validate_upload()` |
//! | Paid datasets carry a positive price | `domain/registry.rs` - `validate_upload()` |
//! | Ids are sequential from 0 and never reused | `domain/registry.rs` - `upload()` |
//! | One purchase per (dataset, buyer), never by the uploader | `domain/settlement.rs` - `plan_purchase()` |
//! | Settlement writes only after a successful transfer | `service.rs` - `do_purchase()` |
//! | At most one mutating call in flight | `domain/guard.rs` - `ReentrancyGuard` |
//!
//! `domain/invariants.rs` re-checks all of them against a whole registry; it
//! runs on every snapshot restore.
//!
//! ## Access Predicates
//!
//! | Predicate | Rule |
//! |-----------|------|
//! | view | caller is uploader, or dataset is public and not private |
//! | download | caller is uploader, or dataset is free, or caller holds a grant |
//!
//! ## Outbound Dependencies
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | `TokenGateway` | `transfer_from` on the payment token |
//! | `EventSink` | Receives committed events |
//! | `Clock` | Upload timestamps |
//!
//! ## Usage Example
//!
//! ```ignore
//! use dm_registry::prelude::*;
//!
//! let market = Marketplace::new(config, ledger, log)?;
//! let id = market.upload(alice, UploadRequest::paid("bafy...", "bafy...", 10u64))?;
//! market.purchase(bob, id, usdc)?;
//! assert!(market.can_download(bob, id)?);
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod ports;
pub mod service;
pub mod snapshot;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{Dataset, PaymentToken, PublicPage, UploadRequest};

    // Value objects
    pub use crate::domain::value_objects::{Address, Cid, DatasetId, U256};

    // Registry and invariants
    pub use crate::domain::invariants::{
        check_all_invariants, InvariantCheckResult, InvariantViolation,
    };
    pub use crate::domain::registry::{Counter, Registry};

    // Ports
    pub use crate::ports::inbound::DatasetMarketApi;
    pub use crate::ports::outbound::{Clock, EventSink, TokenGateway};

    // Adapters
    pub use crate::adapters::{InMemoryEventLog, InMemoryTokenLedger, ManualClock, SystemClock};

    // Service
    pub use crate::config::{ConfigError, MarketConfig};
    pub use crate::service::{MarketStats, Marketplace};
    pub use crate::snapshot::LedgerSnapshot;

    // Events and errors
    pub use crate::errors::{ErrorCategory, MarketError, SnapshotError, TransferError};
    pub use crate::events::{EventRecord, MarketEvent};
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

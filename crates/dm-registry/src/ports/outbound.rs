//! # Driven Ports (SPI - Outbound)
//!
//! Interfaces the ledger depends on:
//! - the fungible-token transfer capability used to settle purchases
//! - the sink committed events are published to
//! - the clock that stamps uploads
//!
//! All of them are synchronous: a ledger call never suspends.

use crate::domain::value_objects::{Address, U256};
use crate::errors::TransferError;
use crate::events::MarketEvent;

// =============================================================================
// TOKEN GATEWAY
// =============================================================================

/// Transfer-from capability of an external fungible token.
///
/// The ledger trusts the returned result as ground truth: `Ok` means the
/// funds moved, `Err` means nothing moved. Implementations may call back into
/// the ledger; mutating calls made that way are rejected by the guard.
pub trait TokenGateway: Send + Sync {
    /// Move `amount` of `token` from `from` to `to`, spent by `spender`
    /// under the allowance `from` granted it.
    fn transfer_from(
        &self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TransferError>;
}

// =============================================================================
// EVENT SINK
// =============================================================================

/// Destination for committed events.
pub trait EventSink: Send + Sync {
    /// Publish one event. Called after the corresponding state write.
    fn publish(&self, event: MarketEvent);
}

// =============================================================================
// CLOCK
// =============================================================================

/// Source of upload timestamps.
pub trait Clock: Send + Sync {
    /// Current unix time in seconds.
    fn now(&self) -> u64;
}

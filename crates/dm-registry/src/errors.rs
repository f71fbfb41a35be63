//! # Error Types
//!
//! All error types for the dataset ledger.
//!
//! Every entry point fails fast and atomically: when a call returns an error
//! the ledger state is exactly what it was before the call.

use crate::domain::value_objects::{Address, DatasetId, U256};
use thiserror::Error;

// =============================================================================
// ERROR CATEGORIES
// =============================================================================

/// Coarse classification of a [`MarketError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed or contradictory input.
    Validation,
    /// Caller lacks the right to perform the operation.
    Authorization,
    /// Request conflicts with the current ledger state.
    StateConflict,
    /// The external token transfer failed.
    ExternalCall,
    /// Referenced record does not exist.
    NotFound,
    /// A mutating call was attempted while another was in flight.
    Guard,
}

impl ErrorCategory {
    /// Stable snake_case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Authorization => "authorization",
            Self::StateConflict => "state_conflict",
            Self::ExternalCall => "external_call",
            Self::NotFound => "not_found",
            Self::Guard => "guard",
        }
    }
}

// =============================================================================
// MARKET ERRORS
// =============================================================================

/// Errors returned by ledger entry points.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarketError {
    /// No dataset with this id.
    #[error("dataset not found: {0}")]
    DatasetNotFound(DatasetId),

    /// Upload without a dataset CID.
    #[error("dataset CID must not be empty")]
    EmptyCid,

    /// The dataset CID was already registered.
    #[error("dataset CID already registered: {0}")]
    DuplicateCid(String),

    /// Visibility/payment flags contradict each other.
    #[error("invalid flag combination: {0}")]
    InvalidCombination(&'static str),

    /// Paid dataset without a positive price.
    #[error("paid datasets require a price greater than zero")]
    InvalidPrice,

    /// Zero identity where a real identity is required.
    #[error("invalid identity: {0}")]
    InvalidIdentity(Address),

    /// Caller fails the access predicate for this operation.
    #[error("access denied for {caller} on dataset {id}")]
    AccessDenied {
        /// Dataset the caller tried to access.
        id: DatasetId,
        /// Rejected caller.
        caller: Address,
    },

    /// Caller is not the platform admin.
    #[error("caller {0} is not the platform admin")]
    NotAdmin(Address),

    /// Dataset is not publicly listed.
    #[error("dataset {0} is not public")]
    NotPublic(DatasetId),

    /// Dataset is free; there is nothing to purchase.
    #[error("dataset {0} is not paid")]
    NotPaid(DatasetId),

    /// Buyer already holds an access grant.
    #[error("dataset {id} already purchased by {buyer}")]
    AlreadyPurchased {
        /// Dataset id.
        id: DatasetId,
        /// Buyer holding the grant.
        buyer: Address,
    },

    /// Uploader tried to buy their own dataset.
    #[error("uploader cannot purchase own dataset {0}")]
    SelfPurchase(DatasetId),

    /// Payment token is not allow-listed.
    #[error("payment token not accepted: {0}")]
    TokenNotAccepted(Address),

    /// Payment token is already allow-listed.
    #[error("payment token already accepted: {0}")]
    TokenAlreadyAccepted(Address),

    /// A bounded view/download counter would overflow.
    #[error("{counter} counter overflow on dataset {id}")]
    CounterOverflow {
        /// Dataset id.
        id: DatasetId,
        /// Which counter ("views" or "downloads").
        counter: &'static str,
    },

    /// Earnings accumulation would overflow.
    #[error("earnings overflow: {current} + {amount}")]
    EarningsOverflow {
        /// Current accumulated amount.
        current: U256,
        /// Amount that could not be added.
        amount: U256,
    },

    /// The external token transfer reported failure.
    #[error("token transfer failed: {0}")]
    TransferFailed(#[from] TransferError),

    /// A mutating call was attempted while another was in flight.
    #[error("re-entrant mutating call rejected")]
    ReentrantCall,
}

impl MarketError {
    /// Returns the taxonomy bucket of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::EmptyCid
            | Self::DuplicateCid(_)
            | Self::InvalidCombination(_)
            | Self::InvalidPrice
            | Self::InvalidIdentity(_) => ErrorCategory::Validation,
            Self::AccessDenied { .. } | Self::NotAdmin(_) => ErrorCategory::Authorization,
            Self::NotPublic(_)
            | Self::NotPaid(_)
            | Self::AlreadyPurchased { .. }
            | Self::SelfPurchase(_)
            | Self::TokenNotAccepted(_)
            | Self::TokenAlreadyAccepted(_)
            | Self::CounterOverflow { .. }
            | Self::EarningsOverflow { .. } => ErrorCategory::StateConflict,
            Self::TransferFailed(_) => ErrorCategory::ExternalCall,
            Self::DatasetNotFound(_) => ErrorCategory::NotFound,
            Self::ReentrantCall => ErrorCategory::Guard,
        }
    }
}

// =============================================================================
// TRANSFER ERRORS
// =============================================================================

/// Failure reported by the external token transfer capability.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Payer balance is below the amount.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Amount requested.
        required: U256,
        /// Balance held by the payer.
        available: U256,
    },

    /// Spender allowance is below the amount.
    #[error("insufficient allowance: required {required}, approved {approved}")]
    InsufficientAllowance {
        /// Amount requested.
        required: U256,
        /// Allowance granted to the spender.
        approved: U256,
    },

    /// The token contract does not exist.
    #[error("unknown token: {0}")]
    UnknownToken(Address),

    /// The token rejected the transfer for another reason.
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

// =============================================================================
// SNAPSHOT ERRORS
// =============================================================================

/// Errors restoring a ledger from a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Snapshot state breaks one or more ledger invariants.
    #[error("snapshot violates {} invariant(s): {}", .0.len(), .0.join("; "))]
    Invariant(Vec<String>),

    /// Snapshot was taken under a different configuration or format.
    #[error("snapshot inconsistent with configuration: {0}")]
    Config(String),

    /// Stored event history is not a gap-free sequence from 0.
    #[error("event history broken at position {position}: found sequence {found}")]
    EventGap {
        /// Index in the stored history.
        position: u64,
        /// Sequence number stored at that index.
        found: u64,
    },
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_error_display() {
        let err = MarketError::DatasetNotFound(7);
        assert_eq!(err.to_string(), "dataset not found: 7");

        let err = MarketError::CounterOverflow {
            id: 3,
            counter: "views",
        };
        assert_eq!(err.to_string(), "views counter overflow on dataset 3");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            MarketError::DuplicateCid("a".into()).category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            MarketError::AccessDenied {
                id: 0,
                caller: Address::ZERO
            }
            .category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            MarketError::SelfPurchase(0).category(),
            ErrorCategory::StateConflict
        );
        assert_eq!(
            MarketError::TransferFailed(TransferError::Rejected("x".into())).category(),
            ErrorCategory::ExternalCall
        );
        assert_eq!(MarketError::ReentrantCall.category(), ErrorCategory::Guard);
        assert_eq!(ErrorCategory::StateConflict.as_str(), "state_conflict");
    }

    #[test]
    fn test_transfer_error_conversion() {
        let err: MarketError = TransferError::UnknownToken(Address::repeat_byte(9)).into();
        assert!(matches!(err, MarketError::TransferFailed(_)));
    }

    #[test]
    fn test_snapshot_error_lists_violations() {
        let err = SnapshotError::Invariant(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "snapshot violates 2 invariant(s): a; b");
    }
}

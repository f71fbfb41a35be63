//! # Domain Layer (Inner Hexagon)
//!
//! Pure ledger logic: records, predicates, settlement planning, pagination
//! and invariant checks.
//! NO I/O, NO async, NO clocks, NO token calls.

pub mod access;
pub mod allowlist;
pub mod entities;
pub mod guard;
pub mod invariants;
pub mod pagination;
pub mod registry;
pub mod settlement;
pub mod value_objects;

pub use access::{can_download, can_view};
pub use allowlist::TokenAllowlist;
pub use entities::*;
pub use guard::{GuardEntry, ReentrancyGuard};
pub use invariants::{check_all_invariants, InvariantCheckResult, InvariantViolation};
pub use pagination::{public_count, public_page};
pub use registry::{Counter, Registry};
pub use settlement::{commit_purchase, plan_purchase, SettlementPlan};
pub use value_objects::*;

//! # Domain Invariants
//!
//! Ledger-wide rules that every committed state satisfies. Entry points keep
//! them by construction; this module re-checks them from scratch, which is
//! what snapshot restoration and the tests rely on.

use crate::domain::registry::Registry;
use crate::domain::value_objects::{Address, Cid, DatasetId, U256};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// INVARIANT CHECKS
// =============================================================================

/// Ids run 0, 1, 2, ... with no gaps.
#[must_use]
pub fn check_sequential_ids(registry: &Registry) -> Vec<InvariantViolation> {
    registry
        .datasets
        .iter()
        .enumerate()
        .filter(|(index, dataset)| dataset.id != *index as DatasetId)
        .map(|(index, dataset)| InvariantViolation::NonSequentialId {
            position: index as u64,
            id: dataset.id,
        })
        .collect()
}

/// Each CID belongs to exactly one dataset and the used-CID set matches.
#[must_use]
pub fn check_cid_uniqueness(registry: &Registry) -> Vec<InvariantViolation> {
    let mut seen: BTreeSet<&Cid> = BTreeSet::new();
    let mut violations = Vec::new();
    for dataset in &registry.datasets {
        if dataset.dataset_cid.is_empty() {
            violations.push(InvariantViolation::EmptyCid { id: dataset.id });
        }
        if !seen.insert(&dataset.dataset_cid) {
            violations.push(InvariantViolation::DuplicateCid {
                cid: dataset.dataset_cid.to_string(),
            });
        }
    }
    if seen.len() != registry.used_cids.len()
        || seen.iter().any(|cid| !registry.used_cids.contains(*cid))
    {
        violations.push(InvariantViolation::CidSetMismatch);
    }
    violations
}

/// Visibility and price flags are consistent on every record.
#[must_use]
pub fn check_flags(registry: &Registry) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    for dataset in &registry.datasets {
        if dataset.is_public && dataset.is_private {
            violations.push(InvariantViolation::PublicAndPrivate { id: dataset.id });
        }
        if dataset.is_private && dataset.is_paid {
            violations.push(InvariantViolation::PrivateAndPaid { id: dataset.id });
        }
        if dataset.is_paid && dataset.price.is_zero() {
            violations.push(InvariantViolation::PaidWithoutPrice { id: dataset.id });
        }
    }
    violations
}

/// The per-uploader index lists exactly each uploader's ids, ascending.
#[must_use]
pub fn check_uploader_index(registry: &Registry) -> Vec<InvariantViolation> {
    let mut expected: BTreeMap<Address, Vec<DatasetId>> = BTreeMap::new();
    for dataset in &registry.datasets {
        expected.entry(dataset.uploader).or_default().push(dataset.id);
    }
    let actual: BTreeMap<Address, Vec<DatasetId>> = registry
        .by_uploader
        .iter()
        .filter(|(_, ids)| !ids.is_empty())
        .map(|(uploader, ids)| (*uploader, ids.clone()))
        .collect();

    if expected == actual {
        Vec::new()
    } else {
        vec![InvariantViolation::UploaderIndexMismatch]
    }
}

/// Grants point at purchasable datasets and match the per-buyer index, and
/// earnings equal price times the number of grants.
#[must_use]
pub fn check_settlement(registry: &Registry) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    let mut grant_counts: BTreeMap<DatasetId, u64> = BTreeMap::new();
    for (id, buyer) in &registry.grants {
        match registry.get(*id) {
            Ok(dataset) if dataset.is_paid && *buyer != dataset.uploader => {
                *grant_counts.entry(*id).or_default() += 1;
            }
            _ => violations.push(InvariantViolation::InvalidGrant {
                id: *id,
                buyer: *buyer,
            }),
        }
    }

    let from_index: BTreeSet<(DatasetId, Address)> = registry
        .purchases
        .iter()
        .flat_map(|(buyer, ids)| ids.iter().map(move |id| (*id, *buyer)))
        .collect();
    let index_len: usize = registry.purchases.values().map(Vec::len).sum();
    if from_index != registry.grants || index_len != registry.grants.len() {
        violations.push(InvariantViolation::PurchaseIndexMismatch);
    }

    let mut per_publisher: BTreeMap<Address, U256> = BTreeMap::new();
    for dataset in &registry.datasets {
        let sales = grant_counts.get(&dataset.id).copied().unwrap_or(0);
        let expected = dataset.price.checked_mul(U256::from(sales));
        if expected != Some(dataset.earnings) {
            violations.push(InvariantViolation::DatasetEarningsMismatch { id: dataset.id });
        }

        let total = per_publisher.entry(dataset.uploader).or_default();
        match total.checked_add(dataset.earnings) {
            Some(sum) => *total = sum,
            None => violations.push(InvariantViolation::PublisherEarningsMismatch {
                publisher: dataset.uploader,
            }),
        }
    }

    let publishers: BTreeSet<&Address> = per_publisher
        .keys()
        .chain(registry.publisher_earnings.keys())
        .collect();
    for publisher in publishers {
        let expected = per_publisher.get(publisher).copied().unwrap_or_default();
        if registry.earnings_of(publisher) != expected {
            violations.push(InvariantViolation::PublisherEarningsMismatch {
                publisher: *publisher,
            });
        }
    }

    violations
}

/// Every allow-listed token has a non-zero identity and appears once.
#[must_use]
pub fn check_allowlist(registry: &Registry) -> Vec<InvariantViolation> {
    let mut seen = BTreeSet::new();
    registry
        .allowlist
        .tokens()
        .iter()
        .filter(|token| token.address.is_zero() || !seen.insert(token.address))
        .map(|token| InvariantViolation::InvalidToken {
            token: token.address,
        })
        .collect()
}

/// Check all invariants at once.
#[must_use]
pub fn check_all_invariants(registry: &Registry) -> InvariantCheckResult {
    let violations: Vec<InvariantViolation> = [
        check_sequential_ids(registry),
        check_cid_uniqueness(registry),
        check_flags(registry),
        check_uploader_index(registry),
        check_settlement(registry),
        check_allowlist(registry),
    ]
    .into_iter()
    .flatten()
    .collect();

    if violations.is_empty() {
        InvariantCheckResult::Valid
    } else {
        InvariantCheckResult::Invalid(violations)
    }
}

// =============================================================================
// INVARIANT TYPES
// =============================================================================

/// Result of checking all invariants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantCheckResult {
    /// All invariants hold.
    Valid,
    /// One or more invariants violated.
    Invalid(Vec<InvariantViolation>),
}

impl InvariantCheckResult {
    /// Returns true if all invariants hold.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Violations found, empty when valid.
    #[must_use]
    pub fn violations(&self) -> &[InvariantViolation] {
        match self {
            Self::Valid => &[],
            Self::Invalid(violations) => violations,
        }
    }
}

/// Specific invariant violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Record at `position` carries a different id.
    NonSequentialId {
        /// Index in the dataset list.
        position: u64,
        /// Id stored at that index.
        id: DatasetId,
    },
    /// Record without a dataset CID.
    EmptyCid {
        /// Offending dataset.
        id: DatasetId,
    },
    /// Two records share a CID.
    DuplicateCid {
        /// The shared CID.
        cid: String,
    },
    /// Used-CID set differs from the CIDs on record.
    CidSetMismatch,
    /// Record is both public and private.
    PublicAndPrivate {
        /// Offending dataset.
        id: DatasetId,
    },
    /// Record is private and paid.
    PrivateAndPaid {
        /// Offending dataset.
        id: DatasetId,
    },
    /// Paid record with zero price.
    PaidWithoutPrice {
        /// Offending dataset.
        id: DatasetId,
    },
    /// Per-uploader index differs from the records.
    UploaderIndexMismatch,
    /// Grant on a free, missing or self-owned dataset.
    InvalidGrant {
        /// Dataset the grant names.
        id: DatasetId,
        /// Holder of the grant.
        buyer: Address,
    },
    /// Per-buyer index differs from the grants.
    PurchaseIndexMismatch,
    /// Dataset earnings differ from price times sales.
    DatasetEarningsMismatch {
        /// Offending dataset.
        id: DatasetId,
    },
    /// Publisher earnings differ from the sum over their datasets.
    PublisherEarningsMismatch {
        /// Publisher whose total is off.
        publisher: Address,
    },
    /// Zero or duplicated token in the allowlist.
    InvalidToken {
        /// Offending allowlist entry.
        token: Address,
    },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonSequentialId { position, id } => {
                write!(f, "dataset at position {position} has id {id}")
            }
            Self::EmptyCid { id } => write!(f, "dataset {id} has an empty CID"),
            Self::DuplicateCid { cid } => write!(f, "CID {cid} used more than once"),
            Self::CidSetMismatch => write!(f, "used-CID set does not match records"),
            Self::PublicAndPrivate { id } => write!(f, "dataset {id} is public and private"),
            Self::PrivateAndPaid { id } => write!(f, "dataset {id} is private and paid"),
            Self::PaidWithoutPrice { id } => write!(f, "dataset {id} is paid with zero price"),
            Self::UploaderIndexMismatch => write!(f, "uploader index does not match records"),
            Self::InvalidGrant { id, buyer } => {
                write!(f, "grant for {buyer} on dataset {id} is not valid")
            }
            Self::PurchaseIndexMismatch => write!(f, "purchase index does not match grants"),
            Self::DatasetEarningsMismatch { id } => {
                write!(f, "dataset {id} earnings differ from settled purchases")
            }
            Self::PublisherEarningsMismatch { publisher } => {
                write!(f, "earnings of {publisher} differ from their datasets")
            }
            Self::InvalidToken { token } => write!(f, "allowlist entry {token} is not valid"),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! # Access Predicates
//!
//! The only place view and download eligibility is decided. Every guarded
//! operation calls these functions while holding the registry lock, so the
//! answer cannot go stale before the operation's effect is applied.

use crate::domain::entities::Dataset;
use crate::domain::value_objects::Address;

/// Caller may read the dataset record.
///
/// The uploader always may; anyone else only when the dataset is publicly
/// listed.
#[must_use]
pub fn can_view(dataset: &Dataset, caller: &Address) -> bool {
    *caller == dataset.uploader || dataset.is_publicly_listed()
}

/// Caller may download the dataset content.
///
/// `has_grant` is the caller's purchase grant for this dataset.
#[must_use]
pub fn can_download(dataset: &Dataset, caller: &Address, has_grant: bool) -> bool {
    *caller == dataset.uploader || !dataset.is_paid || has_grant
}

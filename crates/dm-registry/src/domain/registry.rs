//! # Dataset Registry
//!
//! The ledger state: dataset records, the CID set, the per-uploader and
//! per-buyer indexes, access grants, publisher earnings and the token
//! allowlist.
//!
//! Every mutator validates completely before it writes, so a returned error
//! always means nothing changed. Records are never deleted; the indexes are
//! written in the same call as the record they point to and are never rebuilt
//! from a scan.

use crate::domain::access;
use crate::domain::allowlist::TokenAllowlist;
use crate::domain::entities::{Dataset, PaymentToken, UploadRequest};
use crate::domain::value_objects::{Address, Cid, DatasetId, U256};
use crate::errors::MarketError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which bounded counter an increment targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Counter {
    /// View counter, guarded by the view predicate.
    Views,
    /// Download counter, guarded by the download predicate.
    Downloads,
}

impl Counter {
    /// Counter name used in errors and logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Views => "views",
            Self::Downloads => "downloads",
        }
    }
}

/// Complete ledger state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// Records indexed by id.
    pub(super) datasets: Vec<Dataset>,
    /// Every CID ever registered.
    pub(super) used_cids: BTreeSet<Cid>,
    /// Dataset ids per uploader, ascending.
    pub(super) by_uploader: BTreeMap<Address, Vec<DatasetId>>,
    /// Access grants as (dataset, buyer) pairs.
    pub(super) grants: BTreeSet<(DatasetId, Address)>,
    /// Purchased dataset ids per buyer, in purchase order.
    pub(super) purchases: BTreeMap<Address, Vec<DatasetId>>,
    /// Accumulated earnings per uploader.
    pub(super) publisher_earnings: BTreeMap<Address, U256>,
    /// Accepted payment tokens.
    pub(super) allowlist: TokenAllowlist,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // UPLOAD
    // =========================================================================

    /// Check an upload without touching state.
    pub fn validate_upload(
        &self,
        uploader: &Address,
        request: &UploadRequest,
    ) -> Result<(), MarketError> {
        if uploader.is_zero() {
            return Err(MarketError::InvalidIdentity(*uploader));
        }
        if request.dataset_cid.is_empty() {
            return Err(MarketError::EmptyCid);
        }
        if self.used_cids.contains(&request.dataset_cid) {
            return Err(MarketError::DuplicateCid(
                request.dataset_cid.as_str().to_string(),
            ));
        }
        if request.is_public && request.is_private {
            return Err(MarketError::InvalidCombination(
                "dataset cannot be both public and private",
            ));
        }
        if request.is_private && request.is_paid {
            return Err(MarketError::InvalidCombination(
                "private datasets cannot be paid",
            ));
        }
        if request.is_paid && request.price.is_zero() {
            return Err(MarketError::InvalidPrice);
        }
        Ok(())
    }

    /// Register a dataset and return its id.
    ///
    /// Free datasets are stored with a zero price whatever was submitted.
    pub fn upload(
        &mut self,
        uploader: Address,
        request: UploadRequest,
        created_at: u64,
    ) -> Result<&Dataset, MarketError> {
        self.validate_upload(&uploader, &request)?;

        let id = self.datasets.len() as DatasetId;
        let price = if request.is_paid {
            request.price
        } else {
            U256::zero()
        };

        self.used_cids.insert(request.dataset_cid.clone());
        self.by_uploader.entry(uploader).or_default().push(id);
        self.datasets.push(Dataset {
            id,
            dataset_cid: request.dataset_cid,
            analysis_cid: request.analysis_cid,
            uploader,
            is_public: request.is_public,
            is_private: request.is_private,
            created_at,
            views: 0,
            downloads: 0,
            is_paid: request.is_paid,
            price,
            earnings: U256::zero(),
        });

        self.datasets.last().ok_or(MarketError::DatasetNotFound(id))
    }

    // =========================================================================
    // GUARDED ACCESS
    // =========================================================================

    /// Unguarded record lookup.
    pub fn get(&self, id: DatasetId) -> Result<&Dataset, MarketError> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.datasets.get(index))
            .ok_or(MarketError::DatasetNotFound(id))
    }

    /// Record lookup guarded by the view predicate.
    pub fn view(&self, id: DatasetId, caller: &Address) -> Result<&Dataset, MarketError> {
        let dataset = self.get(id)?;
        if !access::can_view(dataset, caller) {
            return Err(MarketError::AccessDenied {
                id,
                caller: *caller,
            });
        }
        Ok(dataset)
    }

    /// Evaluate the view predicate.
    pub fn can_view(&self, id: DatasetId, caller: &Address) -> Result<bool, MarketError> {
        Ok(access::can_view(self.get(id)?, caller))
    }

    /// Evaluate the download predicate.
    pub fn can_download(&self, id: DatasetId, caller: &Address) -> Result<bool, MarketError> {
        let dataset = self.get(id)?;
        Ok(access::can_download(
            dataset,
            caller,
            self.has_grant(id, caller),
        ))
    }

    /// Increment a counter after checking its guarding predicate.
    ///
    /// Counters are `u64`; reaching the maximum rejects the call instead of
    /// wrapping or saturating. Returns the new value.
    pub fn increment(
        &mut self,
        id: DatasetId,
        caller: &Address,
        counter: Counter,
    ) -> Result<u64, MarketError> {
        let permitted = match counter {
            Counter::Views => self.can_view(id, caller)?,
            Counter::Downloads => self.can_download(id, caller)?,
        };
        if !permitted {
            return Err(MarketError::AccessDenied {
                id,
                caller: *caller,
            });
        }

        let dataset = self.get_mut(id)?;
        let slot = match counter {
            Counter::Views => &mut dataset.views,
            Counter::Downloads => &mut dataset.downloads,
        };
        let next = slot.checked_add(1).ok_or(MarketError::CounterOverflow {
            id,
            counter: counter.name(),
        })?;
        *slot = next;
        Ok(next)
    }

    pub(super) fn get_mut(&mut self, id: DatasetId) -> Result<&mut Dataset, MarketError> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.datasets.get_mut(index))
            .ok_or(MarketError::DatasetNotFound(id))
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Number of datasets ever uploaded.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.datasets.len() as u64
    }

    /// All records in id order.
    #[must_use]
    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    /// Returns true if the CID was ever registered.
    #[must_use]
    pub fn is_cid_used(&self, cid: &Cid) -> bool {
        self.used_cids.contains(cid)
    }

    /// Ids uploaded by `uploader`, ascending.
    #[must_use]
    pub fn dataset_ids_of(&self, uploader: &Address) -> &[DatasetId] {
        self.by_uploader.get(uploader).map(Vec::as_slice).unwrap_or_default()
    }

    /// Ids purchased by `buyer`, in purchase order.
    #[must_use]
    pub fn purchased_ids_of(&self, buyer: &Address) -> &[DatasetId] {
        self.purchases.get(buyer).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns true if `buyer` holds a purchase grant for `id`.
    #[must_use]
    pub fn has_grant(&self, id: DatasetId, buyer: &Address) -> bool {
        self.grants.contains(&(id, *buyer))
    }

    /// Accumulated earnings of `publisher`.
    #[must_use]
    pub fn earnings_of(&self, publisher: &Address) -> U256 {
        self.publisher_earnings
            .get(publisher)
            .copied()
            .unwrap_or_else(U256::zero)
    }

    /// Earnings of one dataset, visible to its uploader and the platform admin.
    pub fn dataset_earnings(
        &self,
        id: DatasetId,
        caller: &Address,
        admin: &Address,
    ) -> Result<U256, MarketError> {
        let dataset = self.get(id)?;
        if *caller != dataset.uploader && caller != admin {
            return Err(MarketError::AccessDenied {
                id,
                caller: *caller,
            });
        }
        Ok(dataset.earnings)
    }

    // =========================================================================
    // TOKEN ALLOWLIST
    // =========================================================================

    /// The payment token allowlist.
    #[must_use]
    pub fn allowlist(&self) -> &TokenAllowlist {
        &self.allowlist
    }

    /// Append a payment token. Admin checks happen at the entry point.
    pub fn add_payment_token(
        &mut self,
        token: Address,
        symbol: &str,
    ) -> Result<&PaymentToken, MarketError> {
        self.allowlist.add(token, symbol)
    }
}

// =============================================================================
// TESTS
// =============================================================================

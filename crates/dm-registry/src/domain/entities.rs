//! # Core Domain Entities
//!
//! Records owned by the ledger: datasets, payment tokens, and the request and
//! page shapes that move them across the API boundary.

use crate::domain::value_objects::{Address, Cid, DatasetId, U256};
use serde::{Deserialize, Serialize};

// =============================================================================
// DATASET
// =============================================================================

/// Ledger entry describing one uploaded dataset.
///
/// Created once by upload and never deleted. After creation only the view and
/// download counters and the earnings total change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// Sequential identifier.
    pub id: DatasetId,
    /// CID of the dataset content. Unique across the ledger.
    pub dataset_cid: Cid,
    /// CID of the analysis report.
    pub analysis_cid: Cid,
    /// Identity that uploaded the dataset.
    pub uploader: Address,
    /// Listed publicly.
    pub is_public: bool,
    /// Visible to the uploader only.
    pub is_private: bool,
    /// Unix timestamp (seconds) of the upload.
    pub created_at: u64,
    /// View counter.
    pub views: u64,
    /// Download counter.
    pub downloads: u64,
    /// Download requires a purchase.
    pub is_paid: bool,
    /// Price in token units. Zero for free datasets.
    pub price: U256,
    /// Sum of settled purchases.
    pub earnings: U256,
}

impl Dataset {
    /// Returns true if the dataset appears in public listings.
    #[must_use]
    pub fn is_publicly_listed(&self) -> bool {
        self.is_public && !self.is_private
    }
}

// =============================================================================
// UPLOAD REQUEST
// =============================================================================

/// Parameters of an upload. The uploader is the caller of the entry point.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    /// CID of the dataset content.
    pub dataset_cid: Cid,
    /// CID of the analysis report.
    pub analysis_cid: Cid,
    /// List publicly.
    pub is_public: bool,
    /// Restrict to the uploader.
    pub is_private: bool,
    /// Require purchase for download.
    pub is_paid: bool,
    /// Price in token units.
    pub price: U256,
}

impl UploadRequest {
    /// Free public dataset.
    #[must_use]
    pub fn public(dataset_cid: impl Into<Cid>, analysis_cid: impl Into<Cid>) -> Self {
        Self {
            dataset_cid: dataset_cid.into(),
            analysis_cid: analysis_cid.into(),
            is_public: true,
            ..Self::default()
        }
    }

    /// Paid public dataset.
    #[must_use]
    pub fn paid(
        dataset_cid: impl Into<Cid>,
        analysis_cid: impl Into<Cid>,
        price: impl Into<U256>,
    ) -> Self {
        Self {
            is_paid: true,
            price: price.into(),
            ..Self::public(dataset_cid, analysis_cid)
        }
    }

    /// Private dataset.
    #[must_use]
    pub fn private(dataset_cid: impl Into<Cid>, analysis_cid: impl Into<Cid>) -> Self {
        Self {
            dataset_cid: dataset_cid.into(),
            analysis_cid: analysis_cid.into(),
            is_private: true,
            ..Self::default()
        }
    }
}

// =============================================================================
// PAYMENT TOKEN
// =============================================================================

/// An allow-listed payment token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentToken {
    /// Token contract identity.
    pub address: Address,
    /// Whether purchases may settle in this token.
    pub accepted: bool,
    /// Display symbol.
    pub symbol: String,
}

// =============================================================================
// PUBLIC PAGE
// =============================================================================

/// One page of the public listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicPage {
    /// Datasets on this page, ascending by id.
    pub datasets: Vec<Dataset>,
    /// Start cursor of the following page, `None` when no data remains.
    pub next_start: Option<u64>,
}

impl PublicPage {
    /// Empty page with no further data.
    #[must_use]
    pub fn exhausted() -> Self {
        Self {
            datasets: Vec::new(),
            next_start: None,
        }
    }

    /// Returns true if no further page exists.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.next_start.is_none()
    }

    /// Ids of the datasets on this page.
    #[must_use]
    pub fn ids(&self) -> Vec<DatasetId> {
        self.datasets.iter().map(|d| d.id).collect()
    }
}

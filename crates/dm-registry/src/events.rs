//! # Ledger Events
//!
//! One event per committed transition, published after the state write.
//! Rejected calls publish nothing. Consumers discover new datasets and
//! purchases from these events instead of re-scanning the registry.

use crate::domain::entities::Dataset;
use crate::domain::value_objects::{Address, Cid, DatasetId, U256};
use serde::{Deserialize, Serialize};

/// Event emitted by a committed ledger transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    /// A dataset was registered.
    DatasetUploaded {
        /// Assigned dataset id.
        id: DatasetId,
        /// CID of the dataset content.
        dataset_cid: Cid,
        /// CID of the analysis report.
        analysis_cid: Cid,
        /// Uploading identity.
        uploader: Address,
        /// Listed publicly.
        is_public: bool,
        /// Visible to the uploader only.
        is_private: bool,
        /// Download requires a purchase.
        is_paid: bool,
        /// Stored price.
        price: U256,
        /// Upload timestamp (seconds).
        created_at: u64,
    },

    /// A dataset entered the public listing. Follows its upload event.
    PublicListed {
        /// Listed dataset.
        id: DatasetId,
        /// CID of the dataset content.
        dataset_cid: Cid,
        /// Uploading identity.
        uploader: Address,
        /// Upload timestamp (seconds).
        created_at: u64,
    },

    /// A buyer settled a purchase and holds an access grant.
    DatasetPurchased {
        /// Purchased dataset.
        id: DatasetId,
        /// Identity that paid.
        buyer: Address,
        /// Identity that received the payment.
        uploader: Address,
        /// Settlement token.
        token: Address,
        /// Amount transferred.
        amount: U256,
    },

    /// A payment token was allow-listed.
    PaymentTokenAdded {
        /// Token identity.
        token: Address,
        /// Display symbol.
        symbol: String,
    },
}

impl MarketEvent {
    /// Events for a freshly uploaded dataset: the upload event, plus the
    /// listing event when the dataset is public.
    #[must_use]
    pub fn for_upload(dataset: &Dataset) -> Vec<Self> {
        let mut events = vec![Self::DatasetUploaded {
            id: dataset.id,
            dataset_cid: dataset.dataset_cid.clone(),
            analysis_cid: dataset.analysis_cid.clone(),
            uploader: dataset.uploader,
            is_public: dataset.is_public,
            is_private: dataset.is_private,
            is_paid: dataset.is_paid,
            price: dataset.price,
            created_at: dataset.created_at,
        }];
        if dataset.is_publicly_listed() {
            events.push(Self::PublicListed {
                id: dataset.id,
                dataset_cid: dataset.dataset_cid.clone(),
                uploader: dataset.uploader,
                created_at: dataset.created_at,
            });
        }
        events
    }

    /// Short event name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DatasetUploaded { .. } => "dataset_uploaded",
            Self::PublicListed { .. } => "public_listed",
            Self::DatasetPurchased { .. } => "dataset_purchased",
            Self::PaymentTokenAdded { .. } => "payment_token_added",
        }
    }
}

/// An event with its position in the append-only log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 0.
    pub sequence: u64,
    /// The event.
    pub event: MarketEvent,
}

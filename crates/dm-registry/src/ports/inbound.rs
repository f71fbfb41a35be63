//! # Driving Ports (API - Inbound)
//!
//! The entry points of the ledger. The hosting environment authenticates the
//! caller and passes its identity in; the ledger never derives identity from
//! request payloads.
//!
//! Mutating entry points: `upload`, `increment_views`, `increment_downloads`,
//! `purchase`, `add_payment_token`. Everything else is read-only.

use crate::domain::entities::{Dataset, PaymentToken, PublicPage, UploadRequest};
use crate::domain::value_objects::{Address, DatasetId, U256};
use crate::errors::MarketError;

/// Primary API of the dataset ledger.
pub trait DatasetMarketApi: Send + Sync {
    // -------------------------------------------------------------------------
    // Mutating
    // -------------------------------------------------------------------------

    /// Register a dataset owned by `caller`. Returns the new id.
    fn upload(&self, caller: Address, request: UploadRequest) -> Result<DatasetId, MarketError>;

    /// Count a view. Requires the view predicate. Returns the new count.
    fn increment_views(&self, caller: Address, id: DatasetId) -> Result<u64, MarketError>;

    /// Count a download. Requires the download predicate. Returns the new count.
    fn increment_downloads(&self, caller: Address, id: DatasetId) -> Result<u64, MarketError>;

    /// Buy download rights to a paid public dataset, paying in `token`.
    fn purchase(&self, caller: Address, id: DatasetId, token: Address) -> Result<(), MarketError>;

    /// Allow-list a payment token. Platform admin only.
    fn add_payment_token(
        &self,
        caller: Address,
        token: Address,
        symbol: &str,
    ) -> Result<(), MarketError>;

    // -------------------------------------------------------------------------
    // Read-only
    // -------------------------------------------------------------------------

    /// Read a dataset record. Requires the view predicate.
    fn get_dataset(&self, caller: Address, id: DatasetId) -> Result<Dataset, MarketError>;

    /// Number of datasets ever uploaded.
    fn total_datasets(&self) -> u64;

    /// Page through publicly listed datasets.
    fn public_dataset_page(&self, start: u64, limit: u64) -> PublicPage;

    /// Ids uploaded by `caller`.
    fn my_dataset_ids(&self, caller: Address) -> Vec<DatasetId>;

    /// Ids purchased by `caller`.
    fn my_purchased_ids(&self, caller: Address) -> Vec<DatasetId>;

    /// Accumulated earnings of `caller`.
    fn my_earnings(&self, caller: Address) -> U256;

    /// Earnings of one dataset. Uploader or platform admin only.
    fn dataset_earnings(&self, caller: Address, id: DatasetId) -> Result<U256, MarketError>;

    /// Returns true if purchases may settle in `token`.
    fn is_token_accepted(&self, token: Address) -> bool;

    /// Allow-listed tokens in insertion order.
    fn payment_tokens(&self) -> Vec<PaymentToken>;

    /// Evaluate the view predicate for `caller`.
    fn can_view(&self, caller: Address, id: DatasetId) -> Result<bool, MarketError>;

    /// Evaluate the download predicate for `caller`.
    fn can_download(&self, caller: Address, id: DatasetId) -> Result<bool, MarketError>;
}

//! # Marketplace Service
//!
//! Composes the registry with the outbound ports and implements
//! [`DatasetMarketApi`].
//!
//! ## Serialisation
//!
//! Every mutating entry point first takes the [`ReentrancyGuard`] and holds it
//! until it returns. A second mutating call while the guard is held, from
//! another thread or from inside the token transfer, fails with
//! [`MarketError::ReentrantCall`] and changes nothing.
//!
//! The registry itself sits behind a mutex that is never held across the
//! external transfer. Read entry points stay available while a purchase is
//! waiting on the token and observe the state from before the purchase.
//!
//! ## Purchase ordering
//!
//! 1. guard, then every precondition under the lock ([`plan_purchase`])
//! 2. lock released, `transfer_from` on the token
//! 3. on success only: lock, [`commit_purchase`], publish
//!
//! A failed transfer returns before step 3, so no write has happened.

use crate::adapters::SystemClock;
use crate::config::{ConfigError, MarketConfig};
use crate::domain::entities::{Dataset, PaymentToken, PublicPage, UploadRequest};
use crate::domain::guard::ReentrancyGuard;
use crate::domain::invariants::{check_all_invariants, InvariantCheckResult};
use crate::domain::pagination::public_page;
use crate::domain::registry::{Counter, Registry};
use crate::domain::settlement::{commit_purchase, plan_purchase};
use crate::domain::value_objects::{Address, DatasetId, U256};
use crate::errors::{MarketError, SnapshotError};
use crate::events::MarketEvent;
use crate::ports::inbound::DatasetMarketApi;
use crate::ports::outbound::{Clock, EventSink, TokenGateway};
use crate::snapshot::{LedgerSnapshot, SNAPSHOT_VERSION};

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Counters of committed and rejected calls.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MarketStats {
    /// Datasets uploaded.
    pub uploads: u64,
    /// Purchases settled.
    pub purchases: u64,
    /// View increments committed.
    pub views: u64,
    /// Download increments committed.
    pub downloads: u64,
    /// Payment tokens allow-listed, seeded ones included.
    pub tokens_added: u64,
    /// Mutating calls rejected for any reason.
    pub rejected_calls: u64,
    /// Rejections caused by a failed token transfer.
    pub transfer_failures: u64,
}

/// The dataset marketplace.
pub struct Marketplace<T: TokenGateway, E: EventSink> {
    config: MarketConfig,
    registry: Mutex<Registry>,
    guard: ReentrancyGuard,
    tokens: Arc<T>,
    events: Arc<E>,
    clock: Arc<dyn Clock>,
    stats: Mutex<MarketStats>,
}

impl<T: TokenGateway, E: EventSink> Marketplace<T, E> {
    /// Create an empty marketplace and allow-list the configured tokens.
    pub fn new(config: MarketConfig, tokens: Arc<T>, events: Arc<E>) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::assemble(config, Registry::new(), tokens, events)
    }

    /// Rebuild a marketplace from a snapshot.
    ///
    /// The snapshot must match the configured admin and pass every invariant
    /// check. Configured tokens missing from the snapshot are allow-listed.
    pub fn restore(
        config: MarketConfig,
        snapshot: LedgerSnapshot,
        tokens: Arc<T>,
        events: Arc<E>,
    ) -> Result<Self, SnapshotError> {
        config
            .validate()
            .map_err(|e| SnapshotError::Config(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Config(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        if snapshot.admin != config.admin {
            return Err(SnapshotError::Config(format!(
                "snapshot admin {} differs from configured admin {}",
                snapshot.admin, config.admin
            )));
        }
        if let InvariantCheckResult::Invalid(violations) = check_all_invariants(&snapshot.registry)
        {
            return Err(SnapshotError::Invariant(
                violations.iter().map(ToString::to_string).collect(),
            ));
        }

        let total = snapshot.registry.total();
        let market = Self::assemble(config, snapshot.registry, tokens, events)
            .map_err(|e| SnapshotError::Config(e.to_string()))?;
        info!(datasets = total, "marketplace restored from snapshot");
        Ok(market)
    }

    fn assemble(
        config: MarketConfig,
        mut registry: Registry,
        tokens: Arc<T>,
        events: Arc<E>,
    ) -> Result<Self, ConfigError> {
        let mut seeded = Vec::new();
        for (token, symbol) in &config.initial_tokens {
            if registry.allowlist().is_accepted(token) {
                continue;
            }
            let added = registry
                .add_payment_token(*token, symbol)
                .map_err(|e| ConfigError::InvalidValue {
                    key: "initial_tokens".to_string(),
                    reason: e.to_string(),
                })?;
            seeded.push(MarketEvent::PaymentTokenAdded {
                token: added.address,
                symbol: added.symbol.clone(),
            });
        }

        let market = Self {
            stats: Mutex::new(MarketStats {
                tokens_added: seeded.len() as u64,
                ..MarketStats::default()
            }),
            config,
            registry: Mutex::new(registry),
            guard: ReentrancyGuard::new(),
            tokens,
            events,
            clock: Arc::new(SystemClock),
        };
        for event in seeded {
            market.events.publish(event);
        }
        info!(
            admin = %market.config.admin,
            tokens = market.registry.lock().allowlist().len(),
            "marketplace ready"
        );
        Ok(market)
    }

    /// Replace the clock used to stamp uploads.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// The token port purchases settle through.
    pub fn token_gateway(&self) -> &Arc<T> {
        &self.tokens
    }

    /// The sink events are published to.
    pub fn event_sink(&self) -> &Arc<E> {
        &self.events
    }

    /// Current statistics.
    pub fn stats(&self) -> MarketStats {
        self.stats.lock().clone()
    }

    /// Returns true while a mutating call is in flight.
    pub fn is_busy(&self) -> bool {
        self.guard.is_entered()
    }

    /// Copy of the full ledger state.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot::new(self.config.admin, self.registry.lock().clone())
    }

    /// Run every invariant check against the live state.
    pub fn audit(&self) -> InvariantCheckResult {
        check_all_invariants(&self.registry.lock())
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn rejected(&self, operation: &'static str, caller: Address, err: MarketError) -> MarketError {
        warn!(
            operation,
            %caller,
            error = %err,
            category = ?err.category(),
            "call rejected"
        );
        let mut stats = self.stats.lock();
        stats.rejected_calls += 1;
        if matches!(err, MarketError::TransferFailed(_)) {
            stats.transfer_failures += 1;
        }
        err
    }

    fn publish_all(&self, events: Vec<MarketEvent>) {
        for event in events {
            debug!(event = event.name(), "publishing event");
            self.events.publish(event);
        }
    }

    fn do_upload(&self, caller: Address, request: UploadRequest) -> Result<DatasetId, MarketError> {
        let _entry = self.guard.enter()?;
        let created_at = self.clock.now();

        let (id, events) = {
            let mut registry = self.registry.lock();
            let dataset = registry.upload(caller, request, created_at)?;
            (dataset.id, MarketEvent::for_upload(dataset))
        };

        self.stats.lock().uploads += 1;
        info!(id, listed = events.len() > 1, "dataset uploaded");
        self.publish_all(events);
        Ok(id)
    }

    fn do_increment(
        &self,
        caller: Address,
        id: DatasetId,
        counter: Counter,
    ) -> Result<u64, MarketError> {
        let _entry = self.guard.enter()?;
        if caller.is_zero() {
            return Err(MarketError::InvalidIdentity(caller));
        }

        let value = self.registry.lock().increment(id, &caller, counter)?;

        let mut stats = self.stats.lock();
        match counter {
            Counter::Views => stats.views += 1,
            Counter::Downloads => stats.downloads += 1,
        }
        debug!(id, counter = counter.name(), value, "counter incremented");
        Ok(value)
    }

    fn do_purchase(&self, caller: Address, id: DatasetId, token: Address) -> Result<(), MarketError> {
        let _entry = self.guard.enter()?;

        let plan = plan_purchase(&self.registry.lock(), id, &caller, &token)?;

        // Registry unlocked: the token may call back into read entry points.
        if let Err(err) = self.tokens.transfer_from(
            plan.token,
            self.config.market_address,
            plan.buyer,
            plan.uploader,
            plan.amount,
        ) {
            error!(
                id,
                token = %plan.token,
                amount = %plan.amount,
                error = %err,
                "token transfer failed, purchase aborted"
            );
            return Err(err.into());
        }

        commit_purchase(&mut self.registry.lock(), &plan)?;

        self.stats.lock().purchases += 1;
        info!(
            id,
            uploader = %plan.uploader,
            amount = %plan.amount,
            "dataset purchased"
        );
        self.events.publish(MarketEvent::DatasetPurchased {
            id: plan.id,
            buyer: plan.buyer,
            uploader: plan.uploader,
            token: plan.token,
            amount: plan.amount,
        });
        Ok(())
    }

    fn do_add_payment_token(
        &self,
        caller: Address,
        token: Address,
        symbol: &str,
    ) -> Result<(), MarketError> {
        let _entry = self.guard.enter()?;
        if caller.is_zero() {
            return Err(MarketError::InvalidIdentity(caller));
        }
        if caller != self.config.admin {
            return Err(MarketError::NotAdmin(caller));
        }

        let event = {
            let mut registry = self.registry.lock();
            let added = registry.add_payment_token(token, symbol)?;
            MarketEvent::PaymentTokenAdded {
                token: added.address,
                symbol: added.symbol.clone(),
            }
        };

        self.stats.lock().tokens_added += 1;
        info!(%token, symbol, "payment token accepted");
        self.events.publish(event);
        Ok(())
    }
}

impl<T: TokenGateway, E: EventSink> DatasetMarketApi for Marketplace<T, E> {
    #[instrument(skip(self, request), fields(caller = %caller, cid = %request.dataset_cid))]
    fn upload(&self, caller: Address, request: UploadRequest) -> Result<DatasetId, MarketError> {
        self.do_upload(caller, request)
            .map_err(|e| self.rejected("upload", caller, e))
    }

    #[instrument(skip(self), fields(caller = %caller))]
    fn increment_views(&self, caller: Address, id: DatasetId) -> Result<u64, MarketError> {
        self.do_increment(caller, id, Counter::Views)
            .map_err(|e| self.rejected("increment_views", caller, e))
    }

    #[instrument(skip(self), fields(caller = %caller))]
    fn increment_downloads(&self, caller: Address, id: DatasetId) -> Result<u64, MarketError> {
        self.do_increment(caller, id, Counter::Downloads)
            .map_err(|e| self.rejected("increment_downloads", caller, e))
    }

    #[instrument(skip(self), fields(caller = %caller, token = %token))]
    fn purchase(&self, caller: Address, id: DatasetId, token: Address) -> Result<(), MarketError> {
        self.do_purchase(caller, id, token)
            .map_err(|e| self.rejected("purchase", caller, e))
    }

    #[instrument(skip(self), fields(caller = %caller, token = %token))]
    fn add_payment_token(
        &self,
        caller: Address,
        token: Address,
        symbol: &str,
    ) -> Result<(), MarketError> {
        self.do_add_payment_token(caller, token, symbol)
            .map_err(|e| self.rejected("add_payment_token", caller, e))
    }

    fn get_dataset(&self, caller: Address, id: DatasetId) -> Result<Dataset, MarketError> {
        self.registry.lock().view(id, &caller).cloned()
    }

    fn total_datasets(&self) -> u64 {
        self.registry.lock().total()
    }

    fn public_dataset_page(&self, start: u64, limit: u64) -> PublicPage {
        let registry = self.registry.lock();
        let page = public_page(registry.datasets(), start, limit);
        debug!(start, limit, returned = page.datasets.len(), next = ?page.next_start, "public page");
        page
    }

    fn my_dataset_ids(&self, caller: Address) -> Vec<DatasetId> {
        self.registry.lock().dataset_ids_of(&caller).to_vec()
    }

    fn my_purchased_ids(&self, caller: Address) -> Vec<DatasetId> {
        self.registry.lock().purchased_ids_of(&caller).to_vec()
    }

    fn my_earnings(&self, caller: Address) -> U256 {
        self.registry.lock().earnings_of(&caller)
    }

    fn dataset_earnings(&self, caller: Address, id: DatasetId) -> Result<U256, MarketError> {
        self.registry
            .lock()
            .dataset_earnings(id, &caller, &self.config.admin)
    }

    fn is_token_accepted(&self, token: Address) -> bool {
        self.registry.lock().allowlist().is_accepted(&token)
    }

    fn payment_tokens(&self) -> Vec<PaymentToken> {
        self.registry.lock().allowlist().tokens().to_vec()
    }

    fn can_view(&self, caller: Address, id: DatasetId) -> Result<bool, MarketError> {
        self.registry.lock().can_view(id, &caller)
    }

    fn can_download(&self, caller: Address, id: DatasetId) -> Result<bool, MarketError> {
        self.registry.lock().can_download(id, &caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryEventLog, InMemoryTokenLedger, ManualClock};
    use crate::errors::TransferError;

    const ADMIN: Address = Address::repeat_byte(0xad);
    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);
    const USDC: Address = Address::repeat_byte(0x70);

    type TestMarket = Marketplace<InMemoryTokenLedger, InMemoryEventLog>;

    fn market() -> TestMarket {
        let config = MarketConfig::new(ADMIN).with_token(USDC, "USDC");
        Marketplace::new(
            config,
            Arc::new(InMemoryTokenLedger::new()),
            Arc::new(InMemoryEventLog::new()),
        )
        .unwrap()
        .with_clock(Arc::new(ManualClock::new(1_700_000_000)))
    }

    fn fund(market: &TestMarket, buyer: Address, amount: u64) {
        let ledger = market.token_gateway();
        ledger.mint(USDC, buyer, U256::from(amount)).unwrap();
        ledger
            .approve(USDC, buyer, market.config().market_address, U256::from(amount))
            .unwrap();
    }

    #[test]
    fn test_new_seeds_tokens_and_emits_events() {
        let market = market();
        assert!(market.is_token_accepted(USDC));
        let events = market.event_sink().all();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.name(), "payment_token_added");
        assert_eq!(market.stats().tokens_added, 1);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = TestMarket::new(
            MarketConfig::default(),
            Arc::new(InMemoryTokenLedger::new()),
            Arc::new(InMemoryEventLog::new()),
        );
        assert!(matches!(result, Err(ConfigError::ZeroAdmin)));
    }

    #[test]
    fn test_upload_stamps_clock_and_publishes() {
        let market = market();
        let id = market
            .upload(ALICE, UploadRequest::public("cid", "report"))
            .unwrap();
        assert_eq!(id, 0);
        assert_eq!(
            market.get_dataset(ALICE, 0).unwrap().created_at,
            1_700_000_000
        );
        let names: Vec<_> = market
            .event_sink()
            .since(1)
            .iter()
            .map(|r| r.event.name())
            .collect();
        assert_eq!(names, vec!["dataset_uploaded", "public_listed"]);
    }

    #[test]
    fn test_rejected_upload_publishes_nothing() {
        let market = market();
        market.upload(ALICE, UploadRequest::public("cid", "r")).unwrap();
        let before = market.event_sink().len();

        let err = market
            .upload(BOB, UploadRequest::public("cid", "other"))
            .unwrap_err();
        assert_eq!(err, MarketError::DuplicateCid("cid".into()));
        assert_eq!(market.event_sink().len(), before);
        assert_eq!(market.total_datasets(), 1);
        assert_eq!(market.stats().rejected_calls, 1);
    }

    #[test]
    fn test_purchase_settles_and_moves_funds() {
        let market = market();
        market.upload(ALICE, UploadRequest::paid("cid", "r", 10u64)).unwrap();
        fund(&market, BOB, 25);

        market.purchase(BOB, 0, USDC).unwrap();

        assert!(market.can_download(BOB, 0).unwrap());
        assert_eq!(market.my_purchased_ids(BOB), vec![0]);
        assert_eq!(market.my_earnings(ALICE), U256::from(10));
        assert_eq!(market.dataset_earnings(ALICE, 0).unwrap(), U256::from(10));
        assert_eq!(market.dataset_earnings(ADMIN, 0).unwrap(), U256::from(10));
        assert_eq!(market.token_gateway().balance_of(USDC, BOB), U256::from(15));
        assert_eq!(market.token_gateway().balance_of(USDC, ALICE), U256::from(10));
        assert_eq!(market.stats().purchases, 1);
        assert!(market.audit().is_valid());
    }

    #[test]
    fn test_failed_transfer_writes_nothing() {
        let market = market();
        market.upload(ALICE, UploadRequest::paid("cid", "r", 10u64)).unwrap();
        fund(&market, BOB, 5);
        let before = market.snapshot();
        let events_before = market.event_sink().len();

        let err = market.purchase(BOB, 0, USDC).unwrap_err();
        assert!(matches!(
            err,
            MarketError::TransferFailed(TransferError::InsufficientAllowance { .. })
        ));
        assert_eq!(market.snapshot(), before);
        assert_eq!(market.event_sink().len(), events_before);
        assert_eq!(market.stats().transfer_failures, 1);
        assert!(!market.is_busy());
    }

    #[test]
    fn test_admin_only_token_management() {
        let market = market();
        let dai = Address::repeat_byte(0x71);

        assert_eq!(
            market.add_payment_token(ALICE, dai, "DAI").unwrap_err(),
            MarketError::NotAdmin(ALICE)
        );
        assert_eq!(
            market.add_payment_token(Address::ZERO, dai, "DAI").unwrap_err(),
            MarketError::InvalidIdentity(Address::ZERO)
        );
        market.add_payment_token(ADMIN, dai, "DAI").unwrap();
        assert_eq!(
            market.add_payment_token(ADMIN, dai, "DAI").unwrap_err(),
            MarketError::TokenAlreadyAccepted(dai)
        );
        let symbols: Vec<_> = market
            .payment_tokens()
            .into_iter()
            .map(|t| t.symbol)
            .collect();
        assert_eq!(symbols, vec!["USDC", "DAI"]);
    }

    #[test]
    fn test_dataset_earnings_denied_to_strangers() {
        let market = market();
        market.upload(ALICE, UploadRequest::paid("cid", "r", 1u64)).unwrap();
        assert_eq!(
            market.dataset_earnings(BOB, 0).unwrap_err(),
            MarketError::AccessDenied { id: 0, caller: BOB }
        );
    }

    #[test]
    fn test_zero_caller_cannot_increment() {
        let market = market();
        market.upload(ALICE, UploadRequest::public("cid", "r")).unwrap();
        assert_eq!(
            market.increment_views(Address::ZERO, 0).unwrap_err(),
            MarketError::InvalidIdentity(Address::ZERO)
        );
        assert_eq!(market.increment_views(BOB, 0).unwrap(), 1);
        assert_eq!(market.stats().views, 1);
    }

    #[test]
    fn test_restore_round_trip() {
        let market = market();
        market.upload(ALICE, UploadRequest::paid("cid", "r", 10u64)).unwrap();
        fund(&market, BOB, 10);
        market.purchase(BOB, 0, USDC).unwrap();

        let json = market.snapshot().to_json().unwrap();
        let restored = TestMarket::restore(
            market.config().clone(),
            LedgerSnapshot::from_json(&json).unwrap(),
            Arc::new(InMemoryTokenLedger::new()),
            Arc::new(InMemoryEventLog::new()),
        )
        .unwrap();

        assert_eq!(restored.snapshot(), market.snapshot());
        // Seed token already present: nothing re-announced.
        assert!(restored.event_sink().is_empty());
        assert_eq!(
            restored.purchase(BOB, 0, USDC).unwrap_err(),
            MarketError::AlreadyPurchased { id: 0, buyer: BOB }
        );
    }

    #[test]
    fn test_restore_rejects_other_admin() {
        let snapshot = market().snapshot();
        let result = TestMarket::restore(
            MarketConfig::new(ALICE),
            snapshot,
            Arc::new(InMemoryTokenLedger::new()),
            Arc::new(InMemoryEventLog::new()),
        );
        assert!(matches!(result, Err(SnapshotError::Config(_))));
    }
}

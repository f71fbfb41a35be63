//! # Purchase Settlement
//!
//! Settlement is split in two so the external token transfer can sit between
//! the halves (checks, interaction, effects):
//!
//! 1. [`plan_purchase`] runs every precondition against a shared borrow and
//!    precomputes the new earnings totals. It writes nothing.
//! 2. The caller performs the token transfer.
//! 3. [`commit_purchase`] writes the grant, the buyer index and both earnings
//!    totals, and is only ever called after the transfer reported success.
//!
//! The re-entrancy guard held by the service keeps the registry unchanged
//! between steps 1 and 3, so the plan cannot go stale.

use crate::domain::registry::Registry;
use crate::domain::value_objects::{Address, DatasetId, U256};
use crate::errors::MarketError;

/// A validated purchase waiting for its token transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementPlan {
    /// Dataset being bought.
    pub id: DatasetId,
    /// Buyer receiving the grant.
    pub buyer: Address,
    /// Uploader receiving the payment.
    pub uploader: Address,
    /// Payment token.
    pub token: Address,
    /// Amount to transfer (the dataset price).
    pub amount: U256,
    /// Dataset earnings after settlement.
    dataset_earnings: U256,
    /// Uploader earnings after settlement.
    publisher_earnings: U256,
}

/// Check every purchase precondition and build the settlement plan.
///
/// Failure order: unknown dataset, zero buyer, not public, not paid, already
/// purchased, self purchase, token not accepted, earnings overflow.
pub fn plan_purchase(
    registry: &Registry,
    id: DatasetId,
    buyer: &Address,
    token: &Address,
) -> Result<SettlementPlan, MarketError> {
    let dataset = registry.get(id)?;

    if buyer.is_zero() {
        return Err(MarketError::InvalidIdentity(*buyer));
    }
    if !dataset.is_publicly_listed() {
        return Err(MarketError::NotPublic(id));
    }
    if !dataset.is_paid {
        return Err(MarketError::NotPaid(id));
    }
    if registry.has_grant(id, buyer) {
        return Err(MarketError::AlreadyPurchased { id, buyer: *buyer });
    }
    if *buyer == dataset.uploader {
        return Err(MarketError::SelfPurchase(id));
    }
    if !registry.allowlist().is_accepted(token) {
        return Err(MarketError::TokenNotAccepted(*token));
    }

    let amount = dataset.price;
    let dataset_earnings = checked_credit(dataset.earnings, amount)?;
    let publisher_earnings = checked_credit(registry.earnings_of(&dataset.uploader), amount)?;

    Ok(SettlementPlan {
        id,
        buyer: *buyer,
        uploader: dataset.uploader,
        token: *token,
        amount,
        dataset_earnings,
        publisher_earnings,
    })
}

/// Apply a settled purchase.
///
/// The dataset lookup happens before any write, so an error leaves the
/// registry untouched.
pub fn commit_purchase(registry: &mut Registry, plan: &SettlementPlan) -> Result<(), MarketError> {
    let dataset = registry.get_mut(plan.id)?;
    dataset.earnings = plan.dataset_earnings;

    registry.grants.insert((plan.id, plan.buyer));
    registry
        .purchases
        .entry(plan.buyer)
        .or_default()
        .push(plan.id);
    registry
        .publisher_earnings
        .insert(plan.uploader, plan.publisher_earnings);
    Ok(())
}

fn checked_credit(current: U256, amount: U256) -> Result<U256, MarketError> {
    current
        .checked_add(amount)
        .ok_or(MarketError::EarningsOverflow { current, amount })
}

//! # Token Allowlist
//!
//! Ordered list of payment tokens the platform accepts for settlement.
//! Tokens are only ever appended; the list stays small, so lookups scan it.

use crate::domain::entities::PaymentToken;
use crate::domain::value_objects::Address;
use crate::errors::MarketError;
use serde::{Deserialize, Serialize};

/// Accepted payment tokens in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAllowlist {
    tokens: Vec<PaymentToken>,
}

impl TokenAllowlist {
    /// Create an empty allowlist.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token.
    ///
    /// Rejects the zero identity and tokens already listed. Admin checks are
    /// the caller's responsibility.
    pub fn add(&mut self, token: Address, symbol: &str) -> Result<&PaymentToken, MarketError> {
        if token.is_zero() {
            return Err(MarketError::InvalidIdentity(token));
        }
        if self.tokens.iter().any(|t| t.address == token) {
            return Err(MarketError::TokenAlreadyAccepted(token));
        }
        self.tokens.push(PaymentToken {
            address: token,
            accepted: true,
            symbol: symbol.to_string(),
        });
        self.tokens
            .last()
            .ok_or(MarketError::TokenNotAccepted(token))
    }

    /// Returns true if settlement may use this token.
    #[must_use]
    pub fn is_accepted(&self, token: &Address) -> bool {
        self.tokens
            .iter()
            .any(|t| t.address == *token && t.accepted)
    }

    /// Looks up a listed token.
    #[must_use]
    pub fn get(&self, token: &Address) -> Option<&PaymentToken> {
        self.tokens.iter().find(|t| t.address == *token)
    }

    /// All listed tokens in insertion order.
    #[must_use]
    pub fn tokens(&self) -> &[PaymentToken] {
        &self.tokens
    }

    /// Number of listed tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if no token is listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

//! # Market Configuration
//!
//! Construction-time settings of a [`crate::service::Marketplace`].

use crate::domain::value_objects::Address;
use std::collections::HashSet;
use thiserror::Error;

/// Identity the market spends buyer allowances under, unless configured.
pub const DEFAULT_MARKET_ADDRESS: Address = Address::repeat_byte(0xd5);

/// Errors validating a [`MarketConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The platform admin identity is zero.
    #[error("platform admin must not be the zero identity")]
    ZeroAdmin,

    /// The market spender identity is zero.
    #[error("market address must not be the zero identity")]
    ZeroMarketAddress,

    /// A seeded payment token is the zero identity.
    #[error("seeded payment token {symbol} has the zero identity")]
    ZeroToken {
        /// Symbol of the offending entry.
        symbol: String,
    },

    /// The same payment token is seeded twice.
    #[error("payment token seeded twice: {0}")]
    DuplicateToken(Address),

    /// A configuration value could not be parsed.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Setting name.
        key: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Marketplace configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketConfig {
    /// Platform admin: may allow-list tokens and read any dataset's earnings.
    pub admin: Address,
    /// Spender identity used for `transfer_from`. Buyers approve this address.
    pub market_address: Address,
    /// Payment tokens allow-listed at construction, in order.
    pub initial_tokens: Vec<(Address, String)>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            admin: Address::ZERO,
            market_address: DEFAULT_MARKET_ADDRESS,
            initial_tokens: Vec::new(),
        }
    }
}

impl MarketConfig {
    /// Config with the given admin and no seeded tokens.
    #[must_use]
    pub fn new(admin: Address) -> Self {
        Self {
            admin,
            ..Self::default()
        }
    }

    /// Add a payment token to seed at construction.
    #[must_use]
    pub fn with_token(mut self, token: Address, symbol: impl Into<String>) -> Self {
        self.initial_tokens.push((token, symbol.into()));
        self
    }

    /// Override the spender identity.
    #[must_use]
    pub fn with_market_address(mut self, market_address: Address) -> Self {
        self.market_address = market_address;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin.is_zero() {
            return Err(ConfigError::ZeroAdmin);
        }
        if self.market_address.is_zero() {
            return Err(ConfigError::ZeroMarketAddress);
        }
        let mut seen = HashSet::new();
        for (token, symbol) in &self.initial_tokens {
            if token.is_zero() {
                return Err(ConfigError::ZeroToken {
                    symbol: symbol.clone(),
                });
            }
            if !seen.insert(*token) {
                return Err(ConfigError::DuplicateToken(*token));
            }
        }
        Ok(())
    }
}

//! # In-Memory Token Ledger
//!
//! Balances and allowances for any number of fungible tokens, implementing the
//! transfer-from capability the market settles through. Used by tests and by
//! development nodes; production deployments plug in a real token client.

use crate::domain::value_objects::{Address, U256};
use crate::errors::TransferError;
use crate::ports::outbound::TokenGateway;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Default)]
struct Book {
    tokens: HashSet<Address>,
    /// (token, owner) -> balance
    balances: HashMap<(Address, Address), U256>,
    /// (token, owner, spender) -> allowance
    allowances: HashMap<(Address, Address, Address), U256>,
}

impl Book {
    fn balance(&self, token: Address, owner: Address) -> U256 {
        self.balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default()
    }

    fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default()
    }
}

/// Multi-token balance book.
#[derive(Debug, Default)]
pub struct InMemoryTokenLedger {
    book: RwLock<Book>,
}

impl InMemoryTokenLedger {
    /// Create an empty ledger with no tokens.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a token known without minting anything.
    pub fn register_token(&self, token: Address) {
        self.book.write().tokens.insert(token);
    }

    /// Credit `amount` of `token` to `to`, registering the token if needed.
    pub fn mint(&self, token: Address, to: Address, amount: U256) -> Result<U256, TransferError> {
        let mut book = self.book.write();
        let balance = book
            .balance(token, to)
            .checked_add(amount)
            .ok_or_else(|| TransferError::Rejected("balance overflow".to_string()))?;
        book.tokens.insert(token);
        book.balances.insert((token, to), balance);
        Ok(balance)
    }

    /// Set the allowance `owner` grants `spender`.
    pub fn approve(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), TransferError> {
        let mut book = self.book.write();
        if !book.tokens.contains(&token) {
            return Err(TransferError::UnknownToken(token));
        }
        book.allowances.insert((token, owner, spender), amount);
        Ok(())
    }

    /// Balance of `owner`.
    #[must_use]
    pub fn balance_of(&self, token: Address, owner: Address) -> U256 {
        self.book.read().balance(token, owner)
    }

    /// Allowance `owner` granted `spender`.
    #[must_use]
    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.book.read().allowance(token, owner, spender)
    }
}

impl TokenGateway for InMemoryTokenLedger {
    fn transfer_from(
        &self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TransferError> {
        let mut book = self.book.write();
        if !book.tokens.contains(&token) {
            return Err(TransferError::UnknownToken(token));
        }

        let approved = book.allowance(token, from, spender);
        if approved < amount {
            return Err(TransferError::InsufficientAllowance {
                required: amount,
                approved,
            });
        }
        let available = book.balance(token, from);
        if available < amount {
            return Err(TransferError::InsufficientBalance {
                required: amount,
                available,
            });
        }

        // Every check passed; the writes below cannot fail.
        if from != to {
            let credited = book
                .balance(token, to)
                .checked_add(amount)
                .ok_or_else(|| TransferError::Rejected("balance overflow".to_string()))?;
            book.balances.insert((token, from), available - amount);
            book.balances.insert((token, to), credited);
        }
        book.allowances
            .insert((token, from, spender), approved - amount);

        debug!(%token, %from, %to, %amount, "token transfer settled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: Address = Address::repeat_byte(0x70);
    const MARKET: Address = Address::repeat_byte(0x99);
    const BUYER: Address = Address::repeat_byte(0x02);
    const SELLER: Address = Address::repeat_byte(0x01);

    fn funded(balance: u64, allowance: u64) -> InMemoryTokenLedger {
        let ledger = InMemoryTokenLedger::new();
        ledger.mint(TOKEN, BUYER, U256::from(balance)).unwrap();
        ledger
            .approve(TOKEN, BUYER, MARKET, U256::from(allowance))
            .unwrap();
        ledger
    }

    #[test]
    fn test_transfer_moves_funds_and_spends_allowance() {
        let ledger = funded(100, 50);
        ledger
            .transfer_from(TOKEN, MARKET, BUYER, SELLER, U256::from(30))
            .unwrap();
        assert_eq!(ledger.balance_of(TOKEN, BUYER), U256::from(70));
        assert_eq!(ledger.balance_of(TOKEN, SELLER), U256::from(30));
        assert_eq!(ledger.allowance(TOKEN, BUYER, MARKET), U256::from(20));
    }

    #[test]
    fn test_insufficient_allowance_moves_nothing() {
        let ledger = funded(100, 5);
        let err = ledger
            .transfer_from(TOKEN, MARKET, BUYER, SELLER, U256::from(10))
            .unwrap_err();
        assert!(matches!(err, TransferError::InsufficientAllowance { .. }));
        assert_eq!(ledger.balance_of(TOKEN, BUYER), U256::from(100));
        assert_eq!(ledger.balance_of(TOKEN, SELLER), U256::zero());
    }

    #[test]
    fn test_insufficient_balance_moves_nothing() {
        let ledger = funded(3, 50);
        let err = ledger
            .transfer_from(TOKEN, MARKET, BUYER, SELLER, U256::from(10))
            .unwrap_err();
        assert_eq!(
            err,
            TransferError::InsufficientBalance {
                required: U256::from(10),
                available: U256::from(3),
            }
        );
        assert_eq!(ledger.allowance(TOKEN, BUYER, MARKET), U256::from(50));
    }

    #[test]
    fn test_unknown_token() {
        let ledger = InMemoryTokenLedger::new();
        assert_eq!(
            ledger
                .transfer_from(TOKEN, MARKET, BUYER, SELLER, U256::one())
                .unwrap_err(),
            TransferError::UnknownToken(TOKEN)
        );
        assert!(ledger.approve(TOKEN, BUYER, MARKET, U256::one()).is_err());
    }

    #[test]
    fn test_mint_overflow_rejected() {
        let ledger = InMemoryTokenLedger::new();
        ledger.mint(TOKEN, BUYER, U256::MAX).unwrap();
        assert!(ledger.mint(TOKEN, BUYER, U256::one()).is_err());
        assert_eq!(ledger.balance_of(TOKEN, BUYER), U256::MAX);
    }
}

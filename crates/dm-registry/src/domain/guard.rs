//! # Re-entrancy Guard
//!
//! A single flag shared by every mutating entry point. It is taken on entry
//! and released when the returned [`GuardEntry`] drops, on success, error or
//! unwind. While it is held any other mutating call fails with
//! [`MarketError::ReentrantCall`], including calls made from inside the
//! external token transfer.

use crate::errors::MarketError;
use std::sync::atomic::{AtomicBool, Ordering};

/// Mutual-exclusion flag over all mutating entry points.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: AtomicBool,
}

impl ReentrancyGuard {
    /// Create a released guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the guard, or fail if a mutating call is already in flight.
    pub fn enter(&self) -> Result<GuardEntry<'_>, MarketError> {
        self.entered
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| MarketError::ReentrantCall)?;
        Ok(GuardEntry { guard: self })
    }

    /// Returns true while a mutating call is in flight.
    #[must_use]
    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }
}

/// Proof of holding the guard. Releases it on drop.
#[derive(Debug)]
#[must_use = "the guard is released as soon as the entry is dropped"]
pub struct GuardEntry<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for GuardEntry<'_> {
    fn drop(&mut self) {
        self.guard.entered.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_enter_rejected() {
        let guard = ReentrancyGuard::new();
        let outer = guard.enter().unwrap();
        assert!(guard.is_entered());
        assert_eq!(guard.enter().unwrap_err(), MarketError::ReentrantCall);
        drop(outer);
        assert!(!guard.is_entered());
    }

    #[test]
    fn test_released_on_error_path() {
        fn failing(guard: &ReentrancyGuard) -> Result<(), MarketError> {
            let _entry = guard.enter()?;
            Err(MarketError::InvalidPrice)
        }

        let guard = ReentrancyGuard::new();
        assert!(failing(&guard).is_err());
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn test_released_on_unwind() {
        let guard = ReentrancyGuard::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _entry = guard.enter().unwrap();
            panic!("transfer blew up");
        }));
        assert!(result.is_err());
        assert!(!guard.is_entered());
    }
}

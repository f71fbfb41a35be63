//! # Ledger Snapshots
//!
//! The complete ledger state as a JSON document. A snapshot is only ever
//! accepted back through [`crate::service::Marketplace::restore`], which
//! re-checks every invariant first. The event history travels with the
//! registry so sequence numbers keep counting up across restarts.

use crate::domain::registry::Registry;
use crate::domain::value_objects::Address;
use crate::events::EventRecord;
use serde::{Deserialize, Serialize};

/// Current snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialisable ledger state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Format version.
    pub version: u32,
    /// Platform admin the ledger ran under.
    pub admin: Address,
    /// Full registry state.
    pub registry: Registry,
    /// Published events in sequence order.
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

impl LedgerSnapshot {
    /// Snapshot of `registry` taken under `admin`.
    #[must_use]
    pub fn new(admin: Address, registry: Registry) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            admin,
            registry,
            events: Vec::new(),
        }
    }

    /// Attach the event history published so far.
    #[must_use]
    pub fn with_events(mut self, events: Vec<EventRecord>) -> Self {
        self.events = events;
        self
    }

    /// Encode as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Decode from JSON. Does not validate the state.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::UploadRequest;
    use crate::events::MarketEvent;

    #[test]
    fn test_json_keeps_registry() {
        let admin = Address::repeat_byte(0xad);
        let mut registry = Registry::new();
        registry.add_payment_token(Address::repeat_byte(7), "USDC").unwrap();
        registry
            .upload(Address::repeat_byte(1), UploadRequest::paid("a", "b", 5u64), 42)
            .unwrap();

        let json = LedgerSnapshot::new(admin, registry.clone()).to_json().unwrap();
        assert!(json.contains("\"version\": 1"));

        let decoded = LedgerSnapshot::from_json(&json).unwrap();
        assert_eq!(decoded.admin, admin);
        assert_eq!(decoded.registry, registry);
    }

    #[test]
    fn test_json_keeps_event_history() {
        let admin = Address::repeat_byte(0xad);
        let record = EventRecord {
            sequence: 0,
            event: MarketEvent::PaymentTokenAdded {
                token: Address::repeat_byte(7),
                symbol: "USDC".into(),
            },
        };
        let snapshot = LedgerSnapshot::new(admin, Registry::new()).with_events(vec![record]);

        let decoded = LedgerSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(decoded.events, snapshot.events);
    }

    #[test]
    fn test_missing_event_history_defaults_empty() {
        let json = LedgerSnapshot::new(Address::repeat_byte(0xad), Registry::new())
            .to_json()
            .unwrap()
            .replace(",\n  \"events\": []", "");
        assert!(!json.contains("events"));
        assert!(LedgerSnapshot::from_json(&json).unwrap().events.is_empty());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(LedgerSnapshot::from_json("{\"version\": 1}").is_err());
    }
}

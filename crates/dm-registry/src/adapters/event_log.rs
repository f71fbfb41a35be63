//! Append-only in-memory event log.

use crate::errors::SnapshotError;
use crate::events::{EventRecord, MarketEvent};
use crate::ports::outbound::EventSink;
use parking_lot::RwLock;
use tracing::trace;

/// Event sink that keeps every published event with a sequence number.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    records: RwLock<Vec<EventRecord>>,
}

impl InMemoryEventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a log from stored records. New events continue the sequence.
    pub fn from_records(records: Vec<EventRecord>) -> Result<Self, SnapshotError> {
        for (position, record) in (0u64..).zip(&records) {
            if record.sequence != position {
                return Err(SnapshotError::EventGap {
                    position,
                    found: record.sequence,
                });
            }
        }
        Ok(Self {
            records: RwLock::new(records),
        })
    }

    /// Records with `sequence >= cursor`, in publication order.
    #[must_use]
    pub fn since(&self, cursor: u64) -> Vec<EventRecord> {
        let records = self.records.read();
        let skip = usize::try_from(cursor).unwrap_or(usize::MAX);
        records.iter().skip(skip).cloned().collect()
    }

    /// Every record.
    #[must_use]
    pub fn all(&self) -> Vec<EventRecord> {
        self.since(0)
    }

    /// Number of events published so far.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.records.read().len() as u64
    }

    /// Returns true if nothing was published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl EventSink for InMemoryEventLog {
    fn publish(&self, event: MarketEvent) {
        let mut records = self.records.write();
        let sequence = records.len() as u64;
        trace!(sequence, event = event.name(), "event appended");
        records.push(EventRecord { sequence, event });
    }
}

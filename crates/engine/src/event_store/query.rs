//! Cross-stream event read filters.
//!
//! Store-wide scans serve audit trails and read model verification. Command
//! handling never goes through here; it loads single streams.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeflow_core::AggregateId;

use super::r#trait::StoredEvent;

/// Filter criteria for store-wide event scans. All fields are conjunctive;
/// `None` means "any".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    pub aggregate_id: Option<AggregateId>,
    /// e.g. "ledger.stock".
    pub aggregate_type: Option<String>,
    /// e.g. "ledger.stock.entry_appended".
    pub event_type: Option<String>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
}

impl EventFilter {
    pub fn for_aggregate_type(aggregate_type: impl Into<String>) -> Self {
        Self {
            aggregate_type: Some(aggregate_type.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, event: &StoredEvent) -> bool {
        if let Some(id) = self.aggregate_id
            && event.aggregate_id != id
        {
            return false;
        }
        if let Some(ref t) = self.aggregate_type
            && event.aggregate_type != *t
        {
            return false;
        }
        if let Some(ref t) = self.event_type
            && event.event_type != *t
        {
            return false;
        }
        if let Some(after) = self.occurred_after
            && event.occurred_at <= after
        {
            return false;
        }
        if let Some(before) = self.occurred_before
            && event.occurred_at >= before
        {
            return false;
        }
        true
    }
}

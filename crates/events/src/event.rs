use chrono::{DateTime, Utc};

/// Contract every domain event satisfies.
///
/// An event is a fact: once committed it is never edited, only followed by
/// newer facts (a cancelled order gets a compensating event, not a rewrite).
/// The schema version exists so old payloads stay readable after the event
/// shape evolves.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name, e.g. `"ledger.stock.entry_appended"`.
    fn event_type(&self) -> &'static str;

    /// Payload schema version.
    fn version(&self) -> u32;

    /// Business time: when the fact happened, not when it was stored.
    fn occurred_at(&self) -> DateTime<Utc>;
}

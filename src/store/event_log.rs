use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{Event, EventEnvelope};

/// Append-only record of everything that happened.
///
/// Sequence ids start at 1, strictly increase, and are never reused.
pub trait EventLog {
    /// Assign the next sequence id and store the event under it.
    fn append_event(&self, authority: &str, when: DateTime<Utc>, event: &Event) -> Result<()>;

    /// All events with an id greater than `last_id`, in ascending id order.
    fn events_to_sync(&self, last_id: u64) -> Result<Vec<EventEnvelope>>;

    fn event_count(&self) -> Result<u64>;

    /// Id of the last event replayed into this store's projection, or 0.
    fn last_synced_event_id(&self) -> Result<u64>;

    fn set_last_synced_event_id(&self, id: u64) -> Result<()>;
}

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{Event, EventEnvelope};
use crate::store::EventLog;

use super::MemoryBackend;

impl EventLog for MemoryBackend {
    fn append_event(&self, authority: &str, when: DateTime<Utc>, event: &Event) -> Result<()> {
        // Read-increment-write: only valid because this type is single-threaded.
        let id = self.last_event_id.get() + 1;
        self.last_event_id.set(id);
        self.events.borrow_mut().push(EventEnvelope {
            id,
            authority: authority.to_string(),
            when,
            event: event.clone(),
        });
        Ok(())
    }

    fn events_to_sync(&self, last_id: u64) -> Result<Vec<EventEnvelope>> {
        // Appends keep the vector sorted by id.
        let events = self.events.borrow();
        let start = events.partition_point(|envelope| envelope.id <= last_id);
        Ok(events[start..].to_vec())
    }

    fn event_count(&self) -> Result<u64> {
        Ok(self.events.borrow().len() as u64)
    }

    fn last_synced_event_id(&self) -> Result<u64> {
        Ok(self.last_synced_event_id.get())
    }

    fn set_last_synced_event_id(&self, id: u64) -> Result<()> {
        self.last_synced_event_id.set(id);
        Ok(())
    }
}

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{Event, EventEnvelope};
use crate::store::EventLog;

use super::item::{EventRecord, Item, Record};
use super::keys::{event_counter_key, sync_state_key};
use super::table::Tables;
use super::SingleTableBackend;

impl<T: Tables> EventLog for SingleTableBackend<T> {
    fn append_event(&self, authority: &str, when: DateTime<Utc>, event: &Event) -> Result<()> {
        // An id is spent even if the insert below fails.
        let id = self.table.increment_counter(&event_counter_key())?;
        self.table
            .put_event(&EventRecord::new(id, authority, when, event))
    }

    fn events_to_sync(&self, last_id: u64) -> Result<Vec<EventEnvelope>> {
        let records = self.table.events_after(last_id)?;
        Ok(records.into_iter().map(EventEnvelope::from).collect())
    }

    fn event_count(&self) -> Result<u64> {
        self.table.event_count()
    }

    fn last_synced_event_id(&self) -> Result<u64> {
        let item = self.table.get_item(&sync_state_key())?;
        Ok(match item.map(|item| item.record) {
            Some(Record::SyncState { last_event_id }) => last_event_id as u64,
            _ => 0,
        })
    }

    fn set_last_synced_event_id(&self, id: u64) -> Result<()> {
        let record = Record::SyncState {
            last_event_id: id as i64,
        };
        self.table.put_item(&Item::new(sync_state_key(), record))
    }
}

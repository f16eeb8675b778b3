use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::error::Result;
use crate::model::{Event, EventEnvelope};
use crate::store::EventLog;

use super::RelationalBackend;

impl EventLog for RelationalBackend {
    fn append_event(&self, authority: &str, when: DateTime<Utc>, event: &Event) -> Result<()> {
        let json = serde_json::to_string(event)?;
        self.conn.execute(
            "INSERT INTO event_log (authority, event_time, event) VALUES (?1, ?2, ?3)",
            params![authority, when, json],
        )?;
        Ok(())
    }

    fn events_to_sync(&self, last_id: u64) -> Result<Vec<EventEnvelope>> {
        // Ids never leave the i64 range.
        let Ok(last_id) = i64::try_from(last_id) else {
            return Ok(Vec::new());
        };
        let mut stmt = self.conn.prepare(
            "SELECT event_id, authority, event_time, event FROM event_log
             WHERE event_id > ?1 ORDER BY event_id",
        )?;
        let rows = stmt
            .query_map([last_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, DateTime<Utc>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, authority, when, json)| {
                Ok(EventEnvelope {
                    id: id as u64,
                    authority,
                    when,
                    event: serde_json::from_str(&json)?,
                })
            })
            .collect()
    }

    fn event_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM event_log", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn last_synced_event_id(&self) -> Result<u64> {
        let id: Option<i64> = self
            .conn
            .query_row(
                "SELECT last_event_id FROM sync_state WHERE sync_id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.unwrap_or(0) as u64)
    }

    fn set_last_synced_event_id(&self, id: u64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_state (sync_id, last_event_id) VALUES (1, ?1)
             ON CONFLICT (sync_id) DO UPDATE SET last_event_id = excluded.last_event_id",
            [id as i64],
        )?;
        Ok(())
    }
}

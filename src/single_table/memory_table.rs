//! An in-process [`Tables`] for tests, with write failure injection.
//!
//! Items and events are held BSON-encoded, so everything written here goes
//! through the same encoding as on a MongoDB server.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::io;

use mongodb::bson;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

use super::item::{EventRecord, Item, Record};
use super::keys::Key;
use super::table::Tables;

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bson::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bson::from_slice(bytes)?)
}

#[derive(Debug, Default)]
pub struct MemoryTables {
    items: RefCell<BTreeMap<Key, Vec<u8>>>,
    events: RefCell<BTreeMap<i64, Vec<u8>>>,
    /// Writes left before injected failures start.
    writes_until_failure: Cell<Option<usize>>,
}

impl MemoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `n - 1` more writes through, then fail every write until
    /// [`heal`](Self::heal) is called.
    pub fn fail_write(&self, n: usize) {
        self.writes_until_failure.set(Some(n.saturating_sub(1)));
    }

    pub fn heal(&self) {
        self.writes_until_failure.set(None);
    }

    fn write(&self) -> Result<()> {
        match self.writes_until_failure.get() {
            None => Ok(()),
            Some(0) => Err(Error::Mongo(mongodb::error::Error::from(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "injected failure",
            )))),
            Some(n) => {
                self.writes_until_failure.set(Some(n - 1));
                Ok(())
            }
        }
    }
}

impl Tables for MemoryTables {
    fn get_item(&self, key: &Key) -> Result<Option<Item>> {
        self.items
            .borrow()
            .get(key)
            .map(|bytes| decode(bytes))
            .transpose()
    }

    fn put_item(&self, item: &Item) -> Result<()> {
        self.write()?;
        let bytes = encode(item)?;
        self.items.borrow_mut().insert(item.key(), bytes);
        Ok(())
    }

    fn delete_item(&self, key: &Key) -> Result<()> {
        self.write()?;
        self.items.borrow_mut().remove(key);
        Ok(())
    }

    fn query(&self, pk: &str, sk_prefix: &str) -> Result<Vec<Item>> {
        let items = self.items.borrow();
        items
            .range(Key::new(pk, sk_prefix)..)
            .take_while(|(key, _)| key.pk == pk && key.sk.starts_with(sk_prefix))
            .map(|(_, bytes)| decode(bytes))
            .collect()
    }

    fn query_email_index(&self, email: &str) -> Result<Vec<Item>> {
        let items = self.scan()?;
        Ok(items
            .into_iter()
            .filter(|item| item.email.as_deref() == Some(email))
            .collect())
    }

    fn scan(&self) -> Result<Vec<Item>> {
        self.items.borrow().values().map(|bytes| decode(bytes)).collect()
    }

    fn increment_counter(&self, key: &Key) -> Result<u64> {
        self.write()?;
        let mut counter = match self.get_item(key)? {
            Some(item) => item,
            None => Item::new(key.clone(), Record::Counter { value: 0 }),
        };
        let value = match &mut counter.record {
            Record::Counter { value } => {
                *value += 1;
                *value
            }
            _ => return Err(Error::internal(format!("{key} is not a counter"))),
        };
        let bytes = encode(&counter)?;
        self.items.borrow_mut().insert(key.clone(), bytes);
        Ok(value as u64)
    }

    fn put_event(&self, event: &EventRecord) -> Result<()> {
        self.write()?;
        let bytes = encode(event)?;
        self.events.borrow_mut().insert(event.id, bytes);
        Ok(())
    }

    fn events_after(&self, id: u64) -> Result<Vec<EventRecord>> {
        let Some(first) = i64::try_from(id).ok().and_then(|id| id.checked_add(1)) else {
            return Ok(Vec::new());
        };
        let events = self.events.borrow();
        events.range(first..).map(|(_, bytes)| decode(bytes)).collect()
    }

    fn event_count(&self) -> Result<u64> {
        Ok(self.events.borrow().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::single_table::keys::{entity_key, NaturalKey};

    #[test]
    fn prefix_query_stays_in_partition() {
        let tables = MemoryTables::new();
        for item in [
            Item::candidate("Pie", "Apple"),
            Item::voter("Pie", "alice"),
            Item::candidate("Pie", "Cherry"),
            Item::candidate("Pies", "Pecan"),
            Item::candidate("Pi", "Zero"),
        ] {
            tables.put_item(&item).unwrap();
        }
        let names: Vec<_> = tables
            .query("ELECTION#Pie", "CANDIDATE#")
            .unwrap()
            .into_iter()
            .map(|item| item.sk)
            .collect();
        assert_eq!(names, vec!["CANDIDATE#Apple", "CANDIDATE#Cherry"]);
        assert_eq!(tables.query("ELECTION#Pie", "").unwrap().len(), 3);
    }

    #[test]
    fn counter_starts_at_one() {
        let tables = MemoryTables::new();
        let key = Key::new("COUNTER#test", "METADATA");
        assert_eq!(tables.increment_counter(&key).unwrap(), 1);
        assert_eq!(tables.increment_counter(&key).unwrap(), 2);

        let candidate = Item::candidate("Pie", "Apple");
        tables.put_item(&candidate).unwrap();
        let err = tables.increment_counter(&candidate.key()).unwrap_err();
        assert!(matches!(err, Error::Internal(_)), "{err:?}");
    }

    #[test]
    fn cursor_past_the_id_range() {
        let tables = MemoryTables::new();
        let event = &crate::testing::examples::events()[0];
        tables
            .put_event(&EventRecord::new(1, "alice", crate::testing::epoch(), event))
            .unwrap();
        assert_eq!(tables.events_after(0).unwrap().len(), 1);
        assert!(tables.events_after(i64::MAX as u64).unwrap().is_empty());
        assert!(tables.events_after(u64::MAX).unwrap().is_empty());
    }

    #[test]
    fn injected_failures() {
        let tables = MemoryTables::new();
        tables.fail_write(2);
        tables.put_item(&Item::candidate("Pie", "Apple")).unwrap();
        let err = tables
            .put_item(&Item::candidate("Pie", "Cherry"))
            .unwrap_err();
        assert!(err.is_backend_unavailable());
        assert!(tables.delete_item(&Key::new("a", "b")).is_err());
        // Reads still work.
        let key = entity_key(NaturalKey::Candidate {
            election: "Pie",
            name: "Apple",
        });
        assert!(tables.get_item(&key).unwrap().is_some());

        tables.heal();
        tables.delete_item(&key).unwrap();
        assert!(tables.get_item(&key).unwrap().is_none());
    }
}

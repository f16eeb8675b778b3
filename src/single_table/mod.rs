//! Single-table NoSQL store.
//!
//! Every entity lives in one table keyed by `(pk, sk)` (see [`keys`]), with
//! one secondary index on `email`. Names are copied wherever they are
//! referenced, and each user partition keeps back-references to those
//! copies. Writes touch one item at a time; multi-item operations are
//! ordered so that running them again after a failure completes them.
//!
//! The physical table is abstracted by [`Tables`]; [`MongoTables`] is the
//! production implementation.

use crate::error::{Error, Result};

mod command;
mod event_log;
mod item;
pub mod keys;
#[cfg(test)]
mod memory_table;
mod mongo;
mod query;
mod table;

pub use item::{EventRecord, Item, Record};
#[cfg(test)]
pub use memory_table::MemoryTables;
pub use mongo::{ensure_indexes_exist, Coll, MongoCollection, MongoTables};
pub use table::Tables;

use keys::{entity_key, NaturalKey};

pub struct SingleTableBackend<T> {
    table: T,
}

impl<T: Tables> SingleTableBackend<T> {
    pub fn new(table: T) -> Self {
        Self { table }
    }

    /// The underlying table.
    pub fn table(&self) -> &T {
        &self.table
    }

    fn get(&self, key: NaturalKey<'_>) -> Result<Option<Item>> {
        self.table.get_item(&entity_key(key))
    }

    fn require_user(&self, name: &str) -> Result<Item> {
        self.get(NaturalKey::User(name))?
            .ok_or_else(|| Error::not_found(format!("User {name}")))
    }

    fn require_election(&self, name: &str) -> Result<Item> {
        self.get(NaturalKey::Election(name))?
            .ok_or_else(|| Error::not_found(format!("Election {name}")))
    }
}

//! [`Tables`] on MongoDB: one `items` collection standing in for the single
//! table, plus an append-only `events` collection.

use std::ops::Deref;

use log::{debug, info};
use mongodb::{
    bson::{doc, Document},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReplaceOptions, ReturnDocument},
    sync::{Client, Collection, Database},
    IndexModel,
};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

use super::item::{EventRecord, Item, Record};
use super::keys::Key;
use super::table::Tables;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

impl MongoCollection for Item {
    const NAME: &'static str = "items";
}

impl MongoCollection for EventRecord {
    const NAME: &'static str = "events";
}

/// A database collection of the given type.
pub struct Coll<T: Send + Sync>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection + Send + Sync,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

impl<T: Send + Sync> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn key_filter(key: &Key) -> Document {
    doc! {"pk": key.pk.as_str(), "sk": key.sk.as_str()}
}

/// Smallest string greater than every string starting with `prefix`, if any.
fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        if let Some(next) = char::from_u32(u32::from(last) + 1) {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

fn collect<T: DeserializeOwned + Unpin + Send + Sync>(
    cursor: mongodb::sync::Cursor<T>,
) -> Result<Vec<T>> {
    Ok(cursor.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub fn ensure_indexes_exist(db: &Database) -> Result<()> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Primary key.
    let key_index = IndexModel::builder()
        .keys(doc! {"pk": 1, "sk": 1})
        .options(unique)
        .build();
    Coll::<Item>::from_db(db).create_index(key_index, None)?;

    // The one secondary index.
    let email_index = IndexModel::builder().keys(doc! {"email": 1}).build();
    Coll::<Item>::from_db(db).create_index(email_index, None)?;

    Ok(())
}

pub struct MongoTables {
    db: Database,
    items: Coll<Item>,
    events: Coll<EventRecord>,
}

impl MongoTables {
    /// Connect to the server at `uri` and prepare the named database.
    pub fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db)?;
        info!("Using MongoDB database {db_name}");
        Ok(Self::from_db(db))
    }

    /// Use an already prepared database.
    pub fn from_db(db: Database) -> Self {
        Self {
            items: Coll::from_db(&db),
            events: Coll::from_db(&db),
            db,
        }
    }

    /// Drop the whole database. Used to clean up after tests.
    pub fn drop_database(&self) -> Result<()> {
        self.db.drop(None)?;
        Ok(())
    }
}

impl Tables for MongoTables {
    fn get_item(&self, key: &Key) -> Result<Option<Item>> {
        Ok(self.items.find_one(key_filter(key), None)?)
    }

    fn put_item(&self, item: &Item) -> Result<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.items
            .replace_one(key_filter(&item.key()), item, options)?;
        Ok(())
    }

    fn delete_item(&self, key: &Key) -> Result<()> {
        self.items.delete_one(key_filter(key), None)?;
        Ok(())
    }

    fn query(&self, pk: &str, sk_prefix: &str) -> Result<Vec<Item>> {
        let mut filter = doc! {"pk": pk};
        if !sk_prefix.is_empty() {
            let mut range = doc! {"$gte": sk_prefix};
            if let Some(upper) = prefix_upper_bound(sk_prefix) {
                range.insert("$lt", upper);
            }
            filter.insert("sk", range);
        }
        let options = FindOptions::builder().sort(doc! {"sk": 1}).build();
        collect(self.items.find(filter, options)?)
    }

    fn query_email_index(&self, email: &str) -> Result<Vec<Item>> {
        collect(self.items.find(doc! {"email": email}, None)?)
    }

    fn scan(&self) -> Result<Vec<Item>> {
        let options = FindOptions::builder().sort(doc! {"pk": 1, "sk": 1}).build();
        collect(self.items.find(None, options)?)
    }

    fn increment_counter(&self, key: &Key) -> Result<u64> {
        let update = doc! {
            "$inc": { "value": 1_i64 },
            "$setOnInsert": { "entity": "counter" },
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let counter = self
            .items
            .find_one_and_update(key_filter(key), update, options)?
            .ok_or_else(|| Error::internal(format!("Counter {key} was not upserted")))?;
        match counter.record {
            Record::Counter { value } => Ok(value as u64),
            _ => Err(Error::internal(format!("{key} is not a counter"))),
        }
    }

    fn put_event(&self, event: &EventRecord) -> Result<()> {
        self.events.insert_one(event, None)?;
        Ok(())
    }

    fn events_after(&self, id: u64) -> Result<Vec<EventRecord>> {
        let Ok(after) = i64::try_from(id) else {
            return Ok(Vec::new());
        };
        let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
        collect(self.events.find(doc! {"_id": {"$gt": after}}, options)?)
    }

    fn event_count(&self) -> Result<u64> {
        Ok(self.events.count_documents(None, None)?)
    }
}

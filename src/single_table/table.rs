use crate::error::Result;

use super::item::{EventRecord, Item};
use super::keys::Key;

/// The physical operations the single-table layout needs from its store:
/// point reads and writes, partition queries, one secondary index, a full
/// scan, an atomic counter, and an append-only event collection.
///
/// Every write is atomic on its own. Nothing spans more than one item.
pub trait Tables {
    fn get_item(&self, key: &Key) -> Result<Option<Item>>;

    /// Insert or replace the item under its key.
    fn put_item(&self, item: &Item) -> Result<()>;

    /// Deleting an absent item succeeds.
    fn delete_item(&self, key: &Key) -> Result<()>;

    /// Items in partition `pk` whose sort key starts with `sk_prefix`,
    /// ordered by sort key.
    fn query(&self, pk: &str, sk_prefix: &str) -> Result<Vec<Item>>;

    /// Items whose `email` attribute equals `email`.
    fn query_email_index(&self, email: &str) -> Result<Vec<Item>>;

    /// Every item, ordered by key.
    fn scan(&self) -> Result<Vec<Item>>;

    /// Atomically increment the counter under `key` and return its new value.
    /// A missing counter starts from zero, so the first call returns 1.
    fn increment_counter(&self, key: &Key) -> Result<u64>;

    fn put_event(&self, event: &EventRecord) -> Result<()>;

    /// Events with an id greater than `id`, in ascending id order.
    fn events_after(&self, id: u64) -> Result<Vec<EventRecord>>;

    fn event_count(&self) -> Result<u64>;
}

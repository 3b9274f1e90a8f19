//! In-memory store backend.
//!
//! Backs every test and self-contained runs: named tables of keyed
//! rows with point reads, last-write-wins writes, and a per-table
//! change feed wired straight into [`Consumer`]s.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::consumer::{Consumer, FieldValues, KeyOpFieldsValues, TableFeed};
use crate::store::{StoreResult, TableRead, TableWrite};

#[derive(Default)]
struct MemDbInner {
    tables: HashMap<String, BTreeMap<String, FieldValues>>,
    feeds: HashMap<String, Vec<TableFeed>>,
}

impl MemDbInner {
    fn publish(&self, table_name: &str, entry: &KeyOpFieldsValues) {
        if let Some(feeds) = self.feeds.get(table_name) {
            for feed in feeds {
                feed.publish(entry.clone());
            }
        }
    }
}

/// Shared in-memory database with change notification.
///
/// Cloning yields another handle to the same data.
#[derive(Clone, Default)]
pub struct MemDb {
    inner: Arc<Mutex<MemDbInner>>,
}

impl MemDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a handle to one table. The table needs no prior setup; it
    /// materializes on first write.
    pub fn table(&self, name: impl Into<String>) -> MemTable {
        MemTable {
            name: name.into(),
            db: self.clone(),
        }
    }

    /// Subscribes a consumer to a table's change feed. Every write to
    /// the table from any handle is delivered to every subscriber.
    pub async fn subscribe(&self, table_name: impl Into<String>) -> Consumer {
        let table_name = table_name.into();
        let (consumer, feed) = Consumer::new(table_name.clone());
        self.inner
            .lock()
            .await
            .feeds
            .entry(table_name)
            .or_default()
            .push(feed);
        consumer
    }
}

/// Handle to one table of a [`MemDb`].
#[derive(Clone)]
pub struct MemTable {
    name: String,
    db: MemDb,
}

impl MemTable {
    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl TableRead for MemTable {
    async fn get(&mut self, key: &str) -> StoreResult<Option<FieldValues>> {
        let inner = self.db.inner.lock().await;
        Ok(inner
            .tables
            .get(&self.name)
            .and_then(|table| table.get(key))
            .cloned())
    }
}

#[async_trait]
impl TableWrite for MemTable {
    async fn set(&mut self, key: &str, fvs: FieldValues) -> StoreResult<()> {
        let mut inner = self.db.inner.lock().await;
        inner
            .tables
            .entry(self.name.clone())
            .or_default()
            .insert(key.to_string(), fvs.clone());
        let entry = KeyOpFieldsValues::set(key, fvs);
        inner.publish(&self.name, &entry);
        Ok(())
    }

    async fn del(&mut self, key: &str) -> StoreResult<()> {
        let mut inner = self.db.inner.lock().await;
        if let Some(table) = inner.tables.get_mut(&self.name) {
            table.remove(key);
        }
        let entry = KeyOpFieldsValues::del(key);
        inner.publish(&self.name, &entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fv(field: &str, value: &str) -> (String, String) {
        (field.to_string(), value.to_string())
    }

    #[tokio::test]
    async fn set_then_get_round_trip() {
        let db = MemDb::new();
        let mut table = db.table("COUNTERS");

        table
            .set("oid:0x1000", vec![fv("SAI_PORT_STAT_IF_IN_ERRORS", "7")])
            .await
            .unwrap();

        let row = table.get("oid:0x1000").await.unwrap().unwrap();
        assert_eq!(row, vec![fv("SAI_PORT_STAT_IF_IN_ERRORS", "7")]);
    }

    #[tokio::test]
    async fn get_missing_row_is_none() {
        let db = MemDb::new();
        let mut table = db.table("COUNTERS");
        assert_eq!(table.get("oid:0xdead").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_replaces_all_fields() {
        let db = MemDb::new();
        let mut table = db.table("TX_MON");

        table
            .set("GLOBAL", vec![fv("threshold", "200"), fv("time_period", "30")])
            .await
            .unwrap();
        table.set("GLOBAL", vec![fv("threshold", "50")]).await.unwrap();

        let row = table.get("GLOBAL").await.unwrap().unwrap();
        assert_eq!(row, vec![fv("threshold", "50")]);
    }

    #[tokio::test]
    async fn del_removes_row() {
        let db = MemDb::new();
        let mut table = db.table("TX_MON");

        table.set("GLOBAL", vec![fv("threshold", "1")]).await.unwrap();
        table.del("GLOBAL").await.unwrap();

        assert_eq!(table.get("GLOBAL").await.unwrap(), None);
        // Deleting again is still fine.
        table.del("GLOBAL").await.unwrap();
    }

    #[tokio::test]
    async fn writes_reach_subscribers() {
        let db = MemDb::new();
        let mut consumer = db.subscribe("TX_MON").await;
        let mut table = db.table("TX_MON");

        table.set("GLOBAL", vec![fv("threshold", "9")]).await.unwrap();
        table.del("GLOBAL").await.unwrap();

        consumer.read_data();
        let entries = consumer.take_pending();
        // Same key: the delete replaced the set in the pending buffer.
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].op, crate::consumer::DEL_COMMAND);
    }

    #[tokio::test]
    async fn unsubscribed_tables_do_not_cross_feed() {
        let db = MemDb::new();
        let mut consumer = db.subscribe("TX_MON").await;
        let mut other = db.table("PORT");

        other.set("Ethernet0", vec![fv("mtu", "9100")]).await.unwrap();

        consumer.read_data();
        assert!(consumer.take_pending().is_empty());
    }

    #[tokio::test]
    async fn bulk_row_uses_empty_key() {
        let db = MemDb::new();
        let mut table = db.table("COUNTERS_PORT_NAME_MAP");

        table
            .set("", vec![fv("Ethernet0", "oid:0x1000")])
            .await
            .unwrap();

        let row = table.get("").await.unwrap().unwrap();
        assert_eq!(row, vec![fv("Ethernet0", "oid:0x1000")]);
    }
}

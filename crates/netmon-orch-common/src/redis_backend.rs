//! Redis store backend.
//!
//! Deployment backend for the store traits: each logical database maps
//! to a Redis database index, each table row to a hash keyed
//! `TABLE<sep>key`, and each table's change feed to a list the
//! producers push JSON-encoded entries onto.

use std::collections::HashMap;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::time;
use tracing::{info, warn};

use crate::consumer::{Consumer, FieldValues, KeyOpFieldsValues, TableFeed};
use crate::store::{StoreError, StoreResult, TableRead, TableWrite};

/// How long one event-queue pop blocks before polling again.
const EVENT_POP_TIMEOUT_SECS: f64 = 1.0;

/// Logical database selector with the deployment's fixed indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedisDb {
    /// Declarative configuration, the source of intent.
    ConfigDb,
    /// Raw per-object counters published by the platform layer.
    CountersDb,
    /// Derived operational state, the reconcilers' output.
    StateDb,
}

impl RedisDb {
    /// Returns the Redis database index.
    pub fn index(&self) -> u32 {
        match self {
            RedisDb::ConfigDb => 4,
            RedisDb::CountersDb => 2,
            RedisDb::StateDb => 6,
        }
    }

    /// Returns the key separator convention for this database.
    pub fn separator(&self) -> char {
        match self {
            RedisDb::ConfigDb => '|',
            RedisDb::CountersDb => ':',
            RedisDb::StateDb => '|',
        }
    }
}

/// Connection parameters for one logical database.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis server hostname or IP
    pub host: String,
    /// Redis server port
    pub port: u16,
    /// Database index
    pub db_index: u32,
    /// Key separator between table name and row key
    pub separator: char,
}

impl RedisConfig {
    /// Creates a configuration for one of the well-known databases.
    pub fn new(host: impl Into<String>, port: u16, db: RedisDb) -> Self {
        Self {
            host: host.into(),
            port,
            db_index: db.index(),
            separator: db.separator(),
        }
    }

    /// Overrides the database index, keeping the separator convention.
    pub fn with_index(mut self, db_index: u32) -> Self {
        self.db_index = db_index;
        self
    }

    fn uri(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db_index)
    }
}

/// Connection to one logical Redis database.
pub struct RedisDatabase {
    config: RedisConfig,
    connection: ConnectionManager,
}

impl RedisDatabase {
    /// Connects; reconnection afterwards is handled by the connection
    /// manager.
    pub async fn new(config: RedisConfig) -> StoreResult<Self> {
        let uri = config.uri();

        let client = redis::Client::open(uri.clone())
            .map_err(|e| StoreError::connection(format!("{}: {}", uri, e)))?;

        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::connection(format!("{}: {}", uri, e)))?;

        info!("Connected to Redis: {} (db={})", config.host, config.db_index);

        Ok(Self { config, connection })
    }

    /// Returns the database configuration.
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Opens a handle to one table.
    pub fn table(&self, name: impl Into<String>) -> RedisTable {
        RedisTable {
            name: name.into(),
            separator: self.config.separator,
            connection: self.connection.clone(),
        }
    }

    /// Subscribes a consumer to a table's change feed.
    ///
    /// A background task pops the table's event queue and forwards
    /// entries into the consumer; queue errors are logged and retried
    /// at the pop cadence, never surfaced to the loop.
    pub fn subscribe(&self, table_name: impl Into<String>) -> Consumer {
        let table_name = table_name.into();
        let (consumer, feed) = Consumer::new(table_name.clone());
        let connection = self.connection.clone();
        tokio::spawn(forward_events(connection, event_queue_key(&table_name), feed));
        consumer
    }
}

/// Key of the list carrying a table's change events.
fn event_queue_key(table_name: &str) -> String {
    format!("{}:events", table_name)
}

async fn forward_events(mut connection: ConnectionManager, queue_key: String, feed: TableFeed) {
    loop {
        let popped: Result<Option<(String, String)>, _> = connection
            .blpop(&queue_key, EVENT_POP_TIMEOUT_SECS)
            .await;

        match popped {
            Ok(Some((_, payload))) => match serde_json::from_str::<KeyOpFieldsValues>(&payload) {
                Ok(entry) => feed.publish(entry),
                Err(e) => {
                    warn!(queue = %queue_key, error = %e, "dropping undecodable event");
                }
            },
            // Pop timed out with nothing queued; go around again.
            Ok(None) => {}
            Err(e) => {
                warn!(queue = %queue_key, error = %e, "event queue read failed");
                time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Handle to one table of a [`RedisDatabase`].
#[derive(Clone)]
pub struct RedisTable {
    name: String,
    separator: char,
    connection: ConnectionManager,
}

impl RedisTable {
    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn row_key(&self, key: &str) -> String {
        if key.is_empty() {
            self.name.clone()
        } else {
            format!("{}{}{}", self.name, self.separator, key)
        }
    }
}

#[async_trait::async_trait]
impl TableRead for RedisTable {
    async fn get(&mut self, key: &str) -> StoreResult<Option<FieldValues>> {
        let row_key = self.row_key(key);
        let fields: HashMap<String, String> = self
            .connection
            .hgetall(&row_key)
            .await
            .map_err(|e| StoreError::command(format!("HGETALL {}: {}", row_key, e)))?;

        if fields.is_empty() {
            // Redis cannot distinguish an absent hash from an empty one.
            return Ok(None);
        }
        Ok(Some(fields.into_iter().collect()))
    }
}

#[async_trait::async_trait]
impl TableWrite for RedisTable {
    async fn set(&mut self, key: &str, fvs: FieldValues) -> StoreResult<()> {
        let row_key = self.row_key(key);

        // Full field replacement, not a merge.
        let _: () = self
            .connection
            .del(&row_key)
            .await
            .map_err(|e| StoreError::command(format!("DEL {}: {}", row_key, e)))?;

        if !fvs.is_empty() {
            let _: () = self
                .connection
                .hset_multiple(&row_key, &fvs)
                .await
                .map_err(|e| StoreError::command(format!("HSET {}: {}", row_key, e)))?;
        }
        Ok(())
    }

    async fn del(&mut self, key: &str) -> StoreResult<()> {
        let row_key = self.row_key(key);
        let _: () = self
            .connection
            .del(&row_key)
            .await
            .map_err(|e| StoreError::command(format!("DEL {}: {}", row_key, e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_uri_and_separator() {
        let config = RedisConfig::new("127.0.0.1", 6379, RedisDb::ConfigDb);
        assert_eq!(config.uri(), "redis://127.0.0.1:6379/4");
        assert_eq!(config.separator, '|');

        let config = RedisConfig::new("127.0.0.1", 6379, RedisDb::CountersDb).with_index(12);
        assert_eq!(config.uri(), "redis://127.0.0.1:6379/12");
        assert_eq!(config.separator, ':');
    }

    #[test]
    fn event_queue_key_format() {
        assert_eq!(event_queue_key("TX_MON"), "TX_MON:events");
    }

    #[test]
    fn event_payload_round_trip() {
        let entry = KeyOpFieldsValues::set(
            "GLOBAL",
            vec![("threshold".to_string(), "200".to_string())],
        );
        let payload = serde_json::to_string(&entry).unwrap();
        let decoded: KeyOpFieldsValues = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn unknown_op_survives_decoding() {
        let payload = r#"{"key":"GLOBAL","op":"FLUSH","fvs":[]}"#;
        let decoded: KeyOpFieldsValues = serde_json::from_str(payload).unwrap();
        assert_eq!(decoded.op, "FLUSH");
        assert_eq!(crate::consumer::Operation::parse(&decoded.op), None);
    }
}

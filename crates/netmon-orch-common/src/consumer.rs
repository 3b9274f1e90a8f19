//! Per-table buffering and coalescing of change notifications.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::selectable::{ReadyNotifier, Selectable, SelectableId};

/// Wire string for an upsert with full field replacement.
pub const SET_COMMAND: &str = "SET";
/// Wire string for a removal.
pub const DEL_COMMAND: &str = "DEL";

/// Classified operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Set operation (add or update, full field replacement)
    Set,
    /// Delete operation
    Del,
}

impl Operation {
    /// Classifies a wire op string. Unknown strings stay unclassified
    /// so the reconciler can reject them per entry instead of the
    /// buffer dropping them silently.
    pub fn parse(op: &str) -> Option<Operation> {
        match op {
            SET_COMMAND => Some(Operation::Set),
            DEL_COMMAND => Some(Operation::Del),
            _ => None,
        }
    }
}

/// A field-value pair from a table row.
pub type FieldValue = (String, String);

/// Ordered field-value pairs for one table row.
pub type FieldValues = Vec<FieldValue>;

/// Key, operation, and field-values tuple from a change notification.
///
/// The op is kept as the raw wire string; [`Operation::parse`]
/// classifies it at the point of use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyOpFieldsValues {
    /// The key (e.g., "Ethernet0", "GLOBAL")
    pub key: String,
    /// The operation as received on the wire
    pub op: String,
    /// Field-value pairs (empty for Del operations)
    pub fvs: FieldValues,
}

impl KeyOpFieldsValues {
    /// Creates a new entry.
    pub fn new(key: impl Into<String>, op: impl Into<String>, fvs: FieldValues) -> Self {
        Self {
            key: key.into(),
            op: op.into(),
            fvs,
        }
    }

    /// Creates a Set entry.
    pub fn set(key: impl Into<String>, fvs: FieldValues) -> Self {
        Self::new(key, SET_COMMAND, fvs)
    }

    /// Creates a Del entry.
    pub fn del(key: impl Into<String>) -> Self {
        Self::new(key, DEL_COMMAND, vec![])
    }

    /// Returns the value for a field, if present.
    pub fn get_field(&self, field: &str) -> Option<&str> {
        self.fvs
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if this entry has the given field.
    pub fn has_field(&self, field: &str) -> bool {
        self.fvs.iter().any(|(f, _)| f == field)
    }
}

/// Producer half of a table subscription. The store side pushes change
/// notifications here; each one wakes the select loop.
#[derive(Debug, Clone)]
pub struct TableFeed {
    data_tx: mpsc::UnboundedSender<KeyOpFieldsValues>,
    notifier: ReadyNotifier,
}

impl TableFeed {
    /// Delivers one notification and signals readiness.
    pub fn publish(&self, entry: KeyOpFieldsValues) {
        if self.data_tx.send(entry).is_ok() {
            self.notifier.notify();
        }
    }
}

/// Buffers one table's change notifications for a reconciler.
///
/// [`read_data`] drains the subscription channel into the pending set,
/// keeping at most one entry per key: a later notification replaces an
/// earlier one wholesale, so the surviving entry carries the op and
/// fields of the most recent notification only. First-seen key order
/// is preserved so dispatch is deterministic for a given notification
/// stream.
///
/// [`read_data`]: Consumer::read_data
pub struct Consumer {
    table_name: String,
    id: SelectableId,
    selectable: Option<Selectable>,
    data_rx: mpsc::UnboundedReceiver<KeyOpFieldsValues>,
    to_sync: HashMap<String, KeyOpFieldsValues>,
    order: Vec<String>,
}

impl Consumer {
    /// Creates a consumer and the feed the store publishes into.
    pub fn new(table_name: impl Into<String>) -> (Self, TableFeed) {
        let (selectable, notifier) = Selectable::new();
        let id = selectable.id();
        let (data_tx, data_rx) = mpsc::unbounded_channel();
        (
            Self {
                table_name: table_name.into(),
                id,
                selectable: Some(selectable),
                data_rx,
                to_sync: HashMap::new(),
                order: Vec::new(),
            },
            TableFeed { data_tx, notifier },
        )
    }

    /// Returns the table name this consumer is wired to.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns the identity of this consumer's wake source.
    pub fn id(&self) -> SelectableId {
        self.id
    }

    /// Hands the readiness half over for registration with a select.
    /// Returns `None` on every call after the first.
    pub fn take_selectable(&mut self) -> Option<Selectable> {
        self.selectable.take()
    }

    /// Drains the subscription channel into the pending set.
    ///
    /// Never blocks; the channel is already known-ready (or known
    /// empty) when this runs.
    pub fn read_data(&mut self) {
        while let Ok(entry) = self.data_rx.try_recv() {
            self.add_to_sync(entry);
        }
    }

    /// Adds one entry, applying the replace-on-same-key rule.
    pub fn add_to_sync(&mut self, entry: KeyOpFieldsValues) {
        let key = entry.key.clone();
        if self.to_sync.insert(key.clone(), entry).is_none() {
            self.order.push(key);
        }
    }

    /// Returns true if coalesced entries are waiting for dispatch.
    pub fn has_pending(&self) -> bool {
        !self.order.is_empty()
    }

    /// Number of coalesced entries waiting for dispatch.
    pub fn pending_count(&self) -> usize {
        self.order.len()
    }

    /// Hands over the coalesced set in first-seen key order, leaving
    /// the buffer empty. Nothing survives across dispatch boundaries.
    pub fn take_pending(&mut self) -> Vec<KeyOpFieldsValues> {
        let mut entries = Vec::with_capacity(self.order.len());
        for key in self.order.drain(..) {
            if let Some(entry) = self.to_sync.remove(&key) {
                entries.push(entry);
            }
        }
        entries
    }
}

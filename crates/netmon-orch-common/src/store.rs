//! Narrow interfaces to the external stores.
//!
//! The engine never sees store internals; reconcilers hold per-table
//! handles behind these traits, opened once at construction and used
//! only from the loop's call chain.

use async_trait::async_trait;
use thiserror::Error;

use crate::consumer::FieldValues;

/// Errors from store access.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not reach the store.
    #[error("store connection error: {0}")]
    Connection(String),

    /// The store rejected or failed a command.
    #[error("store command error: {0}")]
    Command(String),

    /// The store returned data in a shape we cannot use.
    #[error("invalid data format: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Creates a command error.
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command(message.into())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Point reads from one keyed table.
#[async_trait]
pub trait TableRead: Send {
    /// Reads one row; `Ok(None)` when the key has no entry.
    ///
    /// The empty key addresses the table's single bulk row, for map
    /// tables kept as one hash.
    async fn get(&mut self, key: &str) -> StoreResult<Option<FieldValues>>;
}

/// Writes to one keyed table. Last write wins; no history is kept.
#[async_trait]
pub trait TableWrite: Send {
    /// Upserts one row, replacing all of its fields.
    async fn set(&mut self, key: &str, fvs: FieldValues) -> StoreResult<()>;

    /// Removes one row. Removing an absent row is not an error.
    async fn del(&mut self, key: &str) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            StoreError::connection("refused").to_string(),
            "store connection error: refused"
        );
        assert_eq!(
            StoreError::command("HGETALL failed").to_string(),
            "store command error: HGETALL failed"
        );
    }
}

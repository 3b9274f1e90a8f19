//! Common reconciliation abstractions for the netmon agents.
//!
//! This crate provides the event-driven core shared by the netmon
//! daemons:
//!
//! - [`Selectable`]: a wake source the loop can block on
//! - [`Select`]: the multiplexed wait over all registered sources
//! - [`SelectableTimer`]: repeating timer delivered as a wake source
//! - [`Consumer`]: per-table buffer that coalesces change
//!   notifications into one pending task per key
//! - [`Orch`]: base trait for reconcilers
//! - [`OrchDaemon`]: the event loop owning the select and the
//!   executor bindings
//!
//! # Architecture
//!
//! The daemons follow an event-driven model with a single logical
//! thread of control:
//!
//! 1. Configuration changes land in the store and are published on a
//!    per-table change feed
//! 2. Each orch subscribes to its tables via Consumers and owns the
//!    timers that pace its periodic work
//! 3. The OrchDaemon waits on every wake source at once and dispatches
//!    exactly one per iteration; the bounded wait doubles as a
//!    periodic nudge so no orch is starved
//! 4. Orchs read live state through narrow table handles and write
//!    derived state back
//!
//! The only suspension point is the daemon's wait. Timers and store
//! feeds run on background tasks, but they communicate exclusively
//! through channels, so every map an orch owns is touched from one
//! call chain and needs no locks.

mod consumer;
mod daemon;
mod mem_backend;
mod orch;
mod select;
mod selectable;
mod store;
mod timer;

#[cfg(feature = "redis")]
pub mod redis_backend;

pub use consumer::{
    Consumer, FieldValue, FieldValues, KeyOpFieldsValues, Operation, TableFeed, DEL_COMMAND,
    SET_COMMAND,
};
pub use daemon::{OrchDaemon, OrchDaemonConfig};
pub use mem_backend::{MemDb, MemTable};
pub use orch::Orch;
pub use select::{Select, SelectError, WaitResult};
pub use selectable::{ReadyNotifier, Selectable, SelectableId};
pub use store::{StoreError, StoreResult, TableRead, TableWrite};
pub use timer::SelectableTimer;

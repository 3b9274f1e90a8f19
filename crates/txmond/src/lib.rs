//! Per-port traffic anomaly monitor daemon for netmon.
//!
//! This crate implements the `txmond` daemon, which watches one error
//! counter per front-panel port and derives a per-port health status
//! from how fast it moves.
//!
//! # Responsibilities
//!
//! - Rebase every port's reference counter on a configurable slow
//!   cadence, clearing alarms
//! - Compare live counters against the reference every second and
//!   raise `NOT_OK` when the delta exceeds the configured threshold
//! - Apply live tuning (`time_period`, `threshold`) from the
//!   configuration feed
//!
//! # Tables
//!
//! | Database | Table | Purpose |
//! |----------|-------|---------|
//! | CONFIG_DB | TX_MON | Monitor tuning (GLOBAL row) |
//! | COUNTERS_DB | COUNTERS | Raw per-object counters |
//! | COUNTERS_DB | COUNTERS_PORT_NAME_MAP | Port alias to object id |
//! | STATE_DB | TX_MONITOR_TABLE | Published per-port status |

pub mod tables;
pub mod tx_mon;

pub use tx_mon::TxMonOrch;

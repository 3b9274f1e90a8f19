//! Table and field name constants for txmond.

/// CONFIG_DB TX_MON table (monitor tuning).
pub const CFG_TX_MON_TABLE_NAME: &str = "TX_MON";

/// STATE_DB TX_MONITOR_TABLE (per-port status output).
pub const STATE_TX_MONITOR_TABLE_NAME: &str = "TX_MONITOR_TABLE";

/// COUNTERS_DB COUNTERS table (raw per-object counters).
pub const COUNTERS_TABLE: &str = "COUNTERS";

/// COUNTERS_DB port alias to object id map, kept as one bulk row.
pub const COUNTERS_PORT_NAME_MAP: &str = "COUNTERS_PORT_NAME_MAP";

/// Field names used in txmond tables.
pub mod fields {
    /// Baseline rebase interval, in seconds.
    pub const TIME_PERIOD: &str = "time_period";
    /// Absolute counter-delta tolerance.
    pub const THRESHOLD: &str = "threshold";
    /// Per-port health status.
    pub const STATUS: &str = "status";
}

/// Special constants.
pub mod constants {
    /// Configuration row carrying the global monitor tuning.
    pub const GLOBAL_KEY: &str = "GLOBAL";

    /// Counter compared against the baseline.
    pub const MONITORED_COUNTER: &str = "SAI_PORT_STAT_ETHER_RX_OVERSIZE_PKTS";

    /// Healthy status value.
    pub const STATUS_OK: &str = "OK";

    /// Alarmed status value.
    pub const STATUS_NOT_OK: &str = "NOT_OK";

    /// Baseline rebase interval before configuration arrives, in seconds.
    pub const DEFAULT_TIME_PERIOD_SECS: u64 = 30;

    /// Default counter-delta tolerance.
    pub const DEFAULT_THRESHOLD: u32 = 200;

    /// Fixed fast poll cadence, in seconds.
    pub const POLL_PERIOD_SECS: u64 = 1;
}

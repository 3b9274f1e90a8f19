//! TxMonOrch implementation - the per-port traffic anomaly monitor.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};

use netmon_orch_common::{
    Consumer, FieldValues, Operation, Orch, Selectable, SelectableId, SelectableTimer, TableRead,
    TableWrite,
};

use crate::tables::{constants, fields, CFG_TX_MON_TABLE_NAME};

/// Which of the monitor's two schedules fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerRole {
    /// Slow rebase of the reference counters; clears alarms.
    Baseline,
    /// Fast comparison against the reference; raises alarms.
    Poll,
}

/// A wake source of this orch, resolved from a selectable id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxMonSource {
    Config,
    Timer(TimerRole),
}

/// Per-port traffic anomaly monitor.
///
/// Watches one error counter per mapped port and writes a per-port
/// health status:
///
/// 1. The baseline timer (config `time_period`, default 30s) captures
///    every port's current counter as the new reference and writes
///    status `OK` - a hard rebase that also clears any alarm
/// 2. The poll timer (fixed 1s) compares the current counter against
///    the reference and writes `NOT_OK` when the delta exceeds the
///    configured threshold; it never writes `OK`
///
/// The alias-to-object-id map is re-read from the counters store on
/// every firing, since the platform may reassign object ids between
/// cycles.
pub struct TxMonOrch {
    config_consumer: Consumer,
    baseline_timer: SelectableTimer,
    poll_timer: SelectableTimer,

    counters_table: Box<dyn TableRead>,
    counters_map_table: Box<dyn TableRead>,
    state_table: Box<dyn TableWrite>,

    threshold: u32,
    alias_to_oid: HashMap<String, String>,
    last_baseline: HashMap<String, u32>,

    /// Wake sources pending hand-over to the daemon.
    selectables: Vec<Selectable>,
}

impl TxMonOrch {
    /// Creates the monitor and arms both timers.
    pub fn new(
        mut config_consumer: Consumer,
        counters_table: Box<dyn TableRead>,
        counters_map_table: Box<dyn TableRead>,
        state_table: Box<dyn TableWrite>,
    ) -> Self {
        let mut baseline_timer =
            SelectableTimer::new(Duration::from_secs(constants::DEFAULT_TIME_PERIOD_SECS));
        let mut poll_timer = SelectableTimer::new(Duration::from_secs(constants::POLL_PERIOD_SECS));

        let mut selectables = Vec::with_capacity(3);
        selectables.extend(config_consumer.take_selectable());
        selectables.extend(baseline_timer.take_selectable());
        selectables.extend(poll_timer.take_selectable());

        baseline_timer.start();
        poll_timer.start();

        Self {
            config_consumer,
            baseline_timer,
            poll_timer,
            counters_table,
            counters_map_table,
            state_table,
            threshold: constants::DEFAULT_THRESHOLD,
            alias_to_oid: HashMap::new(),
            last_baseline: HashMap::new(),
            selectables,
        }
    }

    fn source(&self, id: SelectableId) -> Option<TxMonSource> {
        if id == self.config_consumer.id() {
            Some(TxMonSource::Config)
        } else if id == self.baseline_timer.id() {
            Some(TxMonSource::Timer(TimerRole::Baseline))
        } else if id == self.poll_timer.id() {
            Some(TxMonSource::Timer(TimerRole::Poll))
        } else {
            None
        }
    }

    /// Works through the coalesced configuration entries. Every entry
    /// is consumed; a bad one is logged and skipped without disturbing
    /// its siblings.
    fn do_config_task(&mut self) {
        if self.config_consumer.table_name() != CFG_TX_MON_TABLE_NAME {
            // Miswired consumer. Report it, but still work through the
            // entries so nothing sits in the buffer forever.
            error!(
                table = self.config_consumer.table_name(),
                "consumer wired to unexpected table"
            );
        }

        for entry in self.config_consumer.take_pending() {
            match Operation::parse(&entry.op) {
                Some(Operation::Set) => self.handle_set(&entry.key, &entry.fvs),
                _ => error!(key = %entry.key, op = %entry.op, "unknown operation type"),
            }
        }
    }

    fn handle_set(&mut self, key: &str, fvs: &FieldValues) {
        if key != constants::GLOBAL_KEY {
            warn!(key, "unsupported key");
            return;
        }

        for (field, value) in fvs {
            match field.as_str() {
                fields::TIME_PERIOD => self.set_time_period(value),
                fields::THRESHOLD => self.set_threshold(value),
                other => debug!(field = other, "ignoring unrecognized field"),
            }
        }
    }

    fn set_time_period(&mut self, value: &str) {
        match value.parse::<u32>() {
            Ok(seconds) => {
                self.baseline_timer
                    .set_interval(Duration::from_secs(u64::from(seconds)));
                self.baseline_timer.reset();
                info!(time_period = seconds, "rescheduled baseline rebase");
            }
            Err(_) => error!(value, "malformed time_period, keeping current interval"),
        }
    }

    fn set_threshold(&mut self, value: &str) {
        match value.parse::<u32>() {
            Ok(threshold) => {
                self.threshold = threshold;
                info!(threshold, "updated counter-delta tolerance");
            }
            Err(_) => error!(value, "malformed threshold, keeping current value"),
        }
    }

    /// Re-reads the alias map wholesale; object ids may have been
    /// reassigned since the last cycle.
    async fn update_port_map(&mut self) {
        match self.counters_map_table.get("").await {
            Ok(Some(fvs)) => {
                self.alias_to_oid.clear();
                self.alias_to_oid.extend(fvs);
            }
            Ok(None) => self.alias_to_oid.clear(),
            Err(e) => warn!(error = %e, "failed to read port name map"),
        }
    }

    async fn read_monitored_counter(&mut self, alias: &str, oid: &str) -> Option<u32> {
        let row = match self.counters_table.get(oid).await {
            Ok(Some(row)) => row,
            // Counters for this port are not published yet; it will be
            // picked up on a later cycle.
            Ok(None) => return None,
            Err(e) => {
                warn!(port = alias, oid, error = %e, "counters read failed");
                return None;
            }
        };

        let raw = row
            .iter()
            .find(|(name, _)| name == constants::MONITORED_COUNTER)
            .map(|(_, value)| value.as_str())?;

        match raw.parse::<u32>() {
            Ok(value) => Some(value),
            Err(_) => {
                error!(port = alias, oid, value = raw, "malformed counter value");
                None
            }
        }
    }

    /// Hard rebase: captures every port's current counter as the new
    /// reference and optimistically clears its alarm. Never compares.
    #[instrument(skip(self))]
    async fn rebase_baselines(&mut self) {
        self.update_port_map().await;
        let ports = self.known_ports();

        for (alias, oid) in ports {
            let Some(value) = self.read_monitored_counter(&alias, &oid).await else {
                continue;
            };
            self.last_baseline.insert(alias.clone(), value);
            self.write_status(&alias, constants::STATUS_OK).await;
        }
    }

    /// Fast comparison against the reference. Only ever raises the
    /// alarm; clearing is the rebase's job.
    #[instrument(skip(self))]
    async fn poll_counters(&mut self) {
        self.update_port_map().await;
        let ports = self.known_ports();

        for (alias, oid) in ports {
            let Some(current) = self.read_monitored_counter(&alias, &oid).await else {
                continue;
            };
            let baseline = self.last_baseline.get(&alias).copied().unwrap_or(0);
            // Wrapping subtraction: a counter that went backwards (reset
            // on the device) shows up as an enormous delta and trips the
            // alarm until the next rebase clears it.
            let delta = current.wrapping_sub(baseline);
            if delta > self.threshold {
                warn!(
                    port = %alias,
                    delta,
                    threshold = self.threshold,
                    "monitored counter over threshold"
                );
                self.write_status(&alias, constants::STATUS_NOT_OK).await;
            }
        }
    }

    fn known_ports(&self) -> Vec<(String, String)> {
        self.alias_to_oid
            .iter()
            .map(|(alias, oid)| (alias.clone(), oid.clone()))
            .collect()
    }

    async fn write_status(&mut self, alias: &str, status: &str) {
        let fvs = vec![(fields::STATUS.to_string(), status.to_string())];
        if let Err(e) = self.state_table.set(alias, fvs).await {
            warn!(port = alias, status, error = %e, "status write failed");
        }
    }
}

#[async_trait]
impl Orch for TxMonOrch {
    fn name(&self) -> &str {
        "TxMonOrch"
    }

    fn take_selectables(&mut self) -> Vec<Selectable> {
        std::mem::take(&mut self.selectables)
    }

    async fn execute(&mut self, id: SelectableId) {
        match self.source(id) {
            Some(TxMonSource::Config) => {
                self.config_consumer.read_data();
                self.do_config_task();
            }
            Some(TxMonSource::Timer(TimerRole::Baseline)) => self.rebase_baselines().await,
            Some(TxMonSource::Timer(TimerRole::Poll)) => self.poll_counters().await,
            None => warn!(selectable = %id, "ready source is not one of ours"),
        }
    }

    async fn drain(&mut self) {
        self.config_consumer.read_data();
        if self.config_consumer.has_pending() {
            self.do_config_task();
        }
    }
}

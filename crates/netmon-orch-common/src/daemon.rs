//! Event loop shared by the netmon daemons.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::orch::Orch;
use crate::select::{Select, WaitResult};
use crate::selectable::SelectableId;

/// Tuning for [`OrchDaemon`].
#[derive(Debug, Clone)]
pub struct OrchDaemonConfig {
    /// Bounded wait per loop iteration, in milliseconds. Doubles as
    /// the cadence at which idle orchs are nudged via `drain()`.
    pub select_timeout_ms: u64,
}

impl Default for OrchDaemonConfig {
    fn default() -> Self {
        Self {
            select_timeout_ms: 1000,
        }
    }
}

/// Owns the select loop and the executor bindings from wake source to
/// registered orch.
///
/// One daemon, one select, any number of orchs. Each registered
/// selectable maps to exactly one orch; the orch itself resolves which
/// of its sources fired.
pub struct OrchDaemon {
    config: OrchDaemonConfig,
    select: Select,
    orchs: Vec<Box<dyn Orch>>,
    executors: HashMap<SelectableId, usize>,
}

impl OrchDaemon {
    pub fn new(config: OrchDaemonConfig) -> Self {
        Self {
            config,
            select: Select::new(),
            orchs: Vec::new(),
            executors: HashMap::new(),
        }
    }

    /// Registers an orch and wires all of its wake sources into the
    /// select.
    pub fn register(&mut self, mut orch: Box<dyn Orch>) {
        let index = self.orchs.len();
        let mut sources = 0;
        for selectable in orch.take_selectables() {
            debug!(orch = orch.name(), selectable = %selectable.id(), "wiring wake source");
            self.executors.insert(selectable.id(), index);
            self.select.add_selectable(selectable);
            sources += 1;
        }
        info!("Registered {} with {} wake sources", orch.name(), sources);
        self.orchs.push(orch);
    }

    /// Number of registered orchs.
    pub fn orch_count(&self) -> usize {
        self.orchs.len()
    }

    /// Runs one loop iteration: one bounded wait plus its dispatch.
    pub async fn run_once(&mut self) {
        let timeout = Duration::from_millis(self.config.select_timeout_ms);
        match self.select.wait(timeout).await {
            WaitResult::Ready(id) => match self.executors.get(&id) {
                Some(&index) => self.orchs[index].execute(id).await,
                None => warn!(selectable = %id, "ready source has no executor binding"),
            },
            WaitResult::Timeout => {
                for orch in &mut self.orchs {
                    orch.drain().await;
                }
            }
            WaitResult::Error(e) => {
                // Retry forever, no backoff.
                error!("select error: {}", e);
            }
        }
    }

    /// Runs the select loop forever.
    ///
    /// There is no shutdown path: wait errors are logged and retried
    /// immediately, and only a panic unwinds out of here.
    pub async fn run(&mut self) {
        info!(
            "Entering select loop: {} orchs, {} wake sources, {}ms timeout",
            self.orchs.len(),
            self.select.len(),
            self.config.select_timeout_ms
        );
        loop {
            self.run_once().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::consumer::{Consumer, KeyOpFieldsValues, TableFeed};
    use crate::selectable::Selectable;

    struct RecordingOrch {
        consumer: Consumer,
        processed: Arc<AtomicUsize>,
        drains: Arc<AtomicUsize>,
    }

    impl RecordingOrch {
        fn new(table: &str) -> (Self, TableFeed, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let (consumer, feed) = Consumer::new(table);
            let processed = Arc::new(AtomicUsize::new(0));
            let drains = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    consumer,
                    processed: processed.clone(),
                    drains: drains.clone(),
                },
                feed,
                processed,
                drains,
            )
        }
    }

    #[async_trait]
    impl Orch for RecordingOrch {
        fn name(&self) -> &str {
            "RecordingOrch"
        }

        fn take_selectables(&mut self) -> Vec<Selectable> {
            self.consumer.take_selectable().into_iter().collect()
        }

        async fn execute(&mut self, id: SelectableId) {
            assert_eq!(id, self.consumer.id());
            self.consumer.read_data();
            self.processed
                .fetch_add(self.consumer.take_pending().len(), Ordering::SeqCst);
        }

        async fn drain(&mut self) {
            self.drains.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ready_source_dispatches_to_its_orch() {
        let (orch, feed, processed, _drains) = RecordingOrch::new("T1");
        let mut daemon = OrchDaemon::new(OrchDaemonConfig::default());
        daemon.register(Box::new(orch));
        assert_eq!(daemon.orch_count(), 1);

        feed.publish(KeyOpFieldsValues::set("K1", vec![]));
        feed.publish(KeyOpFieldsValues::set("K2", vec![]));

        daemon.run_once().await;
        assert_eq!(processed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_nudges_every_orch() {
        let (first, _feed_a, _p_a, drains_a) = RecordingOrch::new("T1");
        let (second, _feed_b, _p_b, drains_b) = RecordingOrch::new("T2");
        let mut daemon = OrchDaemon::new(OrchDaemonConfig::default());
        daemon.register(Box::new(first));
        daemon.register(Box::new(second));

        daemon.run_once().await;

        assert_eq!(drains_a.load(Ordering::SeqCst), 1);
        assert_eq!(drains_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_coalesce_into_one_dispatch() {
        let (orch, feed, processed, _drains) = RecordingOrch::new("T1");
        let mut daemon = OrchDaemon::new(OrchDaemonConfig::default());
        daemon.register(Box::new(orch));

        for _ in 0..10 {
            feed.publish(KeyOpFieldsValues::set("K1", vec![]));
        }

        daemon.run_once().await;
        // Ten same-key notifications collapse to one pending task.
        assert_eq!(processed.load(Ordering::SeqCst), 1);
    }
}

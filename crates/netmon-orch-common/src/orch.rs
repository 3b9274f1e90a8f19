//! Base trait for reconcilers driven by the select loop.

use async_trait::async_trait;

use crate::selectable::{Selectable, SelectableId};

/// A reconciler: owns consumers and timers, converts configuration
/// intent and observed state into corrective writes.
///
/// Orchs own no threads. All of their state is touched only from the
/// daemon's single call chain, so the maps they keep need no
/// synchronization.
///
/// # Lifecycle
///
/// 1. Construction: the orch is created with its store handles,
///    consumers and timers
/// 2. Registration: the daemon takes the orch's selectables and wires
///    them into its select
/// 3. Event loop: `execute()` is called with the id of whichever wake
///    source fired; `drain()` is called on every select timeout
#[async_trait]
pub trait Orch: Send {
    /// Returns the name of this orch (for logging and debugging).
    fn name(&self) -> &str;

    /// Hands the orch's wake sources to the daemon, once. Subsequent
    /// calls return an empty set.
    fn take_selectables(&mut self) -> Vec<Selectable>;

    /// Dispatches one ready wake source.
    ///
    /// The orch resolves `id` against the sources it registered
    /// (which consumer, which timer) and runs the matching handler to
    /// completion before returning.
    async fn execute(&mut self, id: SelectableId);

    /// Periodic nudge from the daemon's bounded wait expiring.
    ///
    /// Implementations re-drain their consumers and process whatever
    /// is buffered, so pending work is never starved by a quiet event
    /// stream or a coalesced-away readiness signal.
    async fn drain(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingOrch {
        executed: usize,
        drained: usize,
    }

    #[async_trait]
    impl Orch for CountingOrch {
        fn name(&self) -> &str {
            "CountingOrch"
        }

        fn take_selectables(&mut self) -> Vec<Selectable> {
            vec![]
        }

        async fn execute(&mut self, _id: SelectableId) {
            self.executed += 1;
        }

        async fn drain(&mut self) {
            self.drained += 1;
        }
    }

    #[tokio::test]
    async fn trait_object_dispatch() {
        let mut orch: Box<dyn Orch> = Box::new(CountingOrch {
            executed: 0,
            drained: 0,
        });

        assert_eq!(orch.name(), "CountingOrch");
        assert!(orch.take_selectables().is_empty());

        let (sel, _notifier) = Selectable::new();
        orch.execute(sel.id()).await;
        orch.drain().await;
    }
}

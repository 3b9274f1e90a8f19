//! Readiness primitives for the select loop.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a wake source.
///
/// Allocated once per [`Selectable`] and stable for its lifetime; the
/// daemon uses it to route readiness back to the registering orch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectableId(u64);

impl SelectableId {
    fn next() -> Self {
        SelectableId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SelectableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sel-{}", self.0)
    }
}

/// A wake source the select loop can block on.
///
/// Readiness travels over a capacity-1 channel: an un-consumed signal
/// absorbs any further ones, so at most one pending firing is ever
/// observable per wait. The selectable carries no payload of its own;
/// whatever data backs the readiness (buffered notifications, an
/// elapsed interval) stays with the component that created it.
#[derive(Debug)]
pub struct Selectable {
    id: SelectableId,
    ready_rx: mpsc::Receiver<()>,
}

impl Selectable {
    /// Creates a selectable together with its producer half.
    pub fn new() -> (Self, ReadyNotifier) {
        let id = SelectableId::next();
        let (tx, rx) = mpsc::channel(1);
        (Self { id, ready_rx: rx }, ReadyNotifier { id, tx })
    }

    /// Returns the identity of this wake source.
    pub fn id(&self) -> SelectableId {
        self.id
    }

    pub(crate) fn into_parts(self) -> (SelectableId, mpsc::Receiver<()>) {
        (self.id, self.ready_rx)
    }
}

/// Producer half of a [`Selectable`].
#[derive(Debug, Clone)]
pub struct ReadyNotifier {
    id: SelectableId,
    tx: mpsc::Sender<()>,
}

impl ReadyNotifier {
    /// Returns the identity of the selectable this notifier wakes.
    pub fn id(&self) -> SelectableId {
        self.id
    }

    /// Marks the selectable ready.
    ///
    /// Never blocks. If a firing is already pending, this one is
    /// absorbed; if the select side is gone, the signal is dropped.
    pub fn notify(&self) {
        let _ = self.tx.try_send(());
    }
}

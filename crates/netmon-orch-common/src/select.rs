//! Multiplexed wait over a set of registered selectables.

use std::time::Duration;

use thiserror::Error;
use tokio::time;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{StreamExt, StreamMap};

use crate::selectable::{Selectable, SelectableId};

/// Errors surfaced by [`Select::wait`].
///
/// None of these terminate the loop: callers log the cause and retry
/// immediately, without backoff and without giving up.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SelectError {
    /// Every registered readiness channel has closed. The producers
    /// backing the selectables are gone, so no further wake can arrive.
    #[error("all registered wake sources have closed")]
    SourcesClosed,
}

/// Outcome of one [`Select::wait`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// Exactly one ready wake source.
    Ready(SelectableId),
    /// The bounded wait elapsed with nothing ready.
    Timeout,
    /// The wait could not complete; log and retry.
    Error(SelectError),
}

/// Waits on many selectables at once, reporting one ready source per
/// call.
///
/// The select owns only the readiness halves of what it registers; the
/// component that created each selectable keeps the underlying source
/// (timer, notification buffer). The stream map randomizes which entry
/// is polled first, so simultaneously ready sources cannot starve one
/// another across consecutive calls.
pub struct Select {
    streams: StreamMap<SelectableId, ReceiverStream<()>>,
}

impl Select {
    pub fn new() -> Self {
        Self {
            streams: StreamMap::new(),
        }
    }

    /// Registers a wake source.
    pub fn add_selectable(&mut self, selectable: Selectable) {
        let (id, rx) = selectable.into_parts();
        self.streams.insert(id, ReceiverStream::new(rx));
    }

    /// Number of live registered sources.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Blocks, bounded by `timeout`, until one registered source is
    /// ready.
    ///
    /// This is the only suspension point in the whole system. With
    /// nothing registered the call degenerates to a plain bounded
    /// sleep, so an empty loop still paces itself instead of spinning.
    pub async fn wait(&mut self, timeout: Duration) -> WaitResult {
        if self.streams.is_empty() {
            time::sleep(timeout).await;
            return WaitResult::Timeout;
        }

        match time::timeout(timeout, self.streams.next()).await {
            Ok(Some((id, ()))) => WaitResult::Ready(id),
            Ok(None) => WaitResult::Error(SelectError::SourcesClosed),
            Err(_) => WaitResult::Timeout,
        }
    }
}

impl Default for Select {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectable::Selectable;

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test(start_paused = true)]
    async fn wait_returns_ready_source() {
        let mut select = Select::new();
        let (sel, notifier) = Selectable::new();
        let id = sel.id();
        select.add_selectable(sel);

        notifier.notify();

        assert_eq!(select.wait(SHORT).await, WaitResult::Ready(id));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_when_nothing_ready() {
        let mut select = Select::new();
        let (sel, _notifier) = Selectable::new();
        select.add_selectable(sel);

        assert_eq!(select.wait(SHORT).await, WaitResult::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_select_paces_like_a_timeout() {
        let mut select = Select::new();
        let before = time::Instant::now();

        assert_eq!(select.wait(SHORT).await, WaitResult::Timeout);
        assert!(before.elapsed() >= SHORT);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_sources_surface_as_error() {
        let mut select = Select::new();
        let (sel, notifier) = Selectable::new();
        select.add_selectable(sel);
        drop(notifier);

        assert_eq!(
            select.wait(SHORT).await,
            WaitResult::Error(SelectError::SourcesClosed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn one_ready_source_per_call() {
        let mut select = Select::new();
        let (a, na) = Selectable::new();
        let (b, nb) = Selectable::new();
        let (id_a, id_b) = (a.id(), b.id());
        select.add_selectable(a);
        select.add_selectable(b);

        na.notify();
        nb.notify();

        let first = select.wait(SHORT).await;
        let second = select.wait(SHORT).await;
        let mut seen = vec![];
        for result in [first, second] {
            match result {
                WaitResult::Ready(id) => seen.push(id),
                other => panic!("expected two ready sources, got {other:?}"),
            }
        }
        seen.sort();
        let mut expected = vec![id_a, id_b];
        expected.sort();
        assert_eq!(seen, expected);

        assert_eq!(select.wait(SHORT).await, WaitResult::Timeout);
    }
}

//! Interval timer that wakes the select loop.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::warn;

use crate::selectable::{ReadyNotifier, Selectable, SelectableId};

#[derive(Debug)]
enum TimerCommand {
    Start,
    Reset,
    SetInterval(Duration),
    Stop,
}

/// Repeating timer whose firings are delivered through a [`Selectable`].
///
/// The countdown runs on a background task that only ever touches its
/// command channel and the readiness signal; the owning orch keeps this
/// handle for rescheduling and hands the selectable half to the select
/// loop at registration. Firings coalesce: a slow loop observes at most
/// one pending firing no matter how many intervals elapsed.
#[derive(Debug)]
pub struct SelectableTimer {
    id: SelectableId,
    cmd_tx: mpsc::UnboundedSender<TimerCommand>,
    selectable: Option<Selectable>,
}

impl SelectableTimer {
    /// Creates a stopped timer with the given interval. [`start`]
    /// arms it.
    ///
    /// [`start`]: SelectableTimer::start
    pub fn new(interval: Duration) -> Self {
        let (selectable, notifier) = Selectable::new();
        let id = selectable.id();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_timer(interval, cmd_rx, notifier));
        Self {
            id,
            cmd_tx,
            selectable: Some(selectable),
        }
    }

    /// Returns the identity of this timer's wake source.
    pub fn id(&self) -> SelectableId {
        self.id
    }

    /// Hands the readiness half over for registration with a select.
    /// Returns `None` on every call after the first.
    pub fn take_selectable(&mut self) -> Option<Selectable> {
        self.selectable.take()
    }

    /// Arms the timer; the first firing is one interval from now.
    pub fn start(&self) {
        self.send(TimerCommand::Start);
    }

    /// Restarts the countdown using the configured interval, arming
    /// the timer if it was stopped.
    pub fn reset(&self) {
        self.send(TimerCommand::Reset);
    }

    /// Replaces the interval. Takes effect on the next reset or expiry;
    /// a countdown already in flight keeps its deadline.
    pub fn set_interval(&self, interval: Duration) {
        self.send(TimerCommand::SetInterval(interval));
    }

    /// Disarms the timer. A stopped timer never fires; `start` or
    /// `reset` re-arms it.
    pub fn stop(&self) {
        self.send(TimerCommand::Stop);
    }

    fn send(&self, cmd: TimerCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            warn!(timer = %self.id, "timer task is gone, command dropped");
        }
    }
}

async fn run_timer(
    mut interval: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<TimerCommand>,
    notifier: ReadyNotifier,
) {
    // None while stopped; the command branch is the only live one then.
    let mut deadline: Option<Instant> = None;
    loop {
        tokio::select! {
            _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                notifier.notify();
                // Next deadline counts from now, not from the missed
                // expiry, so a stalled loop is not chased by a burst of
                // catch-up firings.
                deadline = Some(Instant::now() + interval);
            }
            cmd = cmd_rx.recv() => match cmd {
                Some(TimerCommand::Start) | Some(TimerCommand::Reset) => {
                    deadline = Some(Instant::now() + interval);
                }
                Some(TimerCommand::SetInterval(new_interval)) => {
                    interval = new_interval;
                }
                Some(TimerCommand::Stop) => {
                    deadline = None;
                }
                // Handle dropped: nothing can command this timer again.
                None => return,
            },
        }
    }
}

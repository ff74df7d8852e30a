//! Background samplers that run alongside the load phases.
//!
//! Each monitor is a spawned task that owns its history. The outside world
//! talks to it through a [`MonitorHandle`]: a stop message, a copy of the most
//! recently published snapshot, and the history handed back on join.

pub mod health;
pub mod resources;

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

/// Handle to a running monitor task.
///
/// `S` is the per-cycle snapshot published while running, `T` is what the
/// task returns once it stops.
pub struct MonitorHandle<S, T> {
    stop_tx: watch::Sender<bool>,
    latest_rx: watch::Receiver<S>,
    task: JoinHandle<T>,
}

impl<S: Clone, T> MonitorHandle<S, T> {
    /// Ask the loop to stop after the cycle in progress. Safe to call repeatedly.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Copy of the last completed cycle's snapshot.
    pub fn latest(&self) -> S {
        self.latest_rx.borrow().clone()
    }

    /// Stop the loop and wait for it to hand back its history.
    pub async fn join(self) -> Result<T, JoinError> {
        self.stop();
        self.task.await
    }
}

/// The task side of a monitor: where to publish, and how to hear "stop".
pub(crate) struct MonitorContext<S> {
    stop_rx: watch::Receiver<bool>,
    publish_tx: watch::Sender<S>,
}

impl<S> MonitorContext<S> {
    pub(crate) fn publish(&self, snapshot: S) {
        self.publish_tx.send_replace(snapshot);
    }

    /// Wait out `period` unless a stop arrives first. Returns `true` when the
    /// loop should exit (stop requested, or the handle was dropped).
    pub(crate) async fn wait_or_stop(&mut self, period: Duration) -> bool {
        if *self.stop_rx.borrow_and_update() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(period) => false,
            changed = self.stop_rx.changed() => match changed {
                Ok(()) => *self.stop_rx.borrow_and_update(),
                Err(_) => true,
            },
        }
    }
}

/// Spawn `body` as a monitor task, starting with `initial` as the published snapshot.
pub(crate) fn spawn_monitor<S, T, F, Fut>(initial: S, body: F) -> MonitorHandle<S, T>
where
    S: Send + Sync + 'static,
    T: Send + 'static,
    F: FnOnce(MonitorContext<S>) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let (stop_tx, stop_rx) = watch::channel(false);
    let (publish_tx, latest_rx) = watch::channel(initial);
    let task = tokio::spawn(body(MonitorContext { stop_rx, publish_tx }));
    MonitorHandle {
        stop_tx,
        latest_rx,
        task,
    }
}

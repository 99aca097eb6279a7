//! Cooperative shutdown signal and bounded task teardown.

use futures::future::join_all;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Receiving side of a one-shot shutdown flag shared by many tasks.
#[derive(Clone, Debug)]
pub(crate) struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Creates the trigger and its first signal.
    pub(crate) fn channel() -> (ShutdownTrigger, ShutdownSignal) {
        let (sender, receiver) = watch::channel(false);
        (ShutdownTrigger { sender }, ShutdownSignal { receiver })
    }

    pub(crate) fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once shutdown is triggered or the trigger is dropped.
    pub(crate) async fn triggered(&mut self) {
        while !*self.receiver.borrow_and_update() {
            if self.receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct ShutdownTrigger {
    sender: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub(crate) fn trigger(&self) {
        self.sender.send_replace(true);
    }
}

/// Waits up to `grace` for every task, then aborts the ones still running.
///
/// Returns `true` when all tasks finished within the grace period.
pub(crate) async fn join_with_grace(mut handles: Vec<JoinHandle<()>>, grace: Duration) -> bool {
    let finished = tokio::time::timeout(grace, join_all(handles.iter_mut()))
        .await
        .is_ok();

    if !finished {
        for handle in &handles {
            handle.abort();
        }
    }

    finished
}

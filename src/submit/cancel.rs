use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::types::SkipReason;

/// Lets the host stop a running batch.
///
/// Cheaply cloneable. Cancelling is one-way: in-flight requests finish,
/// drafts not yet dispatched are skipped.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Per-batch view of "should we stop": the host's cancel handle plus the
/// optional batch deadline.
#[derive(Clone)]
pub(crate) struct StopSignal {
    cancel: CancelHandle,
    deadline: Option<Instant>,
}

impl StopSignal {
    pub(crate) fn new(cancel: CancelHandle, deadline: Option<Instant>) -> Self {
        Self { cancel, deadline }
    }

    pub(crate) fn reason(&self) -> Option<SkipReason> {
        if self.cancel.is_cancelled() {
            return Some(SkipReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(SkipReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves with the reason once the batch has to stop.
    pub(crate) async fn stopped(&self) -> SkipReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                () = self.cancel.cancelled() => SkipReason::Cancelled,
                () = tokio::time::sleep_until(deadline) => SkipReason::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                SkipReason::Cancelled
            }
        }
    }
}

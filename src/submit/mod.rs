//! The rate-limited batch submitter.
//!
//! A bounded pool of workers draws drafts from a shared cursor. Each worker
//! drives one draft through `Pending -> Dispatched -> {Created | RetryScheduled
//! -> Dispatched | Failed | Skipped}` before drawing the next. The rate-limit
//! budget is the only state the workers share.

mod cancel;
mod options;
mod worker;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, bail};
use tokio::task::JoinSet;

pub use cancel::CancelHandle;
pub use options::SubmitOptions;

use crate::github::{IssueGateway, RateLimiter, SubmitError};
use crate::report::summarize;
use crate::types::{Outcome, ProgressEvent, QueuedDraft, SubmissionResult};
use crate::validator::ValidCredential;
use cancel::StopSignal;
use worker::Worker;

/// Submits batches of drafts through an [`IssueGateway`].
pub struct Submitter<G> {
    gateway: Arc<G>,
    progress: Option<Sender<ProgressEvent>>,
}

impl<G: IssueGateway> Submitter<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            progress: None,
        }
    }

    /// Receive one event per draft as it reaches a terminal state.
    pub fn with_progress(mut self, tx: Sender<ProgressEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Drive every draft to a terminal outcome.
    ///
    /// The returned results follow the order of `drafts`. Per-draft failures
    /// never abort the batch.
    pub async fn submit(
        &self,
        drafts: Vec<QueuedDraft>,
        credential: &ValidCredential,
        options: &SubmitOptions,
        cancel: &CancelHandle,
    ) -> Vec<SubmissionResult> {
        let total = drafts.len();
        tracing::info!(
            repo = %credential.credential().repo(),
            drafts = total,
            workers = options.workers(),
            "starting batch"
        );

        let deadline = options.deadline.map(|d| tokio::time::Instant::now() + d);
        let stop = StopSignal::new(cancel.clone(), deadline);
        let drafts: Arc<[QueuedDraft]> = drafts.into();
        // Fresh budget per batch: the first responses report the real one.
        let limiter = Arc::new(RateLimiter::new());
        let cursor = Arc::new(AtomicUsize::new(0));

        let slots: Arc<Mutex<Vec<Option<SubmissionResult>>>> =
            Arc::new(Mutex::new(vec![None; total]));
        let new_worker = || Worker {
            gateway: Arc::clone(&self.gateway),
            credential: credential.credential().clone(),
            limiter: Arc::clone(&limiter),
            options: options.clone(),
            stop: stop.clone(),
            progress: self.progress.clone(),
            drafts: Arc::clone(&drafts),
            cursor: Arc::clone(&cursor),
            slots: Arc::clone(&slots),
        };

        let mut workers = JoinSet::new();
        for _ in 0..options.workers().min(total) {
            workers.spawn(new_worker().run());
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                // The draft it was driving stays unfilled; the rest of the
                // queue gets a replacement worker.
                tracing::error!("submit worker died: {e}");
                if cursor.load(Ordering::SeqCst) < total {
                    workers.spawn(new_worker().run());
                }
            }
        }

        let slots = std::mem::take(&mut *slots.lock().unwrap_or_else(PoisonError::into_inner));
        let results: Vec<SubmissionResult> = slots
            .into_iter()
            .zip(drafts.iter())
            .map(|(slot, queued)| {
                slot.unwrap_or_else(|| {
                    let result = SubmissionResult {
                        draft_id: queued.id,
                        outcome: Outcome::Failed {
                            error: SubmitError::internal("worker stopped before reporting a result"),
                        },
                        attempts: 0,
                        possible_duplicate: false,
                    };
                    if let Some(tx) = &self.progress {
                        let _ = tx.send(ProgressEvent {
                            draft_id: queued.id,
                            outcome: result.outcome.kind(),
                        });
                    }
                    result
                })
            })
            .collect();

        let summary = summarize(&results);
        tracing::info!(
            created = summary.created_count,
            failed = summary.failed_count,
            skipped = summary.skipped_count,
            possible_duplicates = summary.possible_duplicate_count,
            "batch finished"
        );
        results
    }

    /// [`submit`](Self::submit) for hosts without an async runtime.
    ///
    /// Runs the batch on a dedicated Tokio runtime. Fails when called from
    /// inside another runtime; async hosts call `submit` directly.
    pub fn submit_blocking(
        &self,
        drafts: Vec<QueuedDraft>,
        credential: &ValidCredential,
        options: &SubmitOptions,
        cancel: &CancelHandle,
    ) -> anyhow::Result<Vec<SubmissionResult>> {
        if tokio::runtime::Handle::try_current().is_ok() {
            bail!("submit_blocking called from inside a Tokio runtime; await `submit` instead");
        }
        let runtime = tokio::runtime::Runtime::new().context("building submit runtime")?;
        Ok(runtime.block_on(self.submit(drafts, credential, options, cancel)))
    }
}

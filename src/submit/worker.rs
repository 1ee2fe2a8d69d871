use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};

use super::cancel::StopSignal;
use super::options::SubmitOptions;
use crate::github::{Credential, IssueGateway, NewIssue, PermanentError, RateLimiter, SubmitError};
use crate::types::{DraftId, Outcome, ProgressEvent, QueuedDraft, SkipReason, SubmissionResult};

/// Everything one worker needs; built once per worker.
pub(crate) struct Worker<G> {
    pub(crate) gateway: Arc<G>,
    pub(crate) credential: Credential,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) options: SubmitOptions,
    pub(crate) stop: StopSignal,
    pub(crate) progress: Option<Sender<ProgressEvent>>,
    pub(crate) drafts: Arc<[QueuedDraft]>,
    pub(crate) cursor: Arc<AtomicUsize>,
    pub(crate) slots: Arc<Mutex<Vec<Option<SubmissionResult>>>>,
}

/// Bookkeeping for the draft currently being driven.
struct Attempts {
    id: DraftId,
    sent: u32,
    ambiguous: bool,
    last_error: Option<SubmitError>,
}

impl Attempts {
    fn finish(self, outcome: Outcome) -> SubmissionResult {
        SubmissionResult {
            draft_id: self.id,
            outcome,
            attempts: self.sent,
            possible_duplicate: self.ambiguous,
        }
    }

    /// Stop requested: untouched drafts are skipped, drafts that already
    /// went out keep the error of their last attempt.
    fn stopped(mut self, reason: SkipReason) -> SubmissionResult {
        match self.last_error.take() {
            Some(error) => self.finish(Outcome::Failed { error }),
            None => self.finish(Outcome::Skipped { reason }),
        }
    }
}

impl<G: IssueGateway> Worker<G> {
    /// Draw drafts from the shared cursor until none are left. Each result
    /// lands in its input slot as soon as the draft is terminal, so a later
    /// panic cannot take finished drafts down with it.
    pub(crate) async fn run(self) {
        loop {
            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            let Some(queued) = self.drafts.get(index) else {
                break;
            };
            let result = self.drive(queued).await;
            if let Some(tx) = &self.progress {
                // A host that stopped listening does not stop the batch.
                let _ = tx.send(ProgressEvent {
                    draft_id: result.draft_id,
                    outcome: result.outcome.kind(),
                });
            }
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(result);
            }
        }
    }

    /// Take one draft from `Pending` to a terminal outcome.
    async fn drive(&self, queued: &QueuedDraft) -> SubmissionResult {
        let mut attempts = Attempts {
            id: queued.id,
            sent: 0,
            ambiguous: false,
            last_error: None,
        };

        if let Some(reason) = self.stop.reason() {
            return attempts.stopped(reason);
        }
        if !queued.draft.is_submittable() {
            tracing::debug!(draft = %queued.id, "rejecting draft with empty title");
            let error = PermanentError::ValidationFailed {
                status: None,
                message: "title must not be empty".to_owned(),
            };
            return attempts.finish(Outcome::Failed {
                error: error.into(),
            });
        }

        let issue = NewIssue::from(&queued.draft);
        loop {
            if let Some(reason) = self.stop.reason() {
                return attempts.stopped(reason);
            }
            if self.limiter.acquire(self.stop.stopped()).await.is_err() {
                let reason = self.stop.reason().unwrap_or(SkipReason::Cancelled);
                return attempts.stopped(reason);
            }

            attempts.sent += 1;
            tracing::debug!(draft = %queued.id, attempt = attempts.sent, "dispatching create request");
            let reply = self.gateway.create_issue(&self.credential, &issue).await;
            if let Some(budget) = reply.rate_limit {
                self.limiter.observe(budget).await;
            }

            let error = match reply.result {
                Ok(created) => {
                    tracing::info!(draft = %queued.id, number = created.number, "issue created");
                    return attempts.finish(Outcome::Created {
                        number: created.number,
                        url: created.html_url,
                    });
                }
                Err(error) => error,
            };

            if error.is_ambiguous() {
                attempts.ambiguous = true;
                tracing::warn!(
                    draft = %queued.id,
                    "create request outcome unknown ({error}); a retry may duplicate the issue"
                );
            }
            if !error.is_transient() {
                tracing::warn!(draft = %queued.id, "create failed permanently: {error}");
                return attempts.finish(Outcome::Failed { error });
            }

            let retry_index = attempts.sent - 1;
            if retry_index >= self.options.max_retries {
                tracing::warn!(
                    draft = %queued.id,
                    attempts = attempts.sent,
                    "giving up after transient failures: {error}"
                );
                return attempts.finish(Outcome::Failed { error });
            }

            let delay = self
                .options
                .backoff(retry_index)
                .max(error.retry_after().unwrap_or_default());
            tracing::warn!(
                draft = %queued.id,
                delay_ms = delay.as_millis(),
                "transient failure, retry scheduled: {error}"
            );
            attempts.last_error = Some(error);

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                reason = self.stop.stopped() => return attempts.stopped(reason),
            }
        }
    }
}

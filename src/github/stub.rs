use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::auth::Credential;
use super::error::SubmitError;
use super::gateway::{ApiReply, CreatedIssue, IssueGateway, NewIssue, RepoInfo, RepoPermissions};
use super::rate_limit::RateLimitState;
use crate::submit::CancelHandle;

/// What the stub does with the next create request for a given title.
#[derive(Debug, Clone)]
pub enum StubStep {
    Create,
    Fail(SubmitError),
    /// Panic inside the request, as a buggy gateway would.
    Panic,
}

/// One create request as seen by the stub.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub title: String,
    pub at: DateTime<Utc>,
}

#[derive(Default)]
struct Records {
    attempts: HashMap<String, u32>,
    dispatches: Vec<Dispatch>,
    repository_fetches: u32,
}

/// A scripted gateway that answers without any network calls.
///
/// Useful for integration tests and demos that must not require a
/// `GITHUB_TOKEN`. Create requests are matched by issue title; titles
/// without a script succeed on every attempt.
pub struct StubGateway {
    repository: ApiReply<RepoInfo>,
    latency: Duration,
    scripts: Mutex<HashMap<String, VecDeque<StubStep>>>,
    budgets: Mutex<VecDeque<RateLimitState>>,
    cancel_hooks: Mutex<HashMap<String, CancelHandle>>,
    records: Mutex<Records>,
    next_number: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for StubGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StubGateway {
    pub fn new() -> Self {
        let repository = RepoInfo {
            full_name: "stub/repo".to_owned(),
            has_issues: true,
            private: false,
            permissions: Some(RepoPermissions {
                push: true,
                pull: true,
                ..RepoPermissions::default()
            }),
        };
        Self {
            repository: ApiReply::ok(repository, None),
            latency: Duration::ZERO,
            scripts: Mutex::new(HashMap::new()),
            budgets: Mutex::new(VecDeque::new()),
            cancel_hooks: Mutex::new(HashMap::new()),
            records: Mutex::new(Records::default()),
            next_number: AtomicU64::new(1),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delay applied to every create request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_repository(mut self, repository: RepoInfo) -> Self {
        self.repository = ApiReply::ok(repository, None);
        self
    }

    pub fn with_repository_error(mut self, error: impl Into<SubmitError>) -> Self {
        self.repository = ApiReply::err(error, None);
        self
    }

    /// Queue the answers for successive create requests with this title.
    pub fn script<I>(self, title: &str, steps: I) -> Self
    where
        I: IntoIterator<Item = StubStep>,
    {
        locked(&self.scripts)
            .entry(title.to_owned())
            .or_default()
            .extend(steps);
        self
    }

    /// Budgets reported by successive create responses, in order.
    pub fn report_budgets<I>(self, budgets: I) -> Self
    where
        I: IntoIterator<Item = RateLimitState>,
    {
        locked(&self.budgets).extend(budgets);
        self
    }

    /// Cancel `handle` while the successful create for `title` is in flight.
    pub fn cancel_when_created(self, title: &str, handle: CancelHandle) -> Self {
        locked(&self.cancel_hooks).insert(title.to_owned(), handle);
        self
    }

    /// Create requests received for `title`.
    pub fn attempts(&self, title: &str) -> u32 {
        locked(&self.records).attempts.get(title).copied().unwrap_or(0)
    }

    pub fn dispatches(&self) -> Vec<Dispatch> {
        locked(&self.records).dispatches.clone()
    }

    pub fn repository_fetches(&self) -> u32 {
        locked(&self.records).repository_fetches
    }

    /// Highest number of create requests that were in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl IssueGateway for StubGateway {
    async fn fetch_repository(&self, _credential: &Credential) -> ApiReply<RepoInfo> {
        locked(&self.records).repository_fetches += 1;
        self.repository.clone()
    }

    async fn create_issue(&self, _credential: &Credential, issue: &NewIssue) -> ApiReply<CreatedIssue> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        {
            let mut records = locked(&self.records);
            *records.attempts.entry(issue.title.clone()).or_default() += 1;
            records.dispatches.push(Dispatch {
                title: issue.title.clone(),
                at: Utc::now(),
            });
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let step = locked(&self.scripts)
            .get_mut(&issue.title)
            .and_then(VecDeque::pop_front)
            .unwrap_or(StubStep::Create);
        let budget = locked(&self.budgets).pop_front();

        let reply = match step {
            StubStep::Create => {
                if let Some(handle) = locked(&self.cancel_hooks).get(&issue.title) {
                    handle.cancel();
                }
                let number = self.next_number.fetch_add(1, Ordering::SeqCst);
                ApiReply::ok(
                    CreatedIssue {
                        number,
                        html_url: format!("https://github.com/stub/repo/issues/{number}"),
                    },
                    budget,
                )
            }
            StubStep::Fail(error) => ApiReply::err(error, budget),
            StubStep::Panic => panic!("stub gateway told to panic on {:?}", issue.title),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

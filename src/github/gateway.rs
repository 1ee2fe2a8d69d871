use serde::{Deserialize, Serialize};

use super::auth::Credential;
use super::error::SubmitError;
use super::rate_limit::RateLimitState;
use crate::types::IssueDraft;

/// Outcome of one API call plus the budget the response reported.
#[derive(Debug, Clone)]
pub struct ApiReply<T> {
    pub result: Result<T, SubmitError>,
    pub rate_limit: Option<RateLimitState>,
}

impl<T> ApiReply<T> {
    pub fn ok(value: T, rate_limit: Option<RateLimitState>) -> Self {
        Self {
            result: Ok(value),
            rate_limit,
        }
    }

    pub fn err(error: impl Into<SubmitError>, rate_limit: Option<RateLimitState>) -> Self {
        Self {
            result: Err(error.into()),
            rate_limit,
        }
    }
}

/// Permissions the authenticated user holds on a repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoPermissions {
    pub admin: bool,
    pub maintain: bool,
    pub push: bool,
    pub triage: bool,
    pub pull: bool,
}

impl RepoPermissions {
    /// Enough access to open and label issues on behalf of the user.
    pub fn can_write_issues(&self) -> bool {
        self.admin || self.maintain || self.push || self.triage
    }
}

/// Subset of `GET /repos/{owner}/{repo}` used for validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub full_name: String,
    #[serde(default = "default_true")]
    pub has_issues: bool,
    #[serde(default)]
    pub private: bool,
    /// Absent when the token cannot see its own permissions.
    #[serde(default)]
    pub permissions: Option<RepoPermissions>,
}

fn default_true() -> bool {
    true
}

/// Body of `POST /repos/{owner}/{repo}/issues`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
}

impl From<&IssueDraft> for NewIssue {
    fn from(draft: &IssueDraft) -> Self {
        Self {
            title: draft.title.trim().to_owned(),
            body: draft.body.clone(),
            labels: draft.labels.iter().cloned().collect(),
            assignees: draft.assignees.iter().cloned().collect(),
            issue_type: draft.issue_type.clone(),
        }
    }
}

/// Subset of the created issue returned by GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedIssue {
    pub number: u64,
    pub html_url: String,
}

/// The REST operations the submission engine needs.
///
/// Implemented by [`GitHubClient`](super::client::GitHubClient) against the
/// real API and by [`StubGateway`](super::stub::StubGateway) for tests.
pub trait IssueGateway: Send + Sync + 'static {
    /// `GET /repos/{owner}/{repo}`.
    fn fetch_repository(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = ApiReply<RepoInfo>> + Send;

    /// `POST /repos/{owner}/{repo}/issues`.
    fn create_issue(
        &self,
        credential: &Credential,
        issue: &NewIssue,
    ) -> impl Future<Output = ApiReply<CreatedIssue>> + Send;
}

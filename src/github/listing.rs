use std::fmt;

use serde::Deserialize;

use super::auth::Credential;
use super::client::GitHubClient;
use super::gateway::ApiReply;

// ---------------------------------------------------------------------------
// Read-only repository listings used to offer presets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IssueStateFilter {
    #[default]
    Open,
    Closed,
    All,
}

impl fmt::Display for IssueStateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        })
    }
}

/// One row of `GET /repos/{owner}/{repo}/issues`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueSummary {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub html_url: String,
    /// Present when the row is a pull request rather than an issue.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct LabelRow {
    name: String,
}

#[derive(Deserialize)]
struct UserRow {
    login: String,
}

const PAGE: &str = "per_page=100";

impl GitHubClient {
    /// Names of the labels defined on the repository.
    pub async fn list_labels(&self, credential: &Credential) -> ApiReply<Vec<String>> {
        let repo = credential.repo();
        let path = format!("/repos/{}/{}/labels?{PAGE}", repo.owner(), repo.name());
        let reply = self.request_json::<Vec<LabelRow>>(credential, &path, None).await;
        ApiReply {
            result: reply
                .result
                .map(|rows| rows.into_iter().map(|row| row.name).collect()),
            rate_limit: reply.rate_limit,
        }
    }

    /// Logins of the repository's collaborators.
    pub async fn list_collaborators(&self, credential: &Credential) -> ApiReply<Vec<String>> {
        let repo = credential.repo();
        let path = format!("/repos/{}/{}/collaborators?{PAGE}", repo.owner(), repo.name());
        let reply = self.request_json::<Vec<UserRow>>(credential, &path, None).await;
        ApiReply {
            result: reply
                .result
                .map(|rows| rows.into_iter().map(|row| row.login).collect()),
            rate_limit: reply.rate_limit,
        }
    }

    /// Existing issues in the given state. Pull requests are filtered out.
    pub async fn list_issues(
        &self,
        credential: &Credential,
        state: IssueStateFilter,
    ) -> ApiReply<Vec<IssueSummary>> {
        let repo = credential.repo();
        let path = format!(
            "/repos/{}/{}/issues?state={state}&{PAGE}",
            repo.owner(),
            repo.name()
        );
        let reply = self.request_json::<Vec<IssueSummary>>(credential, &path, None).await;
        ApiReply {
            result: reply.result.map(|rows| {
                rows.into_iter()
                    .filter(|row| row.pull_request.is_none())
                    .collect()
            }),
            rate_limit: reply.rate_limit,
        }
    }
}

// github module: REST gateway, credentials and rate-limit handling

pub mod auth;
pub mod client;
pub mod error;
pub mod gateway;
pub mod listing;
pub mod rate_limit;
pub mod stub;

pub use auth::{Credential, RepoId, RepoIdError};
pub use client::GitHubClient;
pub use error::{PermanentError, SubmitError, TransientError};
pub use gateway::{ApiReply, CreatedIssue, IssueGateway, NewIssue, RepoInfo, RepoPermissions};
pub use listing::{IssueStateFilter, IssueSummary};
pub use rate_limit::{RateLimitState, RateLimiter};
pub use stub::{Dispatch, StubGateway, StubStep};

//! Credential validation: one read-only repository fetch per (token, repo).

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use thiserror::Error;

use crate::github::{Credential, IssueGateway, PermanentError, RepoInfo, SubmitError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("GitHub rejected the token")]
    Unauthorized,
    #[error("repository {0} does not exist or is not visible to this token")]
    RepoNotFound(String),
    #[error("the token cannot create issues on {0}")]
    InsufficientScope(String),
    #[error("issues are disabled on {0}")]
    IssuesDisabled(String),
    #[error("could not reach GitHub: {0}")]
    Unreachable(String),
}

/// A credential that passed validation, with the repository it was checked
/// against. Only [`CredentialValidator`] creates these.
#[derive(Debug, Clone)]
pub struct ValidCredential {
    credential: Credential,
    repository: RepoInfo,
}

impl ValidCredential {
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn repository(&self) -> &RepoInfo {
        &self.repository
    }
}

/// Validates credentials against their target repository, remembering
/// successes for the rest of the session.
pub struct CredentialValidator<G> {
    gateway: Arc<G>,
    validated: Cache<Credential, ValidCredential>,
}

impl<G: IssueGateway> CredentialValidator<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        let validated = Cache::builder()
            .max_capacity(64)
            .time_to_live(Duration::from_secs(12 * 60 * 60))
            .build();
        Self { gateway, validated }
    }

    /// Check that the token can see the repository and open issues on it.
    ///
    /// Auth failures are returned as-is, never retried.
    pub async fn validate(&self, credential: &Credential) -> Result<ValidCredential, AuthError> {
        if let Some(valid) = self.validated.get(credential).await {
            tracing::debug!(repo = %credential.repo(), "credential already validated");
            return Ok(valid);
        }
        if credential.token().is_empty() {
            return Err(AuthError::Unauthorized);
        }

        let repo = credential.repo().to_string();
        tracing::info!(%repo, "validating credential");
        let reply = self.gateway.fetch_repository(credential).await;
        let info = match reply.result {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(%repo, "credential validation failed: {e}");
                return Err(auth_error(e, &repo));
            }
        };

        if !info.has_issues {
            return Err(AuthError::IssuesDisabled(repo));
        }
        if !info.permissions.is_some_and(|p| p.can_write_issues()) {
            return Err(AuthError::InsufficientScope(repo));
        }

        let valid = ValidCredential {
            credential: credential.clone(),
            repository: info,
        };
        self.validated.insert(credential.clone(), valid.clone()).await;
        Ok(valid)
    }

    /// Drop a remembered validation, e.g. when the user revokes a token.
    pub async fn forget(&self, credential: &Credential) {
        self.validated.invalidate(credential).await;
    }
}

fn auth_error(error: SubmitError, repo: &str) -> AuthError {
    match error {
        SubmitError::Permanent(PermanentError::Unauthorized { .. }) => AuthError::Unauthorized,
        SubmitError::Permanent(PermanentError::NotFound { .. }) => {
            AuthError::RepoNotFound(repo.to_owned())
        }
        SubmitError::Permanent(PermanentError::Forbidden { .. }) => {
            AuthError::InsufficientScope(repo.to_owned())
        }
        other => AuthError::Unreachable(other.to_string()),
    }
}

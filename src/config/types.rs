use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::github::auth::{self, Credential, RepoId};
use crate::github::client::DEFAULT_API_BASE;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub github: GitHubConfig,
    pub submit: SubmitDefaults,
    pub presets: Presets,
    pub tokens: TokenHistory,
}

// ---------------------------------------------------------------------------
// GitHub connection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_base: String,
    pub request_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_repository: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_owned(),
            request_timeout_secs: 30,
            last_repository: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Submission defaults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitDefaults {
    pub max_concurrency: usize,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub max_backoff_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
}

impl Default for SubmitDefaults {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_retries: 3,
            retry_backoff_base_ms: 500,
            max_backoff_secs: 30,
            deadline_secs: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Presets {
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
}

// ---------------------------------------------------------------------------
// Token history
// ---------------------------------------------------------------------------

/// Previously used tokens, most recent first. Entries are opaque.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenHistory {
    pub history: Vec<String>,
}

impl TokenHistory {
    pub const MAX_ENTRIES: usize = 5;

    /// Move `token` to the front, dropping the oldest entries past the cap.
    pub fn remember(&mut self, token: &str) {
        let token = token.trim();
        if token.is_empty() {
            return;
        }
        self.history.retain(|t| t != token);
        self.history.insert(0, token.to_owned());
        self.history.truncate(Self::MAX_ENTRIES);
    }

    pub fn most_recent(&self) -> Option<&str> {
        self.history.first().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

// ---------------------------------------------------------------------------
// Session bootstrap
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Build the credential to validate at session start.
    ///
    /// The token is the one typed by the user, else the most recent history
    /// entry, else the environment / gh CLI. The repository is the one typed,
    /// else the last used.
    pub fn initial_credential(&self, token: Option<&str>, repo: Option<&str>) -> Result<Credential> {
        let repo: RepoId = repo
            .or(self.github.last_repository.as_deref())
            .context("no repository given and none used before")?
            .parse()?;
        let token = match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => token.to_owned(),
            None => match self.tokens.most_recent() {
                Some(token) => token.to_owned(),
                None => auth::resolve_token()?,
            },
        };
        Ok(Credential::new(token, repo))
    }

    /// Remember a credential that passed validation.
    pub fn record_validated(&mut self, credential: &Credential) {
        self.tokens.remember(credential.token());
        self.github.last_repository = Some(credential.repo().to_string());
    }
}

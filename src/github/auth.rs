use std::fmt;
use std::process::Command;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Repository identifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid repository \"{0}\": expected owner/name")]
pub struct RepoIdError(pub String);

/// Target repository, `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    owner: String,
    name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoIdError> {
        let owner = owner.into().trim().to_owned();
        let name = name.into().trim().to_owned();
        if owner.is_empty() || name.is_empty() || owner.contains('/') || name.contains('/') {
            return Err(RepoIdError(format!("{owner}/{name}")));
        }
        Ok(Self { owner, name })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = RepoIdError;

    /// Accepts `owner/name`, `owner/name.git` and `https://github.com/owner/name`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let path = trimmed
            .strip_prefix("https://github.com/")
            .or_else(|| trimmed.strip_prefix("http://github.com/"))
            .or_else(|| trimmed.strip_prefix("github.com/"))
            .unwrap_or(trimmed)
            .trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let mut parts = path.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) => {
                Self::new(owner, name).map_err(|_| RepoIdError(s.to_owned()))
            }
            _ => Err(RepoIdError(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// A personal access token bound to the repository it will be used against.
///
/// The token is never printed: `Debug` redacts it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential {
    token: Arc<str>,
    repo: RepoId,
}

impl Credential {
    pub fn new(token: impl AsRef<str>, repo: RepoId) -> Self {
        Self {
            token: Arc::from(token.as_ref().trim()),
            repo,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    /// Same token, different target repository.
    pub fn retarget(&self, repo: RepoId) -> Self {
        Self {
            token: Arc::clone(&self.token),
            repo,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("repo", &self.repo)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Token discovery
// ---------------------------------------------------------------------------

/// Resolve a GitHub token when the user did not type one.
///
/// Priority:
/// 1. `GH_TOKEN` environment variable
/// 2. `GITHUB_TOKEN` environment variable
/// 3. `gh auth token --hostname github.com` (gh CLI)
pub fn resolve_token() -> Result<String> {
    if let Ok(token) = std::env::var("GH_TOKEN")
        && !token.is_empty()
    {
        return Ok(token);
    }
    if let Ok(token) = std::env::var("GITHUB_TOKEN")
        && !token.is_empty()
    {
        return Ok(token);
    }
    if let Ok(token) = token_from_gh_cli() {
        return Ok(token);
    }

    bail!("no GitHub token found. Set GH_TOKEN / GITHUB_TOKEN or run `gh auth login`.")
}

fn token_from_gh_cli() -> Result<String> {
    let output = Command::new("gh")
        .args(["auth", "token", "--hostname", "github.com"])
        .output()
        .context("failed to run `gh auth token`")?;

    if !output.status.success() {
        bail!("gh auth token exited with non-zero status");
    }

    let token = String::from_utf8(output.stdout)
        .context("gh auth token produced non-UTF-8 output")?
        .trim()
        .to_owned();

    if token.is_empty() {
        bail!("gh auth token returned empty string");
    }

    Ok(token)
}

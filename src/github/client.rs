use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::{HeaderMap, StatusCode};
use octocrab::Octocrab;
use octocrab::service::middleware::retry::RetryConfig;
use serde::de::DeserializeOwned;

use super::auth::Credential;
use super::error::{PermanentError, SubmitError, TransientError, classify_response};
use super::gateway::{ApiReply, CreatedIssue, IssueGateway, NewIssue, RepoInfo};
use super::rate_limit::RateLimitState;
use crate::config::types::GitHubConfig;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// A GitHub REST client that keeps one Octocrab instance per token.
///
/// Octocrab's built-in retry layer is disabled: the submitter owns retries so
/// that every dispatch is counted and classified.
pub struct GitHubClient {
    base_uri: String,
    request_timeout: Duration,
    instances: Mutex<HashMap<Arc<str>, Arc<Octocrab>>>,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Self {
        Self::with_base_uri(
            config.api_base.clone(),
            Duration::from_secs(config.request_timeout_secs.max(1)),
        )
    }

    pub fn with_base_uri(base_uri: impl Into<String>, request_timeout: Duration) -> Self {
        // Another component may already have installed a provider.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        Self {
            base_uri: base_uri.into().trim_end_matches('/').to_owned(),
            request_timeout,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create an Octocrab instance for the credential's token.
    fn octocrab_for(&self, credential: &Credential) -> Result<Arc<Octocrab>, SubmitError> {
        let mut instances = self
            .instances
            .lock()
            .map_err(|_| SubmitError::internal("octocrab instance map poisoned"))?;
        if let Some(instance) = instances.get(credential.token()) {
            return Ok(Arc::clone(instance));
        }

        let instance = Octocrab::builder()
            .personal_token(credential.token().to_owned())
            .add_retry_config(RetryConfig::None)
            .base_uri(self.base_uri.clone())
            .map_err(|e| SubmitError::internal(format!("setting base URI: {e}")))?
            .build()
            .map_err(|e| SubmitError::internal(format!("building octocrab instance: {e}")))?;
        let instance = Arc::new(instance);
        instances.insert(Arc::from(credential.token()), Arc::clone(&instance));
        Ok(instance)
    }

    /// Send one request and return the raw body of a successful response.
    ///
    /// `payload` switches the request from `GET` to `POST`.
    pub(crate) async fn request(
        &self,
        credential: &Credential,
        path: &str,
        payload: Option<&serde_json::Value>,
    ) -> ApiReply<String> {
        let octocrab = match self.octocrab_for(credential) {
            Ok(octocrab) => octocrab,
            Err(e) => return ApiReply::err(e, None),
        };
        let uri = format!("{}{path}", self.base_uri);
        let method = if payload.is_some() { "POST" } else { "GET" };
        tracing::debug!("github: {method} {uri}");

        let exchange = async {
            let response = match payload {
                Some(body) => octocrab._post(uri.as_str(), Some(body)).await?,
                None => octocrab._get(uri.as_str()).await?,
            };
            let status = response.status();
            let headers = response.headers().clone();
            let text = octocrab.body_to_string(response).await?;
            Ok::<(StatusCode, HeaderMap, String), octocrab::Error>((status, headers, text))
        };

        let (status, headers, text) = match tokio::time::timeout(self.request_timeout, exchange).await
        {
            Err(_) => {
                tracing::debug!("github: {method} {uri} timed out");
                let after_ms = u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX);
                return ApiReply::err(TransientError::NetworkTimeout { after_ms }, None);
            }
            Ok(Err(e)) => {
                tracing::debug!("github: {method} {uri} transport error: {e}");
                return ApiReply::err(
                    TransientError::Network {
                        message: e.to_string(),
                    },
                    None,
                );
            }
            Ok(Ok(exchange)) => exchange,
        };

        let rate_limit = RateLimitState::from_headers(&headers);
        tracing::debug!(
            status = status.as_u16(),
            remaining = rate_limit.map(|r| r.remaining),
            "github: {method} {uri} answered"
        );
        if status.is_success() {
            ApiReply::ok(text, rate_limit)
        } else {
            ApiReply::err(classify_response(status, &headers, &text), rate_limit)
        }
    }

    /// Like [`request`](Self::request), decoding a successful body as JSON.
    pub(crate) async fn request_json<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        path: &str,
        payload: Option<&serde_json::Value>,
    ) -> ApiReply<T> {
        let reply = self.request(credential, path, payload).await;
        let result = reply.result.and_then(|text| {
            serde_json::from_str(&text).map_err(|e| {
                PermanentError::Internal {
                    message: format!("decoding response from {path}: {e}"),
                }
                .into()
            })
        });
        ApiReply {
            result,
            rate_limit: reply.rate_limit,
        }
    }
}

impl IssueGateway for GitHubClient {
    async fn fetch_repository(&self, credential: &Credential) -> ApiReply<RepoInfo> {
        let repo = credential.repo();
        let path = format!("/repos/{}/{}", repo.owner(), repo.name());
        self.request_json(credential, &path, None).await
    }

    async fn create_issue(&self, credential: &Credential, issue: &NewIssue) -> ApiReply<CreatedIssue> {
        let repo = credential.repo();
        let path = format!("/repos/{}/{}/issues", repo.owner(), repo.name());
        let payload = match serde_json::to_value(issue) {
            Ok(payload) => payload,
            Err(e) => return ApiReply::err(SubmitError::internal(format!("encoding issue: {e}")), None),
        };
        self.request_json(credential, &path, Some(&payload)).await
    }
}

//! Classification of GitHub REST failures into transient and permanent kinds.
//!
//! GitHub signals rate limits through:
//! - HTTP 403 with `x-ratelimit-remaining: 0` (primary budget exhausted)
//! - HTTP 403 or 429 with a "secondary rate limit" message or `retry-after`
//!
//! Everything else in the 4xx range will fail identically on retry, while
//! 5xx responses, timeouts and transport failures are worth another attempt.

use std::time::Duration;

use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failure that is expected to clear up on a later attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransientError {
    #[error("server error (HTTP {status})")]
    ServerError { status: u16 },
    #[error("request timed out after {after_ms} ms")]
    NetworkTimeout { after_ms: u64 },
    #[error("network error: {message}")]
    Network { message: String },
    #[error("secondary rate limit hit (HTTP {status})")]
    SecondaryRateLimit {
        status: u16,
        retry_after_secs: Option<u64>,
    },
    #[error("API rate limit exhausted (HTTP {status})")]
    RateLimitExhausted { status: u16 },
}

/// A failure that will recur identically, so it is never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermanentError {
    #[error("validation failed: {message}")]
    ValidationFailed { status: Option<u16>, message: String },
    #[error("not found (HTTP {status}): {message}")]
    NotFound { status: u16, message: String },
    #[error("conflict (HTTP 409): {message}")]
    Conflict { message: String },
    #[error("unauthorized (HTTP 401): {message}")]
    Unauthorized { message: String },
    #[error("forbidden (HTTP 403): {message}")]
    Forbidden { message: String },
    #[error("rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum SubmitError {
    #[error(transparent)]
    Transient(#[from] TransientError),
    #[error(transparent)]
    Permanent(#[from] PermanentError),
}

impl SubmitError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// The request may have been applied server-side even though no answer
    /// arrived.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            Self::Transient(TransientError::NetworkTimeout { .. } | TransientError::Network { .. })
        )
    }

    /// HTTP status behind the failure, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient(
                TransientError::ServerError { status }
                | TransientError::SecondaryRateLimit { status, .. }
                | TransientError::RateLimitExhausted { status },
            ) => Some(*status),
            Self::Transient(_) => None,
            Self::Permanent(PermanentError::ValidationFailed { status, .. }) => *status,
            Self::Permanent(
                PermanentError::NotFound { status, .. } | PermanentError::Rejected { status, .. },
            ) => Some(*status),
            Self::Permanent(PermanentError::Conflict { .. }) => Some(409),
            Self::Permanent(PermanentError::Unauthorized { .. }) => Some(401),
            Self::Permanent(PermanentError::Forbidden { .. }) => Some(403),
            Self::Permanent(PermanentError::Internal { .. }) => None,
        }
    }

    /// Minimum wait the server asked for before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient(TransientError::SecondaryRateLimit {
                retry_after_secs: Some(secs),
                ..
            }) => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        PermanentError::Internal {
            message: message.into(),
        }
        .into()
    }
}

/// Shape of GitHub's JSON error body.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

/// Extract a readable message from an error body, falling back to the raw text.
pub(crate) fn error_message(body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return body.trim().to_owned();
    };
    let mut message = parsed.message;
    let details: Vec<String> = parsed
        .errors
        .iter()
        .filter_map(|e| match e {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(map) => map
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
                .or_else(|| {
                    let field = map.get("field").and_then(serde_json::Value::as_str)?;
                    let code = map.get("code").and_then(serde_json::Value::as_str)?;
                    Some(format!("{field}: {code}"))
                }),
            _ => None,
        })
        .collect();
    if !details.is_empty() {
        message = format!("{message} ({})", details.join("; "));
    }
    message
}

/// Map a non-success response to a classified error.
pub(crate) fn classify_response(status: StatusCode, headers: &HeaderMap, body: &str) -> SubmitError {
    let code = status.as_u16();
    let message = error_message(body);
    let lowered = message.to_lowercase();

    if status.is_server_error() {
        return TransientError::ServerError { status: code }.into();
    }

    let retry_after_secs = header_u64(headers, "retry-after");
    if code == 429 || (code == 403 && (lowered.contains("secondary rate limit") || retry_after_secs.is_some())) {
        return TransientError::SecondaryRateLimit {
            status: code,
            retry_after_secs,
        }
        .into();
    }
    if code == 403
        && (header_u64(headers, "x-ratelimit-remaining") == Some(0)
            || lowered.contains("api rate limit exceeded"))
    {
        return TransientError::RateLimitExhausted { status: code }.into();
    }

    match code {
        400 | 422 => PermanentError::ValidationFailed {
            status: Some(code),
            message,
        },
        401 => PermanentError::Unauthorized { message },
        403 => PermanentError::Forbidden { message },
        404 | 410 => PermanentError::NotFound {
            status: code,
            message,
        },
        409 => PermanentError::Conflict { message },
        _ => PermanentError::Rejected {
            status: code,
            message,
        },
    }
    .into()
}

pub(crate) fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn server_errors_are_transient() {
        let err = classify_response(StatusCode::BAD_GATEWAY, &HeaderMap::new(), "");
        assert_eq!(err, SubmitError::Transient(TransientError::ServerError { status: 502 }));
        assert!(err.is_transient());
        assert!(!err.is_ambiguous());
    }

    #[test]
    fn unprocessable_entity_is_validation_failure() {
        let body = r#"{"message":"Validation Failed","errors":[{"resource":"Issue","field":"title","code":"missing_field"}]}"#;
        let err = classify_response(StatusCode::UNPROCESSABLE_ENTITY, &HeaderMap::new(), body);
        match err {
            SubmitError::Permanent(PermanentError::ValidationFailed { status, message }) => {
                assert_eq!(status, Some(422));
                assert_eq!(message, "Validation Failed (title: missing_field)");
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn secondary_rate_limit_reads_retry_after() {
        let body = r#"{"message":"You have exceeded a secondary rate limit"}"#;
        let err = classify_response(StatusCode::FORBIDDEN, &headers(&[("retry-after", "7")]), body);
        assert!(err.is_transient());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn too_many_requests_is_secondary_rate_limit() {
        let err = classify_response(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new(), "");
        assert!(matches!(
            err,
            SubmitError::Transient(TransientError::SecondaryRateLimit { status: 429, .. })
        ));
    }

    #[test]
    fn exhausted_primary_budget_is_transient() {
        let body = r#"{"message":"API rate limit exceeded for user ID 1."}"#;
        let err = classify_response(
            StatusCode::FORBIDDEN,
            &headers(&[("x-ratelimit-remaining", "0")]),
            body,
        );
        assert_eq!(
            err,
            SubmitError::Transient(TransientError::RateLimitExhausted { status: 403 })
        );
    }

    #[test]
    fn plain_forbidden_is_permanent() {
        let body = r#"{"message":"Resource not accessible by personal access token"}"#;
        let err = classify_response(
            StatusCode::FORBIDDEN,
            &headers(&[("x-ratelimit-remaining", "4000")]),
            body,
        );
        assert!(matches!(err, SubmitError::Permanent(PermanentError::Forbidden { .. })));
    }

    #[test]
    fn not_found_and_conflict_are_permanent() {
        let not_found = classify_response(StatusCode::NOT_FOUND, &HeaderMap::new(), r#"{"message":"Not Found"}"#);
        assert_eq!(not_found.status(), Some(404));
        assert!(!not_found.is_transient());

        let conflict = classify_response(StatusCode::CONFLICT, &HeaderMap::new(), "");
        assert!(matches!(conflict, SubmitError::Permanent(PermanentError::Conflict { .. })));
    }

    #[test]
    fn timeouts_and_transport_failures_are_ambiguous() {
        let timeout: SubmitError = TransientError::NetworkTimeout { after_ms: 100 }.into();
        let transport: SubmitError = TransientError::Network {
            message: "connection reset".into(),
        }
        .into();
        assert!(timeout.is_ambiguous());
        assert!(transport.is_ambiguous());
        assert_eq!(timeout.status(), None);
    }

    #[test]
    fn non_json_body_is_kept_verbatim() {
        assert_eq!(error_message("  upstream hiccup \n"), "upstream hiccup");
    }
}

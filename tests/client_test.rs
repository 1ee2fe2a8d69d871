use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gh_batch::github::{
    Credential, GitHubClient, IssueGateway, IssueStateFilter, NewIssue, PermanentError, SubmitError,
    TransientError,
};
use gh_batch::types::IssueDraft;
use gh_batch::validator::{AuthError, CredentialValidator};

fn credential() -> Credential {
    Credential::new("ghp_test", "octo/hello".parse().unwrap())
}

fn client(server: &MockServer) -> GitHubClient {
    GitHubClient::with_base_uri(server.uri(), Duration::from_secs(5))
}

fn repository(push: bool) -> serde_json::Value {
    json!({
        "full_name": "octo/hello",
        "has_issues": true,
        "private": false,
        "permissions": { "admin": false, "maintain": false, "push": push, "triage": false, "pull": true }
    })
}

#[tokio::test]
async fn create_issue_sends_payload_and_reads_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/hello/issues"))
        .and(body_json(json!({
            "title": "Crash on start",
            "body": "Steps...",
            "labels": ["bug"]
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("x-ratelimit-remaining", "41")
                .insert_header("x-ratelimit-reset", "1900000000")
                .set_body_json(json!({
                    "number": 17,
                    "html_url": "https://github.com/octo/hello/issues/17"
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let draft = IssueDraft::new("Crash on start", "Steps...").with_labels(["bug"]);
    let reply = client(&server)
        .create_issue(&credential(), &NewIssue::from(&draft))
        .await;

    let created = reply.result.unwrap();
    assert_eq!(created.number, 17);
    assert_eq!(created.html_url, "https://github.com/octo/hello/issues/17");
    let budget = reply.rate_limit.expect("rate-limit headers should be parsed");
    assert_eq!(budget.remaining, 41);
    assert_eq!(budget.reset_at.timestamp(), 1_900_000_000);
}

#[tokio::test]
async fn unprocessable_entity_is_a_validation_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/hello/issues"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Validation Failed",
            "errors": [{ "resource": "Issue", "code": "invalid", "field": "assignees" }]
        })))
        .mount(&server)
        .await;

    let draft = IssueDraft::new("Title", "");
    let reply = client(&server)
        .create_issue(&credential(), &NewIssue::from(&draft))
        .await;

    match reply.result {
        Err(SubmitError::Permanent(PermanentError::ValidationFailed { status, message })) => {
            assert_eq!(status, Some(422));
            assert!(message.starts_with("Validation Failed"));
        }
        other => panic!("expected a validation failure, got {other:?}"),
    }
}

#[tokio::test]
async fn bad_gateway_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/hello/issues"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let draft = IssueDraft::new("Title", "");
    let reply = client(&server)
        .create_issue(&credential(), &NewIssue::from(&draft))
        .await;

    let error = reply.result.unwrap_err();
    assert!(error.is_transient());
    assert_eq!(error, SubmitError::Transient(TransientError::ServerError { status: 502 }));
}

#[tokio::test]
async fn slow_response_times_out_as_ambiguous() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/hello/issues"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_delay(Duration::from_secs(2))
                .set_body_json(json!({ "number": 1, "html_url": "x" })),
        )
        .mount(&server)
        .await;

    let client = GitHubClient::with_base_uri(server.uri(), Duration::from_millis(100));
    let draft = IssueDraft::new("Title", "");
    let reply = client.create_issue(&credential(), &NewIssue::from(&draft)).await;

    let error = reply.result.unwrap_err();
    assert!(matches!(
        error,
        SubmitError::Transient(TransientError::NetworkTimeout { after_ms: 100 })
    ));
    assert!(error.is_ambiguous());
}

#[tokio::test]
async fn validation_accepts_a_writable_repository() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repository(true)))
        .expect(1)
        .mount(&server)
        .await;

    let validator = CredentialValidator::new(Arc::new(client(&server)));
    let valid = validator.validate(&credential()).await.unwrap();
    assert_eq!(valid.repository().full_name, "octo/hello");

    // A second validation is answered from the cache.
    validator.validate(&credential()).await.unwrap();
}

#[tokio::test]
async fn validation_reports_read_only_access() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repository(false)))
        .mount(&server)
        .await;

    let validator = CredentialValidator::new(Arc::new(client(&server)));
    let error = validator.validate(&credential()).await.unwrap_err();
    assert_eq!(error, AuthError::InsufficientScope("octo/hello".to_owned()));
}

#[tokio::test]
async fn validation_maps_http_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .mount(&server)
        .await;

    let validator = CredentialValidator::new(Arc::new(client(&server)));
    assert_eq!(
        validator.validate(&credential()).await.unwrap_err(),
        AuthError::Unauthorized
    );
    let missing = Credential::new("ghp_test", "octo/missing".parse().unwrap());
    assert_eq!(
        validator.validate(&missing).await.unwrap_err(),
        AuthError::RepoNotFound("octo/missing".to_owned())
    );
}

#[tokio::test]
async fn listings_return_names_and_skip_pull_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/labels"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "name": "bug" }, { "name": "documentation" }])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/collaborators"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "login": "octocat" }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/issues"))
        .and(query_param("state", "closed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "number": 3, "title": "Old bug", "state": "closed", "html_url": "https://github.com/octo/hello/issues/3" },
            {
                "number": 4, "title": "Fix", "state": "closed", "html_url": "https://github.com/octo/hello/pull/4",
                "pull_request": { "url": "https://api.github.com/repos/octo/hello/pulls/4" }
            }
        ])))
        .mount(&server)
        .await;

    let client = client(&server);
    let cred = credential();

    assert_eq!(
        client.list_labels(&cred).await.result.unwrap(),
        vec!["bug".to_owned(), "documentation".to_owned()]
    );
    assert_eq!(
        client.list_collaborators(&cred).await.result.unwrap(),
        vec!["octocat".to_owned()]
    );
    let issues = client
        .list_issues(&cred, IssueStateFilter::Closed)
        .await
        .result
        .unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].number, 3);
}

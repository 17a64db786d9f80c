//! Service-account authentication against a mocked token endpoint.
//!
//! A rejected first token aborts the run at connect time; a rejected refresh
//! later on only fails the records written with it.

use std::path::{Path, PathBuf};

use kuma_upload_lib::{
    FirestoreClient, FirestoreError, RecordOutcome, ServiceAccount, UploadConfig, upload_stories,
};
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn account_for(server: &MockServer) -> ServiceAccount {
    let mut account = ServiceAccount::from_file(fixture("service-account.json")).unwrap();
    account.token_uri = format!("{}/token", server.uri());
    account
}

fn token(expires_in: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": "ya29.short-lived",
        "expires_in": expires_in,
        "token_type": "Bearer"
    }))
}

#[tokio::test]
async fn rejected_first_token_fails_connect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let config = UploadConfig::default();
    let err = config.connect(&account_for(&server)).await.unwrap_err();

    assert!(matches!(err, FirestoreError::Auth(_)), "unexpected error: {err:?}");
    assert!(err.to_string().contains("invalid_grant"));
}

#[tokio::test]
async fn failed_refresh_fails_records_and_run_continues() {
    let server = MockServer::start().await;
    // Tokens expire inside the refresh margin, so every write fetches a new
    // one: the first two exchanges succeed, every later one is refused.
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(token(30))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token revoked"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = FirestoreClient::builder("kuma-test")
        .base_url(Url::parse(&server.uri()).unwrap())
        .build(&account_for(&server))
        .unwrap();
    client.authenticate().await.unwrap();

    let stories = vec![
        json!({ "id": "kuma-forest", "title": "Kuma in the Forest" }),
        json!({ "id": "kuma-river", "title": "Kuma and the River" }),
        json!({ "id": "kuma-stars", "title": "Kuma Counts the Stars" }),
    ];
    let mut outcomes = Vec::new();
    let report = upload_stories(&client, "stories", stories, |r| {
        outcomes.push(r.outcome.clone())
    })
    .await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 2);
    assert_eq!(report.rejected, 0);
    assert_eq!(outcomes[0], RecordOutcome::Uploaded);
    for outcome in &outcomes[1..] {
        assert!(
            matches!(outcome, RecordOutcome::Failed(msg) if msg.contains("401")),
            "unexpected outcome: {outcome:?}"
        );
    }
}

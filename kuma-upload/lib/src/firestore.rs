//! Minimal Firestore REST client.
//!
//! Only the single call the uploader needs is implemented: a `PATCH` on a
//! document path without an update mask, which creates the document or
//! replaces it entirely (the same semantics as the admin SDKs' `set()`).

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{Span, debug, instrument};
use url::Url;

use crate::auth::TokenSource;
use crate::credentials::ServiceAccount;
use crate::error::FirestoreError;
use crate::story::check_path_segment;
use crate::upload::DocumentSink;
use crate::value::encode_document;

/// Production REST endpoint.
pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/";

/// Database id used when a project has a single database.
pub const DEFAULT_DATABASE: &str = "(default)";

/// Environment variable pointing the client at a local emulator.
pub const EMULATOR_HOST_ENV: &str = "FIRESTORE_EMULATOR_HOST";

/// Token the emulator accepts as an admin credential.
const EMULATOR_TOKEN: &str = "owner";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Google's JSON error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Builder for configuring a [`FirestoreClient`].
#[derive(Debug)]
pub struct FirestoreClientBuilder {
    project_id: String,
    database: String,
    base_url: Option<Url>,
    emulator_host: Option<String>,
    timeout: Duration,
}

impl FirestoreClientBuilder {
    fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_string(),
            base_url: None,
            emulator_host: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Targets a named database instead of `(default)`.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Overrides the REST endpoint.
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Sends requests to a local emulator (`host:port`) with the emulator's
    /// admin token instead of a service-account token.
    pub fn emulator_host(mut self, host: Option<String>) -> Self {
        self.emulator_host = host;
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the client, loading the service account's key.
    ///
    /// The key is loaded in emulator mode too, so a broken credential file is
    /// caught the same way against either backend. No network request is
    /// made; see [`FirestoreClient::authenticate`].
    ///
    /// ## Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed, the base URL
    /// is invalid, or the private key cannot be loaded.
    pub fn build(self, account: &ServiceAccount) -> Result<FirestoreClient, FirestoreError> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()?;

        let account_tokens = TokenSource::service_account(account, http.clone())?;

        let (base_url, tokens) = match self.emulator_host {
            Some(host) => {
                let url = Url::parse(&format!("http://{host}/"))
                    .map_err(|e| FirestoreError::InvalidUrl(format!("{host}: {e}")))?;
                (url, TokenSource::Static(EMULATOR_TOKEN.to_string()))
            }
            None => {
                let url = match self.base_url {
                    Some(url) => url,
                    None => Url::parse(FIRESTORE_BASE_URL)
                        .map_err(|e| FirestoreError::InvalidUrl(e.to_string()))?,
                };
                (url, account_tokens)
            }
        };

        Ok(FirestoreClient {
            http,
            base_url,
            project_id: self.project_id,
            database: self.database,
            tokens,
        })
    }
}

/// Authenticated handle to one Firestore database.
///
/// Constructed once per run and passed to the upload loop.
///
/// ## Examples
///
/// ```rust,no_run
/// use kuma_upload_lib::{FirestoreClient, ServiceAccount};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let account = ServiceAccount::from_file("firebase-credentials.json")?;
/// let client = FirestoreClient::builder(&account.project_id).build(&account)?;
/// client.authenticate().await?;
///
/// let fields = serde_json::json!({ "id": "kuma-forest", "title": "Kuma in the Forest" });
/// client
///     .set_document("stories", "kuma-forest", fields.as_object().unwrap())
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FirestoreClient {
    http: reqwest::Client,
    base_url: Url,
    project_id: String,
    database: String,
    tokens: TokenSource,
}

impl FirestoreClient {
    /// Creates a builder for a client bound to `project_id`.
    pub fn builder(project_id: impl Into<String>) -> FirestoreClientBuilder {
        FirestoreClientBuilder::new(project_id)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns `true` when talking to an emulator with a fixed token.
    pub fn is_emulator(&self) -> bool {
        matches!(self.tokens, TokenSource::Static(_))
    }

    /// Obtains the first access token so credential problems surface before
    /// any document is written.
    ///
    /// ## Errors
    ///
    /// Returns [`FirestoreError::Auth`] if the token exchange fails.
    pub async fn authenticate(&self) -> Result<(), FirestoreError> {
        self.tokens.bearer().await?;
        Ok(())
    }

    /// Returns the REST URL of a document.
    ///
    /// ## Errors
    ///
    /// Returns [`FirestoreError::InvalidUrl`] if `collection` is not a single
    /// path segment or the base URL cannot carry a path.
    pub fn document_url(&self, collection: &str, id: &str) -> Result<Url, FirestoreError> {
        check_path_segment(collection).map_err(|reason| {
            FirestoreError::InvalidUrl(format!("collection {collection:?} {reason}"))
        })?;

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| FirestoreError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend([
                "v1",
                "projects",
                self.project_id.as_str(),
                "databases",
                self.database.as_str(),
                "documents",
                collection,
                id,
            ]);
        Ok(url)
    }

    /// Creates or fully replaces the document `collection/id` with `fields`.
    ///
    /// ## Errors
    ///
    /// Returns an error if a token cannot be obtained, the request fails, or
    /// the server answers with a non-success status.
    #[instrument(
        name = "set_document",
        skip(self, fields),
        fields(http.status_code = tracing::field::Empty)
    )]
    pub async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), FirestoreError> {
        let url = self.document_url(collection, id)?;
        let bearer = self.tokens.bearer().await?;

        let response = self
            .http
            .patch(url)
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .json(&encode_document(fields))
            .send()
            .await?;

        let status = response.status();
        Span::current().record("http.status_code", status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FirestoreError::HttpStatus {
                status: status.as_u16(),
                message: error_message(&body, status),
            });
        }

        debug!("document written");
        Ok(())
    }
}

impl DocumentSink for FirestoreClient {
    type Error = FirestoreError;

    async fn write(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), FirestoreError> {
        self.set_document(collection, id, fields).await
    }
}

/// Pulls the human-readable message out of a Google error body.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("{code}: {}", envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture_account() -> ServiceAccount {
        ServiceAccount::from_file(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/service-account.json"
        ))
        .unwrap()
    }

    fn emulator_client(server: &MockServer) -> FirestoreClient {
        let host = server.address().to_string();
        FirestoreClient::builder("kuma-test")
            .emulator_host(Some(host))
            .build(&fixture_account())
            .unwrap()
    }

    #[test]
    fn document_url_addresses_default_database() {
        let client = FirestoreClient::builder("kuma-test")
            .build(&fixture_account())
            .unwrap();

        let url = client.document_url("stories", "kuma-forest").unwrap();
        assert_eq!(
            url.as_str(),
            "https://firestore.googleapis.com/v1/projects/kuma-test/databases/(default)/documents/stories/kuma-forest"
        );
        assert!(!client.is_emulator());
    }

    #[test]
    fn document_url_escapes_id() {
        let client = FirestoreClient::builder("kuma-test")
            .database("stories-db")
            .build(&fixture_account())
            .unwrap();

        let url = client.document_url("stories", "kuma forest?").unwrap();
        assert!(
            url.path()
                .ends_with("/databases/stories-db/documents/stories/kuma%20forest%3F")
        );
    }

    #[test]
    fn document_url_rejects_unusable_collection() {
        let client = FirestoreClient::builder("kuma-test")
            .build(&fixture_account())
            .unwrap();

        for collection in ["", "stories/extra"] {
            let err = client.document_url(collection, "kuma-forest").unwrap_err();
            assert!(
                matches!(err, FirestoreError::InvalidUrl(_)),
                "accepted collection {collection:?}"
            );
        }
    }

    #[tokio::test]
    async fn empty_collection_is_never_written() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let client = emulator_client(&server);
        let err = client
            .set_document("", "kuma-forest", &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FirestoreError::InvalidUrl(_)));
    }

    #[test]
    fn emulator_host_switches_to_plain_http() {
        let client = FirestoreClient::builder("kuma-test")
            .emulator_host(Some("localhost:8080".to_string()))
            .build(&fixture_account())
            .unwrap();

        assert!(client.is_emulator());
        assert_eq!(client.base_url().as_str(), "http://localhost:8080/");
    }

    #[test]
    fn build_fails_on_unusable_key() {
        let mut account = fixture_account();
        account.private_key = "garbage".to_string();
        let err = FirestoreClient::builder("kuma-test").build(&account).unwrap_err();
        assert!(matches!(err, FirestoreError::Auth(_)));
    }

    #[test]
    fn emulator_build_still_loads_the_key() {
        let mut account = fixture_account();
        account.private_key = "garbage".to_string();
        let err = FirestoreClient::builder("kuma-test")
            .emulator_host(Some("localhost:8080".to_string()))
            .build(&account)
            .unwrap_err();
        assert!(matches!(err, FirestoreError::Auth(AuthError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn set_document_patches_encoded_fields() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path(
                "/v1/projects/kuma-test/databases/(default)/documents/stories/kuma-forest",
            ))
            .and(header("authorization", "Bearer owner"))
            .and(body_json(json!({ "fields": {
                "id": { "stringValue": "kuma-forest" },
                "title": { "stringValue": "Kuma in the Forest" },
                "duration_minutes": { "integerValue": "5" }
            } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = emulator_client(&server);
        let fields = json!({
            "id": "kuma-forest",
            "title": "Kuma in the Forest",
            "duration_minutes": 5
        });

        client
            .set_document("stories", "kuma-forest", fields.as_object().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn set_document_surfaces_google_error_message() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": 403,
                    "message": "Missing or insufficient permissions.",
                    "status": "PERMISSION_DENIED"
                }
            })))
            .mount(&server)
            .await;

        let client = emulator_client(&server);
        let err = client
            .set_document("stories", "kuma-river", &Map::new())
            .await
            .unwrap_err();

        match err {
            FirestoreError::HttpStatus { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(
                    message,
                    "PERMISSION_DENIED: Missing or insufficient permissions."
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn service_account_token_is_sent_on_writes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.write-token",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PATCH"))
            .and(header("authorization", "Bearer ya29.write-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(2)
            .mount(&server)
            .await;

        let mut account = fixture_account();
        account.token_uri = format!("{}/token", server.uri());

        let client = FirestoreClient::builder("kuma-test")
            .base_url(Url::parse(&server.uri()).unwrap())
            .build(&account)
            .unwrap();

        client.authenticate().await.unwrap();
        client.set_document("stories", "a", &Map::new()).await.unwrap();
        client.set_document("stories", "b", &Map::new()).await.unwrap();
    }

    #[test]
    fn error_message_falls_back_to_raw_body_or_status() {
        let status = reqwest::StatusCode::INTERNAL_SERVER_ERROR;
        assert_eq!(error_message("upstream down", status), "upstream down");
        assert_eq!(error_message("", status), "500 Internal Server Error");
        assert_eq!(
            error_message(r#"{"error":{"message":"boom"}}"#, status),
            "boom"
        );
    }
}

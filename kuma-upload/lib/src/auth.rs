//! OAuth 2.0 access tokens for a service account.
//!
//! The service account signs a short-lived RS256 JWT assertion with its
//! private key and trades it at the token endpoint for a bearer token
//! (the "JWT bearer" grant). Tokens are cached and re-fetched shortly before
//! they expire.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use kuma_upload_lib::{ServiceAccount, TokenSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let account = ServiceAccount::from_file("firebase-credentials.json")?;
//! let tokens = TokenSource::service_account(&account, reqwest::Client::new())?;
//! let bearer = tokens.bearer().await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::credentials::ServiceAccount;
use crate::error::AuthError;

/// OAuth scope granting read/write access to Firestore.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each signed assertion (the maximum Google allows).
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens this close to expiry are treated as expired.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// A bearer token and the moment it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Returns `true` if the token is still usable at `now`, with a margin.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Exchanges signed assertions for access tokens on behalf of a service account.
pub struct ServiceAccountAuth {
    http: reqwest::Client,
    client_email: String,
    token_uri: String,
    key_id: Option<String>,
    key: EncodingKey,
    cached: Mutex<Option<AccessToken>>,
}

impl ServiceAccountAuth {
    /// Loads the account's private key.
    ///
    /// ## Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if `private_key` is not an RSA PEM key.
    pub fn new(account: &ServiceAccount, http: reqwest::Client) -> Result<Self, AuthError> {
        let key =
            EncodingKey::from_rsa_pem(account.private_key.as_bytes()).map_err(AuthError::InvalidKey)?;

        Ok(Self {
            http,
            client_email: account.client_email.clone(),
            token_uri: account.token_uri.clone(),
            key_id: account.private_key_id.clone(),
            key,
            cached: Mutex::new(None),
        })
    }

    /// Signs an assertion valid from `now` for one hour.
    fn assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.key).map_err(AuthError::Sign)
    }

    /// Requests a new token from the token endpoint, bypassing the cache.
    ///
    /// ## Errors
    ///
    /// Returns an error if signing fails, the endpoint is unreachable, or it
    /// rejects the assertion.
    #[instrument(name = "token_exchange", skip(self), fields(token_uri = %self.token_uri))]
    pub async fn fetch_token(&self) -> Result<AccessToken, AuthError> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;

        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(AuthError::TokenEndpoint {
                status: status.as_u16(),
                message,
            });
        }

        let body: TokenResponse = response.json().await?;
        let lifetime = body.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        debug!(expires_in = lifetime, "obtained access token");

        Ok(AccessToken {
            value: body.access_token,
            expires_at: now + Duration::seconds(lifetime),
        })
    }

    /// Returns a usable token, fetching a new one if the cached one is stale.
    ///
    /// ## Errors
    ///
    /// Propagates any error from [`fetch_token`](Self::fetch_token).
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh_at(Utc::now()) {
                return Ok(token.value.clone());
            }
            debug!("cached access token is about to expire, refreshing");
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

impl fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Where the bearer token for each request comes from.
#[derive(Debug)]
pub enum TokenSource {
    /// Tokens minted from a service-account key.
    ServiceAccount(ServiceAccountAuth),
    /// A fixed token, as the Firestore emulator accepts (`owner`).
    Static(String),
}

impl TokenSource {
    /// Builds a token source backed by a service account.
    ///
    /// ## Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if the private key cannot be loaded.
    pub fn service_account(
        account: &ServiceAccount,
        http: reqwest::Client,
    ) -> Result<Self, AuthError> {
        ServiceAccountAuth::new(account, http).map(Self::ServiceAccount)
    }

    /// Returns the bearer token to attach to the next request.
    ///
    /// ## Errors
    ///
    /// Returns an error if a service-account token cannot be obtained.
    pub async fn bearer(&self) -> Result<String, AuthError> {
        match self {
            Self::ServiceAccount(auth) => auth.access_token().await,
            Self::Static(token) => Ok(token.clone()),
        }
    }
}

//! Error types for the uploader library.
//!
//! Fatal errors abort the whole run:
//! - [`ConfigError`] - the target collection or database name is unusable
//! - [`CredentialsError`] - the service-account file could not be used
//! - [`StoriesError`] - the stories file could not be loaded
//! - [`AuthError`] - the OAuth token exchange failed
//! - [`FirestoreError`] - a request to the document database failed
//! - [`UploadError`] - top-level wrapper returned by the pipeline entry points
//!
//! [`RecordError`] is the per-record tier: it is counted in the report and
//! never stops the loop.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`UploadConfig::validate`](crate::UploadConfig::validate).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid collection name {name:?}: {reason}")]
    InvalidCollection { name: String, reason: &'static str },

    #[error("invalid database id {name:?}: {reason}")]
    InvalidDatabase { name: String, reason: &'static str },
}

/// Errors raised while loading the service-account credential.
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// The credential file could not be read.
    #[error("failed to read credentials at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The credential file is not valid service-account JSON.
    #[error("failed to parse credentials at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The credential has no usable `project_id`.
    #[error("credentials do not name a project_id")]
    MissingProjectId,
}

/// Errors raised while loading the stories file.
#[derive(Debug, Error)]
pub enum StoriesError {
    /// The stories file could not be read.
    #[error("failed to read stories at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The stories file is not JSON, or has no top-level `stories` array.
    #[error("failed to parse stories at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while obtaining an access token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The `private_key` PEM could not be loaded as an RSA key.
    #[error("invalid service-account private key: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),

    /// Signing the JWT assertion failed.
    #[error("failed to sign token assertion: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),

    /// The token endpoint could not be reached or returned garbage.
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The token endpoint rejected the assertion.
    #[error("token endpoint returned {status}: {message}")]
    TokenEndpoint { status: u16, message: String },
}

/// Errors raised by the Firestore REST client.
#[derive(Debug, Error)]
pub enum FirestoreError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Network failure, timeout, or client construction failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A base URL or document path could not be formed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },
}

/// Reasons a single story record is rejected before any write is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has no string `id`")]
    MissingId,

    #[error("record `id` is empty")]
    EmptyId,

    /// The id cannot address a document in a collection.
    #[error("record id {id:?} is not a valid document id: {reason}")]
    InvalidId { id: String, reason: &'static str },

    #[error("record {id:?} has no string `title`")]
    MissingTitle { id: String },
}

/// Fatal errors that abort an upload or dry run.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    #[error(transparent)]
    Stories(#[from] StoriesError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Firestore(#[from] FirestoreError),
}

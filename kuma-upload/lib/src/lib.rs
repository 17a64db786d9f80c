//! Upload Kuma story records into a Firestore collection.
//!
//! The library covers each step of a one-shot migration from a local JSON
//! file into the hosted database:
//!
//! ## Inputs
//!
//! - [`UploadConfig`] - file paths, target collection and database
//! - [`ServiceAccount`] - the service-account key file
//! - [`StoriesFile`] - the `{ "stories": [...] }` document
//! - [`Story`] - a validated record (`id`, `title`, and any other fields)
//!
//! ## Database access
//!
//! - [`FirestoreClient`] - authenticated REST client, created once per run
//! - [`TokenSource`] - service-account OAuth tokens, or the emulator token
//!
//! ## Uploading
//!
//! - [`upload_stories`] - sequential create-or-replace of every record
//! - [`validate_stories`] - the same checks without any writes (dry run)
//! - [`UploadReport`] - success, rejected and failed counts
//!
//! Fatal errors are returned as [`UploadError`]; a single bad record never
//! stops a run.

mod auth;
mod config;
mod credentials;
mod error;
mod firestore;
mod story;
mod upload;
pub mod value;

pub use auth::{AccessToken, DATASTORE_SCOPE, ServiceAccountAuth, TokenSource};
pub use config::{DEFAULT_COLLECTION, DEFAULT_CREDENTIALS_PATH, DEFAULT_STORIES_PATH, UploadConfig};
pub use credentials::{DEFAULT_TOKEN_URI, ServiceAccount};
pub use error::{
    AuthError, ConfigError, CredentialsError, FirestoreError, RecordError, StoriesError, UploadError,
};
pub use firestore::{
    DEFAULT_DATABASE, EMULATOR_HOST_ENV, FIRESTORE_BASE_URL, FirestoreClient, FirestoreClientBuilder,
};
pub use story::{StoriesFile, Story, display_title};
pub use upload::{
    DocumentSink, RecordOutcome, RecordResult, UploadReport, upload_stories, validate_stories,
};

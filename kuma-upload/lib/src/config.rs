//! Run configuration and the pipeline steps that depend on it.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::credentials::ServiceAccount;
use crate::error::{ConfigError, CredentialsError, FirestoreError, StoriesError};
use crate::firestore::{DEFAULT_DATABASE, EMULATOR_HOST_ENV, FirestoreClient};
use crate::story::{StoriesFile, check_path_segment};

/// Service-account key file read when no path is given.
pub const DEFAULT_CREDENTIALS_PATH: &str = "./firebase-credentials.json";

/// Stories file read when no path is given.
pub const DEFAULT_STORIES_PATH: &str = "./kuma_stories_complete.json";

/// Collection the stories are written to.
pub const DEFAULT_COLLECTION: &str = "stories";

/// Everything a run needs to know before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub credentials_path: PathBuf,
    pub stories_path: PathBuf,
    pub collection: String,
    pub database: String,
    /// `host:port` of a Firestore emulator, if one should be used.
    pub emulator_host: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
            stories_path: PathBuf::from(DEFAULT_STORIES_PATH),
            collection: DEFAULT_COLLECTION.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            emulator_host: None,
        }
    }
}

impl UploadConfig {
    /// Picks up `FIRESTORE_EMULATOR_HOST` if it is set.
    pub fn with_env(self) -> Self {
        let host = std::env::var(EMULATOR_HOST_ENV).ok();
        self.with_emulator_host(host)
    }

    /// Sets the emulator host; blank values are ignored.
    pub fn with_emulator_host(mut self, host: Option<String>) -> Self {
        if let Some(host) = host.map(|h| h.trim().to_string()).filter(|h| !h.is_empty()) {
            self.emulator_host = Some(host);
        }
        self
    }

    /// The two input files, credentials first.
    pub fn required_files(&self) -> [&Path; 2] {
        [self.credentials_path.as_path(), self.stories_path.as_path()]
    }

    /// Input files that do not exist on disk.
    pub fn missing_files(&self) -> Vec<&Path> {
        self.required_files()
            .into_iter()
            .filter(|path| !path.exists())
            .collect()
    }

    /// Checks that the collection and database names can address documents.
    ///
    /// ## Errors
    ///
    /// Returns a [`ConfigError`] for an empty name, a name containing `/`, or
    /// a reserved name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_path_segment(&self.collection).map_err(|reason| ConfigError::InvalidCollection {
            name: self.collection.clone(),
            reason,
        })?;
        check_path_segment(&self.database).map_err(|reason| ConfigError::InvalidDatabase {
            name: self.database.clone(),
            reason,
        })
    }

    /// Loads the service-account key.
    ///
    /// ## Errors
    ///
    /// See [`ServiceAccount::from_file`].
    pub fn load_credentials(&self) -> Result<ServiceAccount, CredentialsError> {
        ServiceAccount::from_file(&self.credentials_path)
    }

    /// Loads the stories file.
    ///
    /// ## Errors
    ///
    /// See [`StoriesFile::from_file`].
    pub fn load_stories(&self) -> Result<StoriesFile, StoriesError> {
        StoriesFile::from_file(&self.stories_path)
    }

    /// Builds a client for the account's project and authenticates it.
    ///
    /// ## Errors
    ///
    /// Returns an error if the client cannot be built or the first token
    /// exchange fails.
    pub async fn connect(&self, account: &ServiceAccount) -> Result<FirestoreClient, FirestoreError> {
        let client = FirestoreClient::builder(&account.project_id)
            .database(&self.database)
            .emulator_host(self.emulator_host.clone())
            .build(account)?;

        client.authenticate().await?;
        info!(
            project = client.project_id(),
            database = client.database(),
            emulator = client.is_emulator(),
            "connected to Firestore"
        );
        Ok(client)
    }
}

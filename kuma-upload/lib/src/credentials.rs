//! Service-account credential loading.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::CredentialsError;

/// Token endpoint used when the key file does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// A Google service-account key as downloaded from the Firebase console.
///
/// Only the fields needed to sign an OAuth assertion are kept; the rest of
/// the key file (`client_id`, `auth_uri`, ...) is ignored.
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    /// Usually `"service_account"`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccount {
    /// Reads and parses a service-account key file.
    ///
    /// ## Errors
    ///
    /// Returns an error if the file cannot be read, is not valid
    /// service-account JSON, or has an empty `project_id`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CredentialsError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CredentialsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let account: Self =
            serde_json::from_str(&contents).map_err(|source| CredentialsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if account.project_id.trim().is_empty() {
            return Err(CredentialsError::MissingProjectId);
        }

        Ok(account)
    }
}

// Keeps the key material out of logs.
impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("kind", &self.kind)
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<redacted>")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

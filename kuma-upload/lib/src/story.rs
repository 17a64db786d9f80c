//! Story records and the stories file.
//!
//! A stories file is a JSON object with a `stories` array. Entries are kept
//! as raw [`Value`]s until they are checked one at a time with
//! [`Story::from_value`], so a single malformed entry is rejected on its own
//! instead of failing the whole file.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{RecordError, StoriesError};

/// Longest document id the database accepts, in bytes.
const MAX_ID_BYTES: usize = 1500;

/// The parsed contents of a stories file.
#[derive(Debug, Clone, Deserialize)]
pub struct StoriesFile {
    pub stories: Vec<Value>,
}

impl StoriesFile {
    /// Reads and parses a stories file.
    ///
    /// ## Errors
    ///
    /// Returns an error if the file cannot be read, is not JSON, or has no
    /// top-level `stories` array. Individual entries are not validated here.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StoriesError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| StoriesError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| StoriesError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }
}

/// A validated story record.
///
/// `fields` holds the complete record, `id` and `title` included, and is
/// what gets written as the document body.
#[derive(Debug, Clone, PartialEq)]
pub struct Story {
    pub id: String,
    pub title: String,
    pub fields: Map<String, Value>,
}

impl Story {
    /// Validates a raw stories entry.
    ///
    /// ## Errors
    ///
    /// Returns a [`RecordError`] when the entry is not an object, has no
    /// usable `id`, or has no string `title`.
    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        let Value::Object(fields) = value else {
            return Err(RecordError::NotAnObject);
        };

        let id = match fields.get("id") {
            Some(Value::String(id)) => id.clone(),
            _ => return Err(RecordError::MissingId),
        };
        validate_document_id(&id)?;

        let title = match fields.get("title") {
            Some(Value::String(title)) => title.clone(),
            _ => return Err(RecordError::MissingTitle { id }),
        };

        Ok(Self { id, title, fields })
    }
}

/// Best-effort label for an entry that may not have validated, for log lines.
pub fn display_title(value: &Value) -> &str {
    value
        .get("title")
        .and_then(Value::as_str)
        .or_else(|| value.get("id").and_then(Value::as_str))
        .unwrap_or("<untitled>")
}

/// Checks the document id rules of the database.
fn validate_document_id(id: &str) -> Result<(), RecordError> {
    if id.trim().is_empty() {
        return Err(RecordError::EmptyId);
    }
    check_path_segment(id).map_err(|reason| RecordError::InvalidId {
        id: id.to_string(),
        reason,
    })
}

/// Rules shared by every name that becomes one segment of a document path:
/// collection ids, database ids and document ids.
pub(crate) fn check_path_segment(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("is empty");
    }
    if name.contains('/') {
        return Err("contains '/'");
    }
    if name == "." || name == ".." {
        return Err("'.' and '..' are reserved");
    }
    if name.len() >= 4 && name.starts_with("__") && name.ends_with("__") {
        return Err("names of the form __*__ are reserved");
    }
    if name.len() > MAX_ID_BYTES {
        return Err("longer than 1500 bytes");
    }
    Ok(())
}

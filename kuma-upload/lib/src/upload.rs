//! The sequential upload loop and its report.
//!
//! Each stories entry is validated, then written with one awaited call before
//! the next entry is looked at. A bad entry or a failed write is recorded and
//! the loop moves on; nothing in here aborts a run.

use std::fmt::Display;
use std::future::Future;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::RecordError;
use crate::story::{Story, display_title};

/// Destination for story documents.
///
/// [`FirestoreClient`](crate::FirestoreClient) is the production
/// implementation.
pub trait DocumentSink {
    type Error: Display;

    /// Creates or replaces the document `collection/id` with `fields`.
    fn write(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> impl Future<Output = Result<(), Self::Error>>;
}

/// What happened to one stories entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The document was written.
    Uploaded,
    /// The entry is valid and would be written (dry run).
    Valid,
    /// The entry failed validation and was skipped.
    Rejected(RecordError),
    /// The write was attempted and failed.
    Failed(String),
}

/// Per-entry result handed to the caller's observer.
#[derive(Debug, Clone)]
pub struct RecordResult {
    /// Position of the entry in the `stories` array.
    pub index: usize,
    /// Document id, when the entry had a valid one.
    pub id: Option<String>,
    pub title: String,
    pub outcome: RecordOutcome,
}

/// Success and error tallies for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Documents written, or entries that would be written in a dry run.
    pub succeeded: usize,
    /// Entries skipped because they failed validation.
    pub rejected: usize,
    /// Writes that returned an error.
    pub failed: usize,
}

impl UploadReport {
    /// Total error count (rejected plus failed).
    pub fn errors(&self) -> usize {
        self.rejected + self.failed
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.errors()
    }

    pub fn is_clean(&self) -> bool {
        self.errors() == 0
    }

    fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Uploaded | RecordOutcome::Valid => self.succeeded += 1,
            RecordOutcome::Rejected(_) => self.rejected += 1,
            RecordOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Writes every entry to `collection`, one at a time, in file order.
///
/// `on_record` is called once per entry after its outcome is known.
///
/// ## Examples
///
/// ```rust,no_run
/// use kuma_upload_lib::{FirestoreClient, ServiceAccount, StoriesFile, upload_stories};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let account = ServiceAccount::from_file("firebase-credentials.json")?;
/// let client = FirestoreClient::builder(&account.project_id).build(&account)?;
/// let stories = StoriesFile::from_file("kuma_stories_complete.json")?;
///
/// let report = upload_stories(&client, "stories", stories.stories, |result| {
///     println!("{}: {:?}", result.title, result.outcome);
/// })
/// .await;
/// println!("{} written, {} errors", report.succeeded, report.errors());
/// # Ok(())
/// # }
/// ```
pub async fn upload_stories<S, F>(
    sink: &S,
    collection: &str,
    stories: Vec<Value>,
    mut on_record: F,
) -> UploadReport
where
    S: DocumentSink,
    F: FnMut(&RecordResult),
{
    let mut report = UploadReport::default();

    for (index, entry) in stories.into_iter().enumerate() {
        let (raw_id, title) = labels(&entry);
        let result = match Story::from_value(entry) {
            Err(error) => {
                warn!(index, %error, "rejecting story record");
                RecordResult {
                    index,
                    id: raw_id,
                    title,
                    outcome: RecordOutcome::Rejected(error),
                }
            }
            Ok(story) => {
                let outcome = match sink.write(collection, &story.id, &story.fields).await {
                    Ok(()) => {
                        info!(id = %story.id, collection, "uploaded story");
                        RecordOutcome::Uploaded
                    }
                    Err(error) => {
                        warn!(id = %story.id, collection, %error, "failed to upload story");
                        RecordOutcome::Failed(error.to_string())
                    }
                };
                RecordResult {
                    index,
                    id: Some(story.id),
                    title: story.title,
                    outcome,
                }
            }
        };

        report.record(&result.outcome);
        on_record(&result);
    }

    report
}

/// Validates every entry without writing anything.
///
/// Valid entries are reported as [`RecordOutcome::Valid`] and counted as
/// successes.
pub fn validate_stories<F>(stories: Vec<Value>, mut on_record: F) -> UploadReport
where
    F: FnMut(&RecordResult),
{
    let mut report = UploadReport::default();

    for (index, entry) in stories.into_iter().enumerate() {
        let (raw_id, title) = labels(&entry);
        let result = match Story::from_value(entry) {
            Ok(story) => RecordResult {
                index,
                id: Some(story.id),
                title: story.title,
                outcome: RecordOutcome::Valid,
            },
            Err(error) => RecordResult {
                index,
                id: raw_id,
                title,
                outcome: RecordOutcome::Rejected(error),
            },
        };

        report.record(&result.outcome);
        on_record(&result);
    }

    report
}

/// The id and title used to label an entry that may fail validation.
fn labels(entry: &Value) -> (Option<String>, String) {
    let id = entry.get("id").and_then(Value::as_str).map(str::to_string);
    (id, display_title(entry).to_string())
}

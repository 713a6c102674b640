use crate::journal::{JournalError, SubmissionJournal};
use crate::{ItemStatus, ReviewTally, StatusEntry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP error, status: {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no submission destination: resume token is not a URL and no submit URL is configured")]
    NoDestination,
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),
    #[error("journal lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, SinkError>;

/// Which items are sent when results are submitted.
///
/// The default sends rejected items only, matching what downstream
/// workflows act on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionFilter {
    #[default]
    Rejected,
    Approved,
    /// Approved and rejected, skipping anything undecided.
    Decided,
    All,
}

impl SubmissionFilter {
    pub fn matches(self, status: ItemStatus) -> bool {
        match self {
            SubmissionFilter::Rejected => status == ItemStatus::Rejected,
            SubmissionFilter::Approved => status == ItemStatus::Approved,
            SubmissionFilter::Decided => status != ItemStatus::Undecided,
            SubmissionFilter::All => true,
        }
    }
}

/// Payload handed to a sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub resume_token: Option<String>,
    pub items: Vec<StatusEntry>,
    pub summary: ReviewTally,
}

/// Where a submission ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub destination: String,
    pub delivered: usize,
}

/// Accepts finished review results.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    async fn submit(&self, submission: &Submission) -> Result<SubmissionReceipt>;
}

/// POSTs results as JSON to the resume URL handed out by the fetch step.
pub struct WebhookSink {
    http: reqwest::Client,
    fallback_url: Option<String>,
}

impl WebhookSink {
    pub fn new(fallback_url: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(SUBMIT_TIMEOUT).build()?;
        Ok(Self { http, fallback_url })
    }

    /// The resume token when it is an http(s) URL, else the fallback.
    pub fn destination<'a>(&'a self, resume_token: Option<&'a str>) -> Option<&'a str> {
        resume_token
            .filter(|token| token.starts_with("http://") || token.starts_with("https://"))
            .or(self.fallback_url.as_deref())
    }
}

#[async_trait]
impl SubmissionSink for WebhookSink {
    async fn submit(&self, submission: &Submission) -> Result<SubmissionReceipt> {
        let url = self
            .destination(submission.resume_token.as_deref())
            .ok_or(SinkError::NoDestination)?
            .to_string();

        info!(url = %url, items = submission.items.len(), "posting review results");
        let response = self.http.post(&url).json(submission).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status.as_u16()));
        }

        Ok(SubmissionReceipt {
            destination: url,
            delivered: submission.items.len(),
        })
    }
}

/// Records results in the local SQLite journal.
pub struct JournalSink {
    journal: Mutex<SubmissionJournal>,
    label: String,
}

impl JournalSink {
    pub fn open(path: &Path) -> Result<Self> {
        let journal = SubmissionJournal::open(path)?;
        Ok(Self {
            journal: Mutex::new(journal),
            label: path.display().to_string(),
        })
    }
}

#[async_trait]
impl SubmissionSink for JournalSink {
    async fn submit(&self, submission: &Submission) -> Result<SubmissionReceipt> {
        let id = {
            let mut journal = self.journal.lock().map_err(|_| SinkError::Poisoned)?;
            journal.record(submission)?
        };

        info!(journal = %self.label, id, items = submission.items.len(), "journaled review results");
        Ok(SubmissionReceipt {
            destination: format!("{}#{}", self.label, id),
            delivered: submission.items.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_statuses() {
        assert!(SubmissionFilter::Rejected.matches(ItemStatus::Rejected));
        assert!(!SubmissionFilter::Rejected.matches(ItemStatus::Approved));
        assert!(!SubmissionFilter::Rejected.matches(ItemStatus::Undecided));
        assert!(SubmissionFilter::Decided.matches(ItemStatus::Approved));
        assert!(!SubmissionFilter::Decided.matches(ItemStatus::Undecided));
        assert!(SubmissionFilter::All.matches(ItemStatus::Undecided));
    }

    #[test]
    fn webhook_prefers_url_token() {
        let sink = WebhookSink::new(Some("https://fallback/submit".to_string())).unwrap();
        assert_eq!(
            sink.destination(Some("https://hooks/resume/1")),
            Some("https://hooks/resume/1")
        );
        assert_eq!(
            sink.destination(Some("opaque-token")),
            Some("https://fallback/submit")
        );
        assert_eq!(sink.destination(None), Some("https://fallback/submit"));

        let bare = WebhookSink::new(None).unwrap();
        assert_eq!(bare.destination(Some("opaque")), None);
    }

    #[test]
    fn payload_uses_camel_case_and_wire_statuses() {
        let submission = Submission {
            resume_token: Some("tok".to_string()),
            items: vec![StatusEntry {
                file_id: "f1".to_string(),
                status: ItemStatus::Rejected,
            }],
            summary: ReviewTally {
                approved: 0,
                rejected: 1,
                total: 1,
            },
        };
        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(json["resumeToken"], "tok");
        assert_eq!(json["items"][0]["fileId"], "f1");
        assert_eq!(json["items"][0]["status"], "not approved");
        assert_eq!(json["summary"]["rejected"], 1);
    }

    #[tokio::test]
    async fn journal_sink_records_submission() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        let sink = JournalSink::open(&path).unwrap();

        let receipt = sink
            .submit(&Submission {
                resume_token: None,
                items: vec![],
                summary: ReviewTally::default(),
            })
            .await
            .unwrap();
        assert_eq!(receipt.delivered, 0);
        assert!(receipt.destination.ends_with("#1"));

        let journal = SubmissionJournal::open(&path).unwrap();
        assert_eq!(journal.list_submissions().unwrap().len(), 1);
    }
}

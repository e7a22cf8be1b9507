//! Print Job Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::label::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Retry budget given to a job unless configured otherwise
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Print job status
///
/// `pending → dispatching → {completed | failed}`, and `failed → pending`
/// through an explicit retry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Dispatching,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Dispatching => "dispatching",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Completed jobs never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendered, sink-ready printer document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Full ZPL program, including the render timestamp
    pub content: String,
    /// Hex SHA-256 over the content with the timestamp left out
    pub content_hash: String,
    pub rendered_at: DateTime<Utc>,
}

impl Document {
    pub fn as_bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }
}

/// Print job entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJob {
    pub job_id: Uuid,
    /// The one label record this job prints, fixed for the job's lifetime
    pub label_ref: Uuid,
    pub status: JobStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Generated once; retries resend the same bytes
    pub document: Document,
    pub error_reason: Option<String>,
    pub submitted_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Time of the most recent `pending → dispatching` transition
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl PrintJob {
    pub fn new(
        label_ref: Uuid,
        document: Document,
        max_retries: u32,
        submitted_by: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            label_ref,
            status: JobStatus::Pending,
            retry_count: 0,
            max_retries,
            document,
            error_reason: None,
            submitted_by,
            created_at: now,
            updated_at: now,
            dispatched_at: None,
        }
    }

    pub fn retries_left(&self) -> u32 {
        self.max_retries.saturating_sub(self.retry_count)
    }
}

/// Caller-facing view of a job (document body omitted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub label_ref: Uuid,
    pub status: JobStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub retries_left: u32,
    pub error_reason: Option<String>,
    pub content_hash: String,
    pub rendered_at: DateTime<Utc>,
    pub submitted_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl From<&PrintJob> for JobSnapshot {
    fn from(job: &PrintJob) -> Self {
        Self {
            job_id: job.job_id,
            label_ref: job.label_ref,
            status: job.status,
            retry_count: job.retry_count,
            max_retries: job.max_retries,
            retries_left: job.retries_left(),
            error_reason: job.error_reason.clone(),
            content_hash: job.document.content_hash.clone(),
            rendered_at: job.document.rendered_at,
            submitted_by: job.submitted_by,
            created_at: job.created_at,
            updated_at: job.updated_at,
            dispatched_at: job.dispatched_at,
        }
    }
}

fn default_limit() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Print job listing filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub label_ref: Option<Uuid>,
    pub submitted_by: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            status: None,
            label_ref: None,
            submitted_by: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl JobFilter {
    pub fn matches(&self, job: &PrintJob) -> bool {
        self.status.is_none_or(|s| s == job.status)
            && self.label_ref.is_none_or(|l| l == job.label_ref)
            && self.submitted_by.is_none_or(|u| u == job.submitted_by)
    }

    pub fn page_size(&self) -> usize {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }
}

/// How a failed delivery is attributed to the jobs of one dispatch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureAttribution {
    /// The run shares one outcome: any delivery error fails every job in it
    #[default]
    Batch,
    /// Each document is delivered and reconciled on its own
    PerDocument,
}

impl std::str::FromStr for FailureAttribution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "batch" => Ok(Self::Batch),
            "per_document" | "per-document" | "document" => Ok(Self::PerDocument),
            other => Err(format!("unknown failure attribution: {other}")),
        }
    }
}

/// A job that ended a dispatch run in `failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDelivery {
    pub job_id: Uuid,
    pub reason: String,
}

/// Outcome of one dispatch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub mode: FailureAttribution,
    /// Jobs this run claimed and sent (or tried to)
    pub attempted: usize,
    pub completed: Vec<Uuid>,
    pub failed: Vec<FailedDelivery>,
    /// Requested jobs that were not `pending` (claimed elsewhere, finished, ...)
    pub skipped: Vec<Uuid>,
}

impl DispatchReport {
    pub fn empty(mode: FailureAttribution) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> Document {
        Document {
            content: "^XA^XZ".into(),
            content_hash: "abc".into(),
            rendered_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_job_starts_pending() {
        let job = PrintJob::new(Uuid::new_v4(), document(), DEFAULT_MAX_RETRIES, Uuid::new_v4(), Utc::now());
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 0);
        assert_eq!(job.retries_left(), 3);
        assert!(job.error_reason.is_none());
    }

    #[test]
    fn test_snapshot_omits_document_body() {
        let job = PrintJob::new(Uuid::new_v4(), document(), 2, Uuid::new_v4(), Utc::now());
        let snapshot = JobSnapshot::from(&job);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("^XA"));
        assert!(json.contains("\"content_hash\":\"abc\""));
        assert!(json.contains("\"status\":\"pending\""));
        assert_eq!(snapshot.retries_left, 2);
    }

    #[test]
    fn test_only_completed_is_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(!JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Dispatching.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }

    #[test]
    fn test_failure_attribution_parse() {
        assert_eq!("batch".parse::<FailureAttribution>(), Ok(FailureAttribution::Batch));
        assert_eq!("PER_DOCUMENT".parse::<FailureAttribution>(), Ok(FailureAttribution::PerDocument));
        assert!("sometimes".parse::<FailureAttribution>().is_err());
        assert_eq!(
            serde_json::to_string(&FailureAttribution::PerDocument).unwrap(),
            "\"per_document\""
        );
    }

    #[test]
    fn test_job_filter() {
        let job = PrintJob::new(Uuid::new_v4(), document(), 3, Uuid::new_v4(), Utc::now());
        assert!(JobFilter::default().matches(&job));
        let other_label = JobFilter {
            label_ref: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(!other_label.matches(&job));
        let pending = JobFilter {
            status: Some(JobStatus::Pending),
            ..Default::default()
        };
        assert!(pending.matches(&job));
    }
}

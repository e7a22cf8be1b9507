//! Print job ledger
//!
//! Owns the job state machine:
//!
//! ```text
//! pending ──claim──▶ dispatching ──ok──▶ completed
//!    ▲                    │
//!    └──── retry ◀── failed ◀──error──┘
//! ```
//!
//! Every transition is one store transaction that also reconciles the
//! linked label's status, so a job and its label never disagree.

use super::storage::{JobUpdate, LabelStore, StorageError};
use chrono::{DateTime, Utc};
use shared::models::{Document, JobStatus, LabelStatus, PrintJob};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Print job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Print job {job_id} cannot move from {from} to {to}")]
    IllegalTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Print job {job_id} has used all {max_retries} retries")]
    RetryExhausted { job_id: Uuid, max_retries: u32 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Outcome of a claim attempt
#[derive(Debug, Clone)]
pub enum Claim {
    /// This caller moved the job to `dispatching` and owns its delivery
    Acquired(PrintJob),
    /// Already `dispatching` under another claim; nothing changed
    Held(PrintJob),
}

enum Step {
    Apply(Option<LabelStatus>),
    Keep,
}

#[derive(Clone)]
pub struct PrintJobLedger {
    store: Arc<dyn LabelStore>,
    max_retries: u32,
}

impl PrintJobLedger {
    pub fn new(store: Arc<dyn LabelStore>, max_retries: u32) -> Self {
        Self { store, max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Create a `pending` job for a stored label
    pub fn create(&self, label_ref: Uuid, document: Document, submitted_by: Uuid) -> LedgerResult<PrintJob> {
        let job = PrintJob::new(label_ref, document, self.max_retries, submitted_by, Utc::now());
        self.store.insert_job(&job)?;
        tracing::debug!(job_id = %job.job_id, label_id = %label_ref, "Print job created");
        Ok(job)
    }

    pub fn get(&self, job_id: Uuid) -> LedgerResult<PrintJob> {
        self.store.get_job(job_id)?.ok_or(LedgerError::JobNotFound(job_id))
    }

    /// `pending → dispatching`
    pub fn claim(&self, job_id: Uuid) -> LedgerResult<Claim> {
        let (job, committed) = self.transition(job_id, |job, now| match job.status {
            JobStatus::Pending => {
                job.status = JobStatus::Dispatching;
                job.dispatched_at = Some(now);
                Ok(Step::Apply(None))
            }
            JobStatus::Dispatching => Ok(Step::Keep),
            from => Err(illegal(job.job_id, from, JobStatus::Dispatching)),
        })?;
        Ok(if committed {
            Claim::Acquired(job)
        } else {
            Claim::Held(job)
        })
    }

    /// `dispatching → completed`; the label becomes `printed`
    pub fn mark_completed(&self, job_id: Uuid) -> LedgerResult<PrintJob> {
        let (job, _) = self.transition(job_id, |job, _| match job.status {
            JobStatus::Dispatching => {
                job.status = JobStatus::Completed;
                job.error_reason = None;
                Ok(Step::Apply(Some(LabelStatus::Printed)))
            }
            from => Err(illegal(job.job_id, from, JobStatus::Completed)),
        })?;
        tracing::info!(job_id = %job_id, "Print job completed");
        Ok(job)
    }

    /// `dispatching → failed`; the label becomes `failed`
    pub fn mark_failed(&self, job_id: Uuid, reason: &str) -> LedgerResult<PrintJob> {
        let (job, _) = self.transition(job_id, |job, _| match job.status {
            JobStatus::Dispatching => {
                job.status = JobStatus::Failed;
                job.error_reason = Some(reason.to_string());
                Ok(Step::Apply(Some(LabelStatus::Failed)))
            }
            from => Err(illegal(job.job_id, from, JobStatus::Failed)),
        })?;
        tracing::warn!(job_id = %job_id, reason, "Print job failed");
        Ok(job)
    }

    /// `failed → pending`, consuming one retry; the label returns to `pending`
    ///
    /// The job keeps its original document, so the resend is byte-identical.
    pub fn retry(&self, job_id: Uuid) -> LedgerResult<PrintJob> {
        let (job, _) = self.transition(job_id, |job, _| match job.status {
            JobStatus::Failed if job.retry_count >= job.max_retries => Err(LedgerError::RetryExhausted {
                job_id: job.job_id,
                max_retries: job.max_retries,
            }),
            JobStatus::Failed => {
                job.status = JobStatus::Pending;
                job.retry_count += 1;
                job.error_reason = None;
                job.dispatched_at = None;
                Ok(Step::Apply(Some(LabelStatus::Pending)))
            }
            from => Err(illegal(job.job_id, from, JobStatus::Pending)),
        })?;
        tracing::info!(
            job_id = %job_id,
            retry_count = job.retry_count,
            max_retries = job.max_retries,
            "Print job queued for retry"
        );
        Ok(job)
    }

    /// Fail every job that has been `dispatching` for longer than `older_than`
    ///
    /// A dispatcher that died mid-run leaves its claims behind; this returns
    /// them to a state from which they can be retried.
    pub fn reconcile_stale(&self, older_than: Duration) -> LedgerResult<Vec<PrintJob>> {
        let age = chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now().checked_sub_signed(age).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let reason = format!("dispatch interrupted: no outcome after {}s", older_than.as_secs());

        let mut reconciled = Vec::new();
        for stale in self.store.jobs_in_status(JobStatus::Dispatching)? {
            if stale.dispatched_at.is_some_and(|at| at > cutoff) {
                continue;
            }
            let claimed_at = stale.dispatched_at;
            let (job, committed) = self.transition(stale.job_id, |job, _| {
                // Re-checked inside the transaction; a fresh claim is left alone
                if job.status != JobStatus::Dispatching || job.dispatched_at != claimed_at {
                    return Ok(Step::Keep);
                }
                job.status = JobStatus::Failed;
                job.error_reason = Some(reason.clone());
                Ok(Step::Apply(Some(LabelStatus::Failed)))
            })?;
            if committed {
                tracing::warn!(job_id = %job.job_id, "Stale dispatch reconciled to failed");
                reconciled.push(job);
            }
        }
        Ok(reconciled)
    }

    fn transition<F>(&self, job_id: Uuid, mut check: F) -> LedgerResult<(PrintJob, bool)>
    where
        F: FnMut(&mut PrintJob, DateTime<Utc>) -> LedgerResult<Step>,
    {
        let now = Utc::now();
        let mut rejected = None;
        let outcome = self
            .store
            .update_job(job_id, &mut |job| match check(job, now) {
                Ok(Step::Apply(label_status)) => {
                    job.updated_at = now;
                    JobUpdate::Commit { label_status }
                }
                Ok(Step::Keep) => JobUpdate::Abort,
                Err(e) => {
                    rejected = Some(e);
                    JobUpdate::Abort
                }
            })?
            .ok_or(LedgerError::JobNotFound(job_id))?;

        if let Some(e) = rejected {
            return Err(e);
        }
        Ok((outcome.job, outcome.committed))
    }
}

fn illegal(job_id: Uuid, from: JobStatus, to: JobStatus) -> LedgerError {
    LedgerError::IllegalTransition { job_id, from, to }
}

//! Label pipeline service
//!
//! Composes intake, rendering, the job ledger and the dispatcher. The API
//! handlers and the background worker only ever talk to [`LabelPipeline`].

use super::dispatcher::{BatchDispatcher, DEFAULT_RUN_SIZE};
use super::intake::{DedupIntake, IntakeError};
use super::ledger::{LedgerError, PrintJobLedger};
use super::renderer::{LabelRenderer, RenderConfig, RenderError};
use super::storage::{LabelStore, StorageError, StorageStats};
use super::types::PipelineEvent;
use label_printer::PrintSink;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    BatchSubmission, DEFAULT_MAX_RETRIES, DispatchReport, FailureAttribution, JobFilter, JobSnapshot,
    JobStatus, LabelFilter, LabelPayload, LabelRecord, PrintJob, RenderFailure,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Label not found: {0}")]
    LabelNotFound(Uuid),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Intake(IntakeError::EmptyBatch) => {
                AppError::with_message(ErrorCode::LabelBatchEmpty, "Batch contains no labels")
            }
            PipelineError::Intake(IntakeError::Storage(e))
            | PipelineError::Ledger(LedgerError::Storage(e))
            | PipelineError::Storage(e) => AppError::database(e.to_string()),
            PipelineError::Ledger(LedgerError::JobNotFound(id)) => AppError::job_not_found(id),
            PipelineError::Ledger(LedgerError::IllegalTransition { job_id, from, to }) => {
                AppError::with_message(
                    ErrorCode::PrintJobInvalidTransition,
                    format!("Print job cannot move from {from} to {to}"),
                )
                .with_detail("job_id", job_id.to_string())
                .with_detail("status", from.as_str())
            }
            PipelineError::Ledger(LedgerError::RetryExhausted { job_id, max_retries }) => {
                AppError::retry_exhausted(job_id, max_retries)
            }
            PipelineError::Render(e) => {
                let RenderError::MissingField { label_id, field } = &e;
                AppError::with_message(ErrorCode::LabelRenderFailed, e.to_string())
                    .with_detail("label_id", label_id.to_string())
                    .with_detail("field", *field)
            }
            PipelineError::LabelNotFound(id) => AppError::label_not_found(id),
        }
    }
}

/// Pipeline tuning, usually built from [`crate::core::Config`]
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub max_retries: u32,
    pub failure_attribution: FailureAttribution,
    pub dispatch_timeout: Duration,
    /// Most jobs one dispatch run claims at a time
    pub dispatch_run_size: usize,
    /// Dispatch the jobs of a batch right after intake
    pub auto_dispatch: bool,
    pub render: RenderConfig,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            failure_attribution: FailureAttribution::Batch,
            dispatch_timeout: Duration::from_secs(30),
            dispatch_run_size: DEFAULT_RUN_SIZE,
            auto_dispatch: true,
            render: RenderConfig::default(),
        }
    }
}

pub struct LabelPipeline<K> {
    store: Arc<dyn LabelStore>,
    intake: DedupIntake,
    renderer: LabelRenderer,
    ledger: PrintJobLedger,
    dispatcher: BatchDispatcher<K>,
    events: broadcast::Sender<PipelineEvent>,
    auto_dispatch: bool,
}

impl<K: PrintSink> LabelPipeline<K> {
    pub fn new(store: Arc<dyn LabelStore>, sink: Arc<K>, options: PipelineOptions) -> Self {
        let ledger = PrintJobLedger::new(store.clone(), options.max_retries);
        let dispatcher = BatchDispatcher::new(
            ledger.clone(),
            sink,
            options.failure_attribution,
            options.dispatch_timeout,
        )
        .with_run_size(options.dispatch_run_size);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            intake: DedupIntake::new(store.clone()),
            renderer: LabelRenderer::new(options.render),
            store,
            ledger,
            dispatcher,
            events,
            auto_dispatch: options.auto_dispatch,
        }
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn failure_attribution(&self) -> FailureAttribution {
        self.dispatcher.mode()
    }

    /// Classify a batch, create one job per new record, and dispatch them
    /// when auto-dispatch is on
    ///
    /// A record that cannot be rendered stays stored and `pending` without a
    /// job, and is listed in `render_failures`.
    pub async fn submit_batch(
        &self,
        submitted_by: Uuid,
        payloads: &[LabelPayload],
    ) -> PipelineResult<BatchSubmission> {
        let result = self.intake.process(submitted_by, payloads)?;
        self.emit(PipelineEvent::BatchProcessed {
            submitted_by,
            total: result.total_processed,
            new_count: result.new_count,
            duplicate_count: result.duplicate_count,
            error_count: result.error_count,
        });
        crate::audit_log!(
            submitted_by.to_string(),
            "submit_batch",
            "labels",
            format!(
                "total={} new={} duplicates={} errors={}",
                result.total_processed, result.new_count, result.duplicate_count, result.error_count
            )
        );

        let mut jobs = Vec::with_capacity(result.new.len());
        let mut render_failures = Vec::new();
        for record in &result.new {
            match self.renderer.render(record) {
                Ok(document) => {
                    let job = self.ledger.create(record.internal_id, document, submitted_by)?;
                    self.emit(PipelineEvent::JobCreated {
                        job_id: job.job_id,
                        label_id: record.internal_id,
                    });
                    jobs.push(job);
                }
                Err(e) => {
                    tracing::warn!(business_id = %record.business_id, error = %e, "Label render failed");
                    render_failures.push(RenderFailure {
                        label_id: record.internal_id,
                        business_id: record.business_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let dispatch = if self.auto_dispatch && !jobs.is_empty() {
            let ids: Vec<Uuid> = jobs.iter().map(|j| j.job_id).collect();
            let report = self.dispatch_jobs(&ids).await?;
            jobs = ids
                .into_iter()
                .map(|id| self.ledger.get(id))
                .collect::<Result<_, _>>()?;
            Some(report)
        } else {
            None
        };

        Ok(BatchSubmission {
            result,
            jobs: jobs.iter().map(JobSnapshot::from).collect(),
            render_failures,
            dispatch,
        })
    }

    /// Dispatch specific jobs; anything not `pending` is skipped
    pub async fn dispatch_jobs(&self, job_ids: &[Uuid]) -> PipelineResult<DispatchReport> {
        let report = self.dispatcher.dispatch(job_ids).await?;
        for job_id in &report.completed {
            self.emit(PipelineEvent::JobCompleted { job_id: *job_id });
        }
        for failed in &report.failed {
            self.emit(PipelineEvent::JobFailed {
                job_id: failed.job_id,
                reason: failed.reason.clone(),
            });
        }
        Ok(report)
    }

    /// Dispatch pending jobs, oldest first
    pub async fn dispatch_pending(&self, limit: Option<usize>) -> PipelineResult<DispatchReport> {
        let ids: Vec<Uuid> = self
            .store
            .jobs_in_status(JobStatus::Pending)?
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|j| j.job_id)
            .collect();
        if ids.is_empty() {
            return Ok(DispatchReport::empty(self.dispatcher.mode()));
        }
        self.dispatch_jobs(&ids).await
    }

    /// Move a failed job back to `pending`, within its retry budget
    ///
    /// The job is not sent here; the next dispatch pass picks it up.
    pub fn retry_job(&self, retried_by: Uuid, job_id: Uuid) -> PipelineResult<PrintJob> {
        let job = match self.ledger.retry(job_id) {
            Ok(job) => job,
            Err(LedgerError::RetryExhausted { job_id, max_retries }) => {
                self.emit(PipelineEvent::RetryExhausted { job_id, max_retries });
                return Err(LedgerError::RetryExhausted { job_id, max_retries }.into());
            }
            Err(e) => return Err(e.into()),
        };

        self.emit(PipelineEvent::JobRetried {
            job_id,
            retry_count: job.retry_count,
            retried_by,
        });
        crate::audit_log!(
            retried_by.to_string(),
            "retry_print_job",
            job_id.to_string(),
            format!("retry {}/{}", job.retry_count, job.max_retries)
        );
        Ok(job)
    }

    /// Render a stored label again and queue a new `pending` job for it
    ///
    /// Works for any stored label, including one whose first render failed
    /// or that never got a job.
    pub fn print_label(&self, requested_by: Uuid, label_id: Uuid) -> PipelineResult<PrintJob> {
        let label = self.get_label(label_id)?;
        let document = self.renderer.render(&label)?;
        let job = self.ledger.create(label.internal_id, document, requested_by)?;

        self.emit(PipelineEvent::JobCreated {
            job_id: job.job_id,
            label_id,
        });
        crate::audit_log!(
            requested_by.to_string(),
            "print_label",
            label_id.to_string(),
            format!("job={} business_id={}", job.job_id, label.business_id)
        );
        Ok(job)
    }

    pub fn get_job(&self, job_id: Uuid) -> PipelineResult<PrintJob> {
        Ok(self.ledger.get(job_id)?)
    }

    pub fn list_jobs(&self, filter: &JobFilter) -> PipelineResult<Vec<PrintJob>> {
        Ok(self.store.list_jobs(filter)?)
    }

    pub fn get_label(&self, label_id: Uuid) -> PipelineResult<LabelRecord> {
        self.store
            .get_label(label_id)?
            .ok_or(PipelineError::LabelNotFound(label_id))
    }

    pub fn list_labels(&self, filter: &LabelFilter) -> PipelineResult<Vec<LabelRecord>> {
        Ok(self.store.list_labels(filter)?)
    }

    /// Fail jobs stuck in `dispatching` for longer than `older_than`
    ///
    /// The threshold never drops below the dispatcher's stale floor, so a
    /// run that is still delivering keeps its claims.
    pub fn reconcile_stale_dispatches(&self, older_than: Duration) -> PipelineResult<usize> {
        let threshold = older_than.max(self.dispatcher.stale_floor());
        let reconciled = self.ledger.reconcile_stale(threshold)?;
        for job in &reconciled {
            self.emit(PipelineEvent::JobReconciled {
                job_id: job.job_id,
                reason: job.error_reason.clone().unwrap_or_default(),
            });
        }
        Ok(reconciled.len())
    }

    pub fn storage_stats(&self) -> PipelineResult<StorageStats> {
        Ok(self.store.stats()?)
    }

    pub async fn sink_online(&self) -> bool {
        self.dispatcher.sink().is_online().await
    }

    pub fn sink(&self) -> &K {
        self.dispatcher.sink()
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

//! Batch dispatcher
//!
//! Claims pending jobs, hands their documents to the sink and records the
//! outcome of every claimed job. Only jobs whose `pending → dispatching`
//! transition this run performed are delivered, so overlapping runs never
//! send the same job twice.
//!
//! Large requests are split into runs of at most `run_size` jobs. A run
//! claims its jobs right before delivering them, so no job stays
//! `dispatching` for longer than [`BatchDispatcher::run_budget`].

use super::ledger::{Claim, LedgerError, LedgerResult, PrintJobLedger};
use label_printer::{DeliveryError, DeliveryResult, PrintSink};
use shared::models::{DispatchReport, FailedDelivery, FailureAttribution, PrintJob};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

/// Reason recorded on claims abandoned by a dropped dispatch run
pub const CANCELLED_REASON: &str = "dispatch cancelled";

/// Jobs claimed and delivered together in one run
pub const DEFAULT_RUN_SIZE: usize = 8;

pub struct BatchDispatcher<K> {
    ledger: PrintJobLedger,
    sink: Arc<K>,
    mode: FailureAttribution,
    timeout: Duration,
    run_size: usize,
}

impl<K: PrintSink> BatchDispatcher<K> {
    /// `timeout` bounds one document delivery
    pub fn new(ledger: PrintJobLedger, sink: Arc<K>, mode: FailureAttribution, timeout: Duration) -> Self {
        Self {
            ledger,
            sink,
            mode,
            timeout,
            run_size: DEFAULT_RUN_SIZE,
        }
    }

    pub fn with_run_size(mut self, run_size: usize) -> Self {
        self.run_size = run_size.max(1);
        self
    }

    pub fn mode(&self) -> FailureAttribution {
        self.mode
    }

    /// Longest a single run may keep its claims before every outcome is in
    pub fn run_budget(&self) -> Duration {
        self.timeout
            .saturating_mul(u32::try_from(self.run_size).unwrap_or(u32::MAX))
    }

    /// Shortest age at which a `dispatching` job can no longer belong to a
    /// live run
    pub fn stale_floor(&self) -> Duration {
        self.run_budget().saturating_add(self.timeout)
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Deliver the given jobs and reconcile each claimed one
    ///
    /// With [`FailureAttribution::Batch`] the run shares one outcome: if any
    /// document fails, every claimed job is failed with that reason. With
    /// [`FailureAttribution::PerDocument`] each job gets its own outcome.
    #[instrument(skip_all, fields(requested = job_ids.len(), mode = ?self.mode))]
    pub async fn dispatch(&self, job_ids: &[Uuid]) -> LedgerResult<DispatchReport> {
        let mut report = DispatchReport::empty(self.mode);
        for run in job_ids.chunks(self.run_size) {
            self.dispatch_run(run, &mut report).await?;
        }

        tracing::info!(
            attempted = report.attempted,
            completed = report.completed.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "Dispatch run finished"
        );
        Ok(report)
    }

    async fn dispatch_run(&self, job_ids: &[Uuid], report: &mut DispatchReport) -> LedgerResult<()> {
        let mut claims = ClaimGuard::new(self.ledger.clone());
        let mut jobs: Vec<PrintJob> = Vec::new();

        for &job_id in job_ids {
            match self.ledger.claim(job_id) {
                Ok(Claim::Acquired(job)) => {
                    claims.hold(job.job_id);
                    jobs.push(job);
                }
                Ok(Claim::Held(_)) => {
                    tracing::debug!(job_id = %job_id, "Job already claimed by another run");
                    report.skipped.push(job_id);
                }
                Err(e @ (LedgerError::JobNotFound(_) | LedgerError::IllegalTransition { .. })) => {
                    tracing::debug!(job_id = %job_id, error = %e, "Job not dispatchable");
                    report.skipped.push(job_id);
                }
                Err(e) => return Err(e),
            }
        }

        report.attempted += jobs.len();
        if jobs.is_empty() {
            return Ok(());
        }

        match self.mode {
            FailureAttribution::Batch => {
                let documents: Vec<&[u8]> = jobs.iter().map(|j| j.document.as_bytes()).collect();
                let budget = self.timeout.saturating_mul(u32::try_from(documents.len()).unwrap_or(u32::MAX));
                let outcome = self
                    .bounded(budget, self.sink.deliver_batch(&documents))
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string());
                for job in &jobs {
                    self.settle(&mut claims, report, job.job_id, outcome.clone());
                }
            }
            FailureAttribution::PerDocument => {
                for job in &jobs {
                    let outcome = self
                        .bounded(self.timeout, self.sink.deliver(job.document.as_bytes()))
                        .await
                        .map_err(|e| e.to_string());
                    self.settle(&mut claims, report, job.job_id, outcome);
                }
            }
        }
        Ok(())
    }

    async fn bounded<T>(
        &self,
        budget: Duration,
        delivery: impl Future<Output = DeliveryResult<T>>,
    ) -> DeliveryResult<T> {
        match tokio::time::timeout(budget, delivery).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(format!(
                "no outcome within {}ms",
                budget.as_millis()
            ))),
        }
    }

    fn settle(
        &self,
        claims: &mut ClaimGuard,
        report: &mut DispatchReport,
        job_id: Uuid,
        outcome: Result<(), String>,
    ) {
        claims.release(job_id);
        let recorded = match &outcome {
            Ok(()) => self.ledger.mark_completed(job_id),
            Err(reason) => self.ledger.mark_failed(job_id, reason),
        };
        match (recorded, outcome) {
            (Ok(_), Ok(())) => report.completed.push(job_id),
            (Ok(_), Err(reason)) => report.failed.push(FailedDelivery { job_id, reason }),
            (Err(e), _) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to record delivery outcome");
                report.failed.push(FailedDelivery {
                    job_id,
                    reason: format!("outcome not recorded: {e}"),
                });
            }
        }
    }
}

/// Fails claims that were never settled when the dispatch run is dropped
struct ClaimGuard {
    ledger: PrintJobLedger,
    held: Vec<Uuid>,
}

impl ClaimGuard {
    fn new(ledger: PrintJobLedger) -> Self {
        Self {
            ledger,
            held: Vec::new(),
        }
    }

    fn hold(&mut self, job_id: Uuid) {
        self.held.push(job_id);
    }

    fn release(&mut self, job_id: Uuid) {
        self.held.retain(|held| *held != job_id);
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        for job_id in self.held.drain(..) {
            tracing::warn!(job_id = %job_id, "Releasing unsettled claim");
            if let Err(e) = self.ledger.mark_failed(job_id, CANCELLED_REASON) {
                tracing::error!(job_id = %job_id, error = %e, "Failed to release claim");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printing::storage::{LabelStore, PrintStorage};
    use crate::printing::test_support::MockSink;
    use chrono::Utc;
    use shared::models::{Document, JobStatus, LabelAttributes, LabelRecord, LabelStatus};

    /// Sweeps every claim as stale while the delivery is in flight
    struct SweepingSink {
        ledger: PrintJobLedger,
    }

    impl PrintSink for SweepingSink {
        async fn deliver(&self, _data: &[u8]) -> DeliveryResult<()> {
            self.ledger.reconcile_stale(Duration::ZERO).unwrap();
            Ok(())
        }

        async fn is_online(&self) -> bool {
            true
        }
    }

    struct Fixture {
        storage: Arc<PrintStorage>,
        ledger: PrintJobLedger,
    }

    impl Fixture {
        fn new() -> Self {
            let storage = Arc::new(PrintStorage::open_in_memory().unwrap());
            let ledger = PrintJobLedger::new(storage.clone(), 3);
            Self { storage, ledger }
        }

        fn job(&self, business_id: &str) -> PrintJob {
            let label = LabelRecord::new(business_id, LabelAttributes::default(), Uuid::new_v4(), Utc::now());
            self.storage.insert_label(&label).unwrap();
            let document = Document {
                content: format!("^XA\n^FD{business_id}^FS\n^XZ\n"),
                content_hash: business_id.into(),
                rendered_at: Utc::now(),
            };
            self.ledger.create(label.internal_id, document, label.submitted_by).unwrap()
        }

        fn dispatcher(&self, sink: Arc<MockSink>, mode: FailureAttribution) -> BatchDispatcher<MockSink> {
            BatchDispatcher::new(self.ledger.clone(), sink, mode, Duration::from_secs(5))
        }

        fn status(&self, job: &PrintJob) -> JobStatus {
            self.ledger.get(job.job_id).unwrap().status
        }
    }

    #[tokio::test]
    async fn test_batch_success_completes_every_job() {
        let fx = Fixture::new();
        let (a, b) = (fx.job("A"), fx.job("B"));
        let sink = Arc::new(MockSink::ok());

        let report = fx
            .dispatcher(sink.clone(), FailureAttribution::Batch)
            .dispatch(&[a.job_id, b.job_id])
            .await
            .unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.completed, vec![a.job_id, b.job_id]);
        assert!(report.failed.is_empty());
        assert_eq!(sink.sent(), vec![a.document.content.into_bytes(), b.document.content.into_bytes()]);
        assert_eq!(
            fx.storage.get_label(a.label_ref).unwrap().unwrap().status,
            LabelStatus::Printed
        );
    }

    #[tokio::test]
    async fn test_batch_failure_fails_every_job_with_one_reason() {
        let fx = Fixture::new();
        let (a, b) = (fx.job("A"), fx.job("B"));
        let sink = Arc::new(MockSink::failing_from(1));

        let report = fx
            .dispatcher(sink.clone(), FailureAttribution::Batch)
            .dispatch(&[a.job_id, b.job_id])
            .await
            .unwrap();

        assert!(report.completed.is_empty());
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].reason, report.failed[1].reason);
        assert_eq!(fx.status(&a), JobStatus::Failed);
        assert_eq!(fx.status(&b), JobStatus::Failed);
        assert_eq!(
            fx.ledger.get(b.job_id).unwrap().error_reason.as_deref(),
            Some("Printer offline: mock printer")
        );
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_per_document_attribution() {
        let fx = Fixture::new();
        let (a, b) = (fx.job("A"), fx.job("B"));
        let sink = Arc::new(MockSink::failing_from(1));

        let report = fx
            .dispatcher(sink, FailureAttribution::PerDocument)
            .dispatch(&[a.job_id, b.job_id])
            .await
            .unwrap();

        assert_eq!(report.mode, FailureAttribution::PerDocument);
        assert_eq!(report.completed, vec![a.job_id]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].job_id, b.job_id);
        assert_eq!(fx.status(&a), JobStatus::Completed);
        assert_eq!(fx.status(&b), JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_non_pending_jobs_are_skipped() {
        let fx = Fixture::new();
        let done = fx.job("DONE");
        let held = fx.job("HELD");
        let unknown = Uuid::new_v4();
        let sink = Arc::new(MockSink::ok());
        let dispatcher = fx.dispatcher(sink.clone(), FailureAttribution::Batch);

        dispatcher.dispatch(&[done.job_id]).await.unwrap();
        fx.ledger.claim(held.job_id).unwrap();

        let report = dispatcher
            .dispatch(&[done.job_id, held.job_id, unknown])
            .await
            .unwrap();
        assert_eq!(report.attempted, 0);
        assert_eq!(report.skipped, vec![done.job_id, held.job_id, unknown]);
        assert_eq!(sink.sent().len(), 1);
        assert_eq!(fx.status(&held), JobStatus::Dispatching);
    }

    #[tokio::test]
    async fn test_slow_sink_times_out() {
        let fx = Fixture::new();
        let job = fx.job("SLOW");
        let dispatcher = BatchDispatcher::new(
            fx.ledger.clone(),
            Arc::new(MockSink::hanging()),
            FailureAttribution::PerDocument,
            Duration::from_millis(50),
        );

        let report = dispatcher.dispatch(&[job.job_id]).await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].reason.starts_with("Timeout"));
        assert_eq!(fx.status(&job), JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_dropped_run_releases_claims() {
        let fx = Fixture::new();
        let job = fx.job("DROPPED");
        let dispatcher = fx.dispatcher(Arc::new(MockSink::hanging()), FailureAttribution::Batch);

        let cut_short =
            tokio::time::timeout(Duration::from_millis(50), dispatcher.dispatch(&[job.job_id])).await;
        assert!(cut_short.is_err());

        let stored = fx.ledger.get(job.job_id).unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error_reason.as_deref(), Some(CANCELLED_REASON));
    }

    #[tokio::test]
    async fn test_unrecorded_outcome_is_still_reported() {
        let fx = Fixture::new();
        let (a, b) = (fx.job("A"), fx.job("B"));
        let sink = Arc::new(SweepingSink {
            ledger: fx.ledger.clone(),
        });
        let dispatcher = BatchDispatcher::new(
            fx.ledger.clone(),
            sink,
            FailureAttribution::Batch,
            Duration::from_secs(5),
        );

        let report = dispatcher.dispatch(&[a.job_id, b.job_id]).await.unwrap();

        assert_eq!(report.attempted, 2);
        assert!(report.completed.is_empty());
        assert_eq!(report.attempted, report.completed.len() + report.failed.len());
        assert!(report.failed.iter().all(|f| f.reason.starts_with("outcome not recorded")));
        assert_eq!(fx.status(&a), JobStatus::Failed);
        assert_eq!(fx.status(&b), JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_large_requests_run_in_chunks() {
        let fx = Fixture::new();
        let jobs: Vec<PrintJob> = (0..5).map(|i| fx.job(&format!("RUN-{i}"))).collect();
        let ids: Vec<Uuid> = jobs.iter().map(|j| j.job_id).collect();
        // Second run fails; the first run's outcome must stand
        let sink = Arc::new(MockSink::failing_from(2));
        let dispatcher = fx
            .dispatcher(sink.clone(), FailureAttribution::Batch)
            .with_run_size(2);

        let report = dispatcher.dispatch(&ids).await.unwrap();

        assert_eq!(report.attempted, 5);
        assert_eq!(report.completed, ids[..2].to_vec());
        assert_eq!(report.failed.len(), 3);
        assert_eq!(fx.status(&jobs[0]), JobStatus::Completed);
        assert_eq!(fx.status(&jobs[4]), JobStatus::Failed);
        assert_eq!(sink.sent().len(), 2);
    }

    #[test]
    fn test_stale_floor_covers_a_full_run() {
        let fx = Fixture::new();
        let dispatcher = fx
            .dispatcher(Arc::new(MockSink::ok()), FailureAttribution::Batch)
            .with_run_size(3);

        assert_eq!(dispatcher.run_budget(), Duration::from_secs(15));
        assert_eq!(dispatcher.stale_floor(), Duration::from_secs(20));

        let clamped = fx
            .dispatcher(Arc::new(MockSink::ok()), FailureAttribution::Batch)
            .with_run_size(0);
        assert_eq!(clamped.run_size, 1);
    }
}

//! Dispatch worker
//!
//! Periodic housekeeping for the pipeline: fails stale `dispatching` jobs
//! left by an interrupted run and, when enabled, sweeps `pending` jobs to the
//! printer.

use super::service::LabelPipeline;
use label_printer::PrintSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

pub struct DispatchWorker<K> {
    pipeline: Arc<LabelPipeline<K>>,
    reconcile_every: Duration,
    stale_after: Duration,
    dispatch_every: Option<Duration>,
}

impl<K: PrintSink + 'static> DispatchWorker<K> {
    pub fn new(pipeline: Arc<LabelPipeline<K>>, reconcile_every: Duration, stale_after: Duration) -> Self {
        Self {
            pipeline,
            reconcile_every,
            stale_after,
            dispatch_every: None,
        }
    }

    /// Also dispatch pending jobs on this period
    pub fn with_dispatch_interval(mut self, every: Duration) -> Self {
        self.dispatch_every = Some(every).filter(|d| !d.is_zero());
        self
    }

    /// Run until shutdown
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            reconcile_secs = self.reconcile_every.as_secs(),
            stale_secs = self.stale_after.as_secs(),
            dispatch_secs = self.dispatch_every.map(|d| d.as_secs()),
            "Dispatch worker started"
        );

        let mut reconcile_tick = interval(self.reconcile_every.max(Duration::from_secs(1)));
        reconcile_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Disabled dispatch still needs a timer for select!; it is never polled
        let mut dispatch_tick = interval(self.dispatch_every.unwrap_or(Duration::from_secs(3600)));
        dispatch_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Dispatch worker received shutdown signal");
                    break;
                }
                _ = reconcile_tick.tick() => self.reconcile(),
                _ = dispatch_tick.tick(), if self.dispatch_every.is_some() => self.dispatch().await,
            }
        }
    }

    fn reconcile(&self) {
        match self.pipeline.reconcile_stale_dispatches(self.stale_after) {
            Ok(0) => {}
            Ok(count) => tracing::warn!(count, "Reconciled stale dispatches"),
            Err(e) => tracing::error!(error = %e, "Stale dispatch reconciliation failed"),
        }
    }

    async fn dispatch(&self) {
        match self.pipeline.dispatch_pending(None).await {
            Ok(report) if report.attempted > 0 => tracing::info!(
                completed = report.completed.len(),
                failed = report.failed.len(),
                "Periodic dispatch finished"
            ),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Periodic dispatch failed"),
        }
    }
}

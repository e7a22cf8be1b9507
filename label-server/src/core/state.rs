use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::tasks::BackgroundTasks;
use crate::core::{Config, Result};
use crate::printing::{ConfiguredSink, DispatchWorker, LabelPipeline, LabelStore, PrintStorage, PrinterMode};

/// The pipeline as the server runs it
pub type Pipeline = LabelPipeline<ConfiguredSink>;

/// Shared server state
///
/// Cheap to clone; every field is shared.
///
/// | Field | Meaning |
/// |-------|---------|
/// | config | immutable configuration |
/// | pipeline | intake, rendering, job ledger and dispatch |
/// | started_at | process start, for uptime |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub pipeline: Arc<Pipeline>,
    pub started_at: Instant,
}

impl ServerState {
    /// Build state around an existing store and sink
    pub fn new(config: Config, store: Arc<dyn LabelStore>, sink: ConfiguredSink) -> Self {
        let pipeline = LabelPipeline::new(store, Arc::new(sink), config.pipeline_options());
        Self {
            config,
            pipeline: Arc::new(pipeline),
            started_at: Instant::now(),
        }
    }

    /// Open the database under the work dir and connect the configured sink
    pub fn initialize(config: &Config) -> Result<Self> {
        config.validate()?;

        let db_path = config.database_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let storage = PrintStorage::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Label database opened");

        let sink = match config.printer_mode {
            PrinterMode::Network => ConfiguredSink::network(
                &config.printer_addr,
                Duration::from_millis(config.printer_timeout_ms),
            )?,
            PrinterMode::Spool => {
                let dir = config.spool_dir();
                std::fs::create_dir_all(&dir)?;
                ConfiguredSink::spool(dir)
            }
        };
        tracing::info!(
            printer = %sink.describe(),
            failure_attribution = ?config.failure_attribution,
            auto_dispatch = config.auto_dispatch,
            dispatch_run_size = config.dispatch_run_size,
            "Printer sink configured"
        );

        Ok(Self::new(config.clone(), Arc::new(storage), sink))
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Start the dispatch worker
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        let worker = DispatchWorker::new(
            self.pipeline.clone(),
            Duration::from_secs(self.config.reconcile_interval_secs),
            Duration::from_secs(self.config.stale_dispatch_secs),
        )
        .with_dispatch_interval(Duration::from_secs(self.config.dispatch_interval_secs));
        let shutdown = tasks.shutdown_token();
        tasks.spawn("dispatch_worker", worker.run(shutdown));

        tasks.log_summary();
        tasks
    }
}

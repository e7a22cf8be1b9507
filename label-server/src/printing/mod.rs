//! Label printing pipeline
//!
//! - Intake: dedup by business id, backed by the store's unique index
//! - Rendering: one ZPL document per new label record
//! - Ledger: print job state machine with bounded retries
//! - Dispatch: claimed delivery to the configured sink

pub mod dispatcher;
pub mod intake;
pub mod ledger;
pub mod renderer;
pub mod service;
pub mod sink;
pub mod storage;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use dispatcher::BatchDispatcher;
pub use intake::{DedupIntake, IntakeError, IntakeResult};
pub use ledger::{Claim, LedgerError, LedgerResult, PrintJobLedger};
pub use renderer::{LabelRenderer, RenderConfig, RenderError, RenderResult};
pub use service::{LabelPipeline, PipelineError, PipelineOptions, PipelineResult};
pub use sink::{ConfiguredSink, PrinterMode};
pub use storage::{LabelStore, PrintStorage, StorageError, StorageResult, StorageStats};
pub use types::*;
pub use worker::DispatchWorker;

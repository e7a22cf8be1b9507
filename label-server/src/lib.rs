//! Label Server - batch label intake and print pipeline
//!
//! # Overview
//!
//! Accepts batches of manufacturing labels, drops units that were already
//! seen, renders one ZPL document per new label and drives the documents
//! through a retryable print pipeline.
//!
//! - **Printing** (`printing`): dedup intake, rendering, job ledger, dispatch
//! - **Storage** (`printing::storage`): embedded redb database
//! - **Identity** (`auth`): upstream-authenticated user from `X-User-Id`
//! - **HTTP API** (`api`): JSON endpoints
//!
//! # Layout
//!
//! ```text
//! label-server/src/
//! ├── core/          # config, state, background tasks, server
//! ├── auth/          # CurrentUser extractor
//! ├── printing/      # the pipeline
//! ├── api/           # routes and handlers
//! └── utils/         # logging
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod printing;
pub mod utils;

pub use auth::CurrentUser;
pub use core::{Config, Server, ServerError, ServerState};
pub use printing::{LabelPipeline, PipelineEvent};
pub use utils::logger::{LogGuard, init_logger};

/// Load `.env`, read the configuration, create the work dir and start logging
///
/// Keep the returned guard alive for the life of the process.
pub fn setup_environment() -> anyhow::Result<(Config, LogGuard)> {
    // A missing .env is normal outside development
    let _ = dotenv::dotenv();

    let config = Config::from_env();
    std::fs::create_dir_all(&config.work_dir)?;

    let guard = init_logger(&config.log_level, config.log_json, config.log_dir.as_deref())?;
    Ok((config, guard))
}

pub fn print_banner() {
    println!(
        r#"
    __          __         __
   / /   ____ _/ /_  ___  / /
  / /   / __ `/ __ \/ _ \/ /
 / /___/ /_/ / /_/ /  __/ /
/_____/\__,_/_.___/\___/_/
    "#
    );
}

//! Health routes
//!
//! | Path | Method | Meaning |
//! |------|--------|---------|
//! | /health | GET | liveness |
//! | /health/detailed | GET | storage and printer checks |

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;
use crate::printing::StorageStats;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(detailed_health))
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
pub struct DetailedHealthResponse {
    /// ok | degraded
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    storage: CheckResult,
    printer: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<StorageStats>,
}

impl CheckResult {
    fn ok(message: Option<String>) -> Self {
        Self {
            status: "ok",
            message,
            stats: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: Some(message.into()),
            stats: None,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn detailed_health(State(state): State<ServerState>) -> Json<DetailedHealthResponse> {
    let pipeline = state.pipeline();

    let storage = match pipeline.storage_stats() {
        Ok(stats) => CheckResult {
            stats: Some(stats),
            ..CheckResult::ok(None)
        },
        Err(e) => CheckResult::error(e.to_string()),
    };

    let target = pipeline.sink().describe();
    let printer = if pipeline.sink_online().await {
        CheckResult::ok(Some(target))
    } else {
        CheckResult::error(format!("{target} unreachable"))
    };

    let status = if storage.is_ok() && printer.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(DetailedHealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime().as_secs(),
        checks: HealthChecks { storage, printer },
    })
}

//! Print Job API

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/print-jobs", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/dispatch", post(handler::dispatch_pending))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/retry", post(handler::retry))
}

//! Label API

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/labels", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/batch", post(handler::submit_batch))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/print", post(handler::print))
}

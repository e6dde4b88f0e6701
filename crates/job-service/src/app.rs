//! axum router assembly (§4.10).

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::routes;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.upload_max_bytes as usize;
    Router::new()
        .route("/run", post(routes::run))
        .route("/stop/:job_id", post(routes::stop))
        .route("/status/:job_id", get(routes::status))
        .route("/download/:job_id/:file", get(routes::download))
        .route("/upload", post(routes::upload).layer(DefaultBodyLimit::max(upload_limit)))
        .route("/config", post(routes::set_config))
        .with_state(state)
}

pub mod export;
pub mod summarize;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// All HTTP routes of the service.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/summarize", post(summarize::summarize))
        .route("/api/export", post(export::export))
        .route("/api/export/save", post(export::save_export))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

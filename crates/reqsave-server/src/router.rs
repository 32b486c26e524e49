use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the router: `GET /v1/health`, and every other request is saved.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .fallback(handler::save_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub mod guard;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::services::Fleet;
use crate::types::HealthResponse;

pub fn create_router(fleet: Arc<Fleet>) -> Router {
    // Browser dashboards are served from a different origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health))
        // Fleet telemetry
        .route("/api/nodes_data", get(guard::nodes_data))
        // Guard control
        .route("/api/start_guard", post(guard::start_guard))
        .route("/api/stop_guard", post(guard::stop_guard))
        .route("/api/guard_policy", post(guard::update_guard_policy))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(fleet)
}

/// GET /health - Health check endpoint
async fn health(State(fleet): State<Arc<Fleet>>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            nodes: fleet.node_count().await,
        }),
    )
}

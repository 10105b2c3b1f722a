use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::info;

use crate::services::Fleet;
use crate::types::{GuardPolicyRequest, GuardRequest, GuardResponse, NodeReport};

fn describe(hostnames: &[String]) -> String {
    if hostnames.is_empty() {
        "all nodes".to_string()
    } else {
        hostnames.join(", ")
    }
}

/// GET /api/nodes_data - Resample and list every node
pub async fn nodes_data(State(fleet): State<Arc<Fleet>>) -> Json<Vec<NodeReport>> {
    Json(fleet.sample().await)
}

/// POST /api/start_guard - Start guards on the given hosts
pub async fn start_guard(
    State(fleet): State<Arc<Fleet>>,
    Json(req): Json<GuardRequest>,
) -> Json<GuardResponse> {
    info!("Starting guards on {}", describe(&req.hostnames));
    let results = fleet.start_guard(&req.hostnames).await;
    Json(GuardResponse::success(Some(results)))
}

/// POST /api/stop_guard - Stop guards on the given hosts
pub async fn stop_guard(
    State(fleet): State<Arc<Fleet>>,
    Json(req): Json<GuardRequest>,
) -> Json<GuardResponse> {
    info!("Stopping guards on {}", describe(&req.hostnames));
    let results = fleet.stop_guard(&req.hostnames).await;
    Json(GuardResponse::success(Some(results)))
}

/// POST /api/guard_policy - Replace the fleet-wide guard policy
pub async fn update_guard_policy(
    State(fleet): State<Arc<Fleet>>,
    Json(req): Json<GuardPolicyRequest>,
) -> Result<Json<GuardResponse>, (StatusCode, String)> {
    fleet
        .update_policy(req.policy)
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    Ok(Json(GuardResponse::success(None)))
}

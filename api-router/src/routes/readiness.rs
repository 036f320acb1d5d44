use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use common::error::AppError;

use crate::api_state::ApiState;

/// Readiness probe: returns 200 if the configured container is reachable,
/// else 503.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    let probe = async {
        let storage = state
            .stores
            .resolve(&state.config.storage_account, &state.config.storage_container)
            .await?;
        storage.prefix_exists(".readiness").await?;
        Ok::<_, AppError>(())
    };

    match probe.await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "checks": { "storage": "ok" }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "error",
                "checks": { "storage": "fail" },
                "reason": e.to_string()
            })),
        ),
    }
}

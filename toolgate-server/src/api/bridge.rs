// Copyright 2025 Toolgate Contributors (https://github.com/toolgate)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Bridge-process endpoints.
//!
//! The user's local bridge process registers its tool catalog, heartbeats,
//! polls for queued calls, and posts results back. Poll delivery is
//! at-most-once: a drained call is gone even if the process crashes before
//! running it, and the original caller times out.

use crate::api::{ApiError, AppState};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use toolgate_core::{
    now_millis, BridgeConnection, BridgeErrorPayload, BridgeOutcome, BridgeStatus, BridgeToolDef,
    PendingBridgeCall,
};
use tracing::info;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/bridge/:user_id/register", post(handle_register))
        .route("/bridge/:user_id/heartbeat", post(handle_heartbeat))
        .route("/bridge/:user_id/poll", get(handle_poll))
        .route("/bridge/:user_id/disconnect", post(handle_disconnect))
        .route("/bridge/results/:call_id", post(handle_result))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    /// Live catalog advertised by the local servers
    #[serde(default)]
    tools: Vec<BridgeToolDef>,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    status: BridgeStatus,
}

/// POST /bridge/:user_id/register — mark connected with a fresh heartbeat
/// and replace the advertised catalog wholesale.
async fn handle_register(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    info!(user_id = %user_id, tools = request.tools.len(), "Bridge registering");

    state
        .store
        .upsert_bridge_connection(BridgeConnection {
            user_id,
            status: BridgeStatus::Connected,
            last_heartbeat_ms: now_millis(),
            tools: request.tools,
        })
        .await?;

    Ok(Json(RegisterResponse {
        status: BridgeStatus::Connected,
    }))
}

/// POST /bridge/:user_id/heartbeat — 404 for an unregistered user so the
/// bridge process knows to re-register.
async fn handle_heartbeat(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .store
        .touch_bridge_heartbeat(&user_id, now_millis())
        .await?;
    Ok(Json(serde_json::json!({})))
}

#[derive(Debug, Serialize)]
struct PollResponse {
    calls: Vec<PendingBridgeCall>,
}

/// GET /bridge/:user_id/poll — atomically drain all queued calls.
async fn handle_poll(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<PollResponse> {
    let calls = state.bridge.drain_pending(&user_id);
    if !calls.is_empty() {
        info!(user_id = %user_id, count = calls.len(), "Delivering bridge calls");
    }
    Json(PollResponse { calls })
}

#[derive(Debug, Deserialize)]
struct ResultRequest {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<BridgeErrorPayload>,
}

/// POST /bridge/results/:call_id — hand a result to the suspended caller.
/// Always accepted: a result whose caller already timed out is simply
/// dropped.
async fn handle_result(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
    Json(request): Json<ResultRequest>,
) -> Json<Value> {
    let outcome = BridgeOutcome {
        result: request.result,
        error: request.error,
    };
    state.bridge.submit_result(&call_id, outcome);
    Json(serde_json::json!({}))
}

/// POST /bridge/:user_id/disconnect — graceful shutdown of the bridge
/// process. Queued calls stay for the TTL sweep.
async fn handle_disconnect(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    info!(user_id = %user_id, "Bridge disconnecting");
    state
        .store
        .set_bridge_status(&user_id, BridgeStatus::Disconnected)
        .await?;
    Ok(Json(serde_json::json!({})))
}

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

//! HTTP transport for the MCP endpoint.
//!
//! One JSON-RPC-over-POST route per collection. Caller identity arrives in
//! the `x-toolgate-user` header (stamped by the fronting auth layer, which
//! is out of scope here) and request-scoped env vars in `x-toolgate-env`
//! as a JSON object. A malformed envelope still gets a JSON-RPC error
//! response rather than a bare HTTP error, since MCP clients only speak
//! JSON-RPC.

use crate::api::AppState;
use crate::mcp::handlers::CallerContext;
use crate::mcp::protocol::*;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use std::collections::HashMap;
use tracing::warn;

pub const USER_HEADER: &str = "x-toolgate-user";
pub const ENV_HEADER: &str = "x-toolgate-env";

// A request with no user header gets an empty caller id. The empty string
// is not a valid user id and the credential resolver rejects it as owner
// explicitly, so unidentified callers can never pick up stored
// credentials, whatever a collection's owner id happens to be.

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/mcp/health", get(handle_mcp_health))
        .route("/mcp/:collection_id", post(handle_mcp_request))
        .with_state(state)
}

/// Gateway liveness + protocol info (GET /mcp/health)
async fn handle_mcp_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "protocol_version": MCP_PROTOCOL_VERSION,
        "server_name": "toolgate",
        "server_version": env!("CARGO_PKG_VERSION"),
        "capabilities": { "tools": true }
    }))
}

/// Handle MCP JSON-RPC request over HTTP POST
async fn handle_mcp_request(
    State(state): State<AppState>,
    Path(collection_id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Json<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Malformed JSON-RPC envelope");
            return Json(JsonRpcResponse::error(
                JsonRpcId::Null,
                JsonRpcError::parse_error(format!("Invalid JSON: {}", e)),
            ));
        }
    };

    let caller = caller_from_headers(&headers);
    let response = state
        .handler
        .handle_request(&collection_id, &caller, request)
        .await;
    Json(response)
}

fn caller_from_headers(headers: &HeaderMap) -> CallerContext {
    let user_id = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let env: HashMap<String, String> = headers
        .get(ENV_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| match serde_json::from_str(raw) {
            Ok(map) => Some(map),
            Err(e) => {
                warn!(error = %e, "Ignoring unparseable env header");
                None
            }
        })
        .unwrap_or_default();

    CallerContext { user_id, env }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_missing_user_header_leaves_caller_unidentified() {
        let caller = caller_from_headers(&HeaderMap::new());
        assert!(caller.user_id.is_empty());
        assert!(caller.env.is_empty());
    }

    #[test]
    fn test_headers_carry_identity_and_env() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_static("alice"));
        headers.insert(
            ENV_HEADER,
            HeaderValue::from_static(r#"{"GITHUB_TOKEN":"t1"}"#),
        );

        let caller = caller_from_headers(&headers);
        assert_eq!(caller.user_id, "alice");
        assert_eq!(caller.env.get("GITHUB_TOKEN").map(String::as_str), Some("t1"));
    }

    #[test]
    fn test_bad_env_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_static("alice"));
        headers.insert(ENV_HEADER, HeaderValue::from_static("not json"));

        let caller = caller_from_headers(&headers);
        assert_eq!(caller.user_id, "alice");
        assert!(caller.env.is_empty());
    }
}

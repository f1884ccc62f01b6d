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

//! MCP Request Handlers
//!
//! The JSON-RPC dispatcher for the gateway. Malformed requests and
//! unresolvable names come back as JSON-RPC error objects; failures of a
//! well-addressed tool call come back as a successful response whose
//! content is flagged `isError`, so the calling agent can read the failure
//! and react instead of aborting the session.

use crate::bridge::BridgeRpc;
use crate::config::GatewayConfig;
use crate::executor::{ExecuteRequest, ToolExecutor};
use crate::mcp::protocol::*;
use crate::mcp::{credentials, name};
use crate::store::CollectionStore;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use toolgate_core::{now_millis, Collection, PendingBridgeCall, RegistryToolRef, ToolCallError};
use tracing::{info, warn};

/// Identity and request-scoped credentials of the calling agent.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    pub user_id: String,
    /// Env vars supplied on the request; only consulted for non-owners
    pub env: HashMap<String, String>,
}

impl CallerContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            env: HashMap::new(),
        }
    }
}

/// How one tools/call failed: a tool-level failure the agent should read
/// (surfaced as `isError` content) or an infrastructure failure that must
/// become a JSON-RPC error object.
enum CallFailure {
    Tool(ToolCallError),
    Rpc(JsonRpcError),
}

impl From<ToolCallError> for CallFailure {
    fn from(e: ToolCallError) -> Self {
        CallFailure::Tool(e)
    }
}

/// MCP request handler
pub struct McpHandler {
    store: Arc<dyn CollectionStore>,
    executor: Arc<dyn ToolExecutor>,
    bridge: Arc<BridgeRpc>,
    gateway: GatewayConfig,
}

impl McpHandler {
    pub fn new(
        store: Arc<dyn CollectionStore>,
        executor: Arc<dyn ToolExecutor>,
        bridge: Arc<BridgeRpc>,
        gateway: GatewayConfig,
    ) -> Self {
        Self {
            store,
            executor,
            bridge,
            gateway,
        }
    }

    /// Handle a JSON-RPC request against one collection
    pub async fn handle_request(
        &self,
        collection_id: &str,
        caller: &CallerContext,
        request: JsonRpcRequest,
    ) -> JsonRpcResponse {
        info!(method = %request.method, collection_id = %collection_id, "MCP request received");

        match request.method.as_str() {
            "ping" => JsonRpcResponse::success(request.id, json!({})),

            "initialize" => self.handle_initialize(request.id, request.params),
            "initialized" | "notifications/initialized" => {
                JsonRpcResponse::success(request.id, json!({}))
            }

            "tools/list" => self.handle_tools_list(request.id, collection_id).await,
            "tools/call" => {
                self.handle_tools_call(request.id, collection_id, caller, request.params)
                    .await
            }

            _ => {
                warn!(method = %request.method, "Unknown MCP method");
                JsonRpcResponse::error(request.id, JsonRpcError::method_not_found(&request.method))
            }
        }
    }

    /// Handle initialize. Params are optional and never rejected: the
    /// handshake has no server-side state to get wrong.
    fn handle_initialize(
        &self,
        id: JsonRpcId,
        params: Option<serde_json::Value>,
    ) -> JsonRpcResponse {
        if let Some(p) = params {
            if let Ok(init) = serde_json::from_value::<InitializeParams>(p) {
                if let Some(client) = init.client_info {
                    info!(client = %client.name, version = %client.version, "MCP client initializing");
                }
            }
        }

        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: "toolgate".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        success(id, result)
    }

    /// Handle tools/list: registry tools in collection order, then bridge
    /// tools from the owner's live catalog.
    async fn handle_tools_list(&self, id: JsonRpcId, collection_id: &str) -> JsonRpcResponse {
        let collection = match self.load_collection(collection_id).await {
            Ok(c) => c,
            Err(e) => return JsonRpcResponse::error(id, e),
        };

        let mut tools: Vec<Tool> = collection
            .registry_tools
            .iter()
            .map(|r| Tool {
                name: r.listed_name(),
                description: r.description.clone(),
                input_schema: r.input_schema.clone(),
            })
            .collect();

        match self.list_bridge_tools(&collection).await {
            Ok(bridge_tools) => tools.extend(bridge_tools),
            Err(e) => return JsonRpcResponse::error(id, e),
        }

        success(
            id,
            ListToolsResult {
                tools,
                next_cursor: None,
            },
        )
    }

    /// Bridge tools appear only while the owner's bridge process is
    /// registered and connected. Refs whose catalog entry is gone (the
    /// local server no longer advertises the tool) are skipped silently;
    /// a store failure is not, it is an infrastructure error.
    async fn list_bridge_tools(&self, collection: &Collection) -> Result<Vec<Tool>, JsonRpcError> {
        if collection.bridge_tools.is_empty() {
            return Ok(Vec::new());
        }

        let connection = match self.store.get_bridge_connection(&collection.owner_id).await {
            Ok(Some(conn)) if conn.is_connected() => conn,
            Ok(_) => return Ok(Vec::new()),
            Err(e) => {
                return Err(JsonRpcError::internal_error(format!("Store failure: {}", e)))
            }
        };

        let tools = collection
            .bridge_tools
            .iter()
            .filter_map(|b| {
                connection.find_tool(&b.server_id, &b.tool).map(|def| Tool {
                    name: format!("bridge:{}/{}", b.server_id, b.tool),
                    description: def.description.clone(),
                    input_schema: def.input_schema.clone(),
                })
            })
            .collect();
        Ok(tools)
    }

    /// Handle tools/call: parse, resolve, then dispatch to the registry
    /// or bridge path.
    async fn handle_tools_call(
        &self,
        id: JsonRpcId,
        collection_id: &str,
        caller: &CallerContext,
        params: Option<serde_json::Value>,
    ) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)),
                    )
                }
            },
            None => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing tools/call params"),
                )
            }
        };

        let collection = match self.load_collection(collection_id).await {
            Ok(c) => c,
            Err(e) => return JsonRpcResponse::error(id, e),
        };

        let outcome = match name::resolve(&params.name, &collection) {
            Ok(name::ResolvedTool::Registry(tool)) => {
                let tool = tool.clone();
                self.call_registry_tool(&collection, &tool, caller, params.arguments)
                    .await
                    .map_err(CallFailure::Tool)
            }
            Ok(name::ResolvedTool::Bridge { server_id, tool }) => {
                self.call_bridge_tool(&collection, &server_id, &tool, params.arguments)
                    .await
            }
            Err(e) => {
                return JsonRpcResponse::error(id, JsonRpcError::invalid_params(e.to_string()))
            }
        };

        self.record_usage(collection_id, &params.name);

        match outcome {
            Ok(result) => success(id, result),
            Err(CallFailure::Tool(e)) => success(id, tool_failure(&e)),
            Err(CallFailure::Rpc(e)) => JsonRpcResponse::error(id, e),
        }
    }

    /// Registry path: resolve credentials, then invoke the sandbox
    /// executor with the collection's timeout override.
    async fn call_registry_tool(
        &self,
        collection: &Collection,
        tool: &RegistryToolRef,
        caller: &CallerContext,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, ToolCallError> {
        let env = credentials::resolve_env(tool, collection, &caller.user_id, &caller.env)?;

        let timeout = collection
            .executor
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(Duration::ZERO); // zero = executor default

        let request = ExecuteRequest {
            package: tool.package.clone(),
            tool: tool.tool.clone(),
            version: tool.version.clone(),
            arguments,
            env,
            timeout,
        };

        match self.executor.execute(request).await {
            Ok(output) => Ok(CallToolResult::text(render_output(&output))),
            Err(e) => Err(ToolCallError::ExecutionFailed {
                code: e.code,
                message: e.message,
            }),
        }
    }

    /// Bridge path: gate on the owner's connection state, then enqueue
    /// and block on the correlated result.
    async fn call_bridge_tool(
        &self,
        collection: &Collection,
        server_id: &str,
        tool: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, CallFailure> {
        let connection = self
            .store
            .get_bridge_connection(&collection.owner_id)
            .await
            .map_err(|e| {
                CallFailure::Rpc(JsonRpcError::internal_error(format!("Store failure: {}", e)))
            })?;

        let connection = match connection {
            Some(conn) if conn.is_connected() => conn,
            _ => return Err(ToolCallError::BridgeNotConnected.into()),
        };

        let staleness_ms = self.gateway.staleness_window().as_millis() as u64;
        if connection.is_stale(staleness_ms, now_millis()) {
            return Err(ToolCallError::BridgeStale {
                last_heartbeat_ms: connection.last_heartbeat_ms,
            }
            .into());
        }

        let call = PendingBridgeCall {
            call_id: BridgeRpc::new_call_id(),
            user_id: collection.owner_id.clone(),
            server_id: server_id.to_string(),
            tool: tool.to_string(),
            arguments,
            enqueued_at_ms: now_millis(),
        };
        info!(call_id = %call.call_id, server_id = %server_id, tool = %tool, "Forwarding bridge call");

        let outcome = self
            .bridge
            .call(call, self.gateway.bridge_call_timeout())
            .await
            .map_err(CallFailure::Tool)?;

        if let Some(err) = outcome.error {
            return Err(ToolCallError::ExecutionFailed {
                code: err.code,
                message: err.message,
            }
            .into());
        }
        let output = outcome.result.unwrap_or(serde_json::Value::Null);
        Ok(CallToolResult::text(render_output(&output)))
    }

    /// Load a collection and enforce its uniqueness invariant: duplicate
    /// tool refs mean corrupt stored data, an infrastructure error.
    async fn load_collection(&self, collection_id: &str) -> Result<Collection, JsonRpcError> {
        match self.store.get_collection(collection_id).await {
            Ok(Some(c)) => {
                if let Err(e) = c.validate() {
                    return Err(JsonRpcError::internal_error(format!(
                        "Corrupt collection {}: {}",
                        collection_id, e
                    )));
                }
                Ok(c)
            }
            Ok(None) => Err(JsonRpcError::invalid_params(format!(
                "Collection not found: {}",
                collection_id
            ))),
            Err(e) => Err(JsonRpcError::internal_error(format!(
                "Store failure: {}",
                e
            ))),
        }
    }

    /// Best-effort usage counter; the call must not wait on it.
    fn record_usage(&self, collection_id: &str, tool_name: &str) {
        let store = Arc::clone(&self.store);
        let collection_id = collection_id.to_string();
        let tool_name = tool_name.to_string();
        tokio::spawn(async move {
            if let Err(e) = store.record_tool_usage(&collection_id, &tool_name).await {
                warn!(collection_id = %collection_id, tool = %tool_name, error = %e, "Failed to record tool usage");
            }
        });
    }
}

/// Tool failures carry their stable code as a leading token so agents can
/// branch on it without parsing the prose.
fn tool_failure(e: &ToolCallError) -> CallToolResult {
    CallToolResult::error_text(format!("[{}] {}", e.code(), e.describe()))
}

/// Tool output rendered as MCP text content. Strings pass through bare so
/// agents do not see an extra layer of quotes.
fn render_output(output: &serde_json::Value) -> String {
    match output {
        serde_json::Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn success(id: JsonRpcId, result: impl Serialize) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(
            id,
            JsonRpcError::internal_error(format!("Failed to serialize result: {}", e)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionError;
    use crate::store::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use serde_json::Value;
    use toolgate_core::{BridgeConnection, BridgeStatus, BridgeToolRef};

    struct NullExecutor;

    #[async_trait]
    impl ToolExecutor for NullExecutor {
        async fn execute(&self, _request: ExecuteRequest) -> Result<Value, ExecutionError> {
            Err(ExecutionError::failed("unexpected executor call"))
        }
    }

    fn handler(store: Arc<MemoryStore>) -> McpHandler {
        McpHandler::new(
            store,
            Arc::new(NullExecutor),
            Arc::new(BridgeRpc::new(Duration::from_secs(300))),
            GatewayConfig::default(),
        )
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
            id: JsonRpcId::Number(1),
        }
    }

    #[tokio::test]
    async fn test_initialize_without_params_succeeds() {
        let h = handler(Arc::new(MemoryStore::new()));
        let response = h
            .handle_request("col-1", &CallerContext::new("alice"), request("initialize", None))
            .await;
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "toolgate");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_method_is_method_not_found() {
        let h = handler(Arc::new(MemoryStore::new()));
        let response = h
            .handle_request(
                "col-1",
                &CallerContext::new("alice"),
                request("resources/list", None),
            )
            .await;
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_unknown_collection_is_invalid_params() {
        let h = handler(Arc::new(MemoryStore::new()));
        let response = h
            .handle_request(
                "missing",
                &CallerContext::new("alice"),
                request("tools/list", None),
            )
            .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, -32602);
        assert!(error.message.contains("Collection not found"));
    }

    #[test]
    fn test_string_output_renders_bare() {
        assert_eq!(render_output(&serde_json::json!("hello")), "hello");
        assert_eq!(render_output(&serde_json::json!(7)), "7");
    }

    /// Store whose bridge-connection reads always fail.
    struct FlakyStore {
        collection: Collection,
    }

    #[async_trait]
    impl CollectionStore for FlakyStore {
        async fn get_collection(&self, _id: &str) -> Result<Option<Collection>, StoreError> {
            Ok(Some(self.collection.clone()))
        }

        async fn get_bridge_connection(
            &self,
            _user_id: &str,
        ) -> Result<Option<BridgeConnection>, StoreError> {
            Err(StoreError::Backend("connection pool exhausted".to_string()))
        }

        async fn upsert_bridge_connection(
            &self,
            _conn: BridgeConnection,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn set_bridge_status(
            &self,
            _user_id: &str,
            _status: BridgeStatus,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn touch_bridge_heartbeat(
            &self,
            _user_id: &str,
            _at_ms: u64,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn record_tool_usage(
            &self,
            _collection_id: &str,
            _tool: &str,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn bridge_collection() -> Collection {
        let mut c = Collection::new("col-1", "alice");
        c.bridge_tools.push(BridgeToolRef {
            server_id: "srv1".to_string(),
            tool: "echo".to_string(),
            display_name: None,
        });
        c
    }

    fn flaky_handler() -> McpHandler {
        McpHandler::new(
            Arc::new(FlakyStore {
                collection: bridge_collection(),
            }),
            Arc::new(NullExecutor),
            Arc::new(BridgeRpc::new(Duration::from_secs(300))),
            GatewayConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_store_failure_on_bridge_call_is_internal_error() {
        let h = flaky_handler();
        let response = h
            .handle_request(
                "col-1",
                &CallerContext::new("bob"),
                request(
                    "tools/call",
                    Some(json!({"name": "bridge:srv1/echo", "arguments": {}})),
                ),
            )
            .await;
        assert!(response.result.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, -32603);
        assert!(error.message.contains("Store failure"));
    }

    #[tokio::test]
    async fn test_store_failure_on_tools_list_is_internal_error() {
        let h = flaky_handler();
        let response = h
            .handle_request("col-1", &CallerContext::new("bob"), request("tools/list", None))
            .await;
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -32603);
    }
}

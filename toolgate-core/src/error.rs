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

//! Gateway error taxonomy.
//!
//! Two families matter to callers. [`ResolveError`] covers names that
//! cannot be mapped to a tool and surfaces as a JSON-RPC error object.
//! [`ToolCallError`] covers failures of an otherwise well-addressed call
//! (missing credentials, bridge unavailable, execution failure) and is
//! surfaced as tool output flagged `isError` so the calling agent can read
//! and react to it.

use crate::collection::EnvVarSpec;
use thiserror::Error;

/// Collection invariant violations.
#[derive(Debug, Clone, Error)]
pub enum CollectionError {
    #[error("duplicate registry tool in collection: {package}::{tool}")]
    DuplicateRegistryTool { package: String, tool: String },

    #[error("duplicate bridge tool in collection: {server_id}/{tool}")]
    DuplicateBridgeTool { server_id: String, tool: String },
}

/// Tool-name resolution failures. These are request errors, not tool
/// failures: the dispatcher maps them to JSON-RPC invalid-params.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("invalid tool name: {0}")]
    InvalidToolName(String),

    #[error("tool not found in collection: {0}")]
    NotFoundInCollection(String),
}

impl ResolveError {
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::InvalidToolName(_) => "INVALID_TOOL_NAME",
            ResolveError::NotFoundInCollection(_) => "TOOL_NOT_FOUND_IN_COLLECTION",
        }
    }
}

/// Failure of a well-addressed tool call. Always surfaced to the calling
/// agent as `isError` content, never as a JSON-RPC error object.
#[derive(Debug, Clone, Error)]
pub enum ToolCallError {
    #[error("missing required environment variables")]
    MissingEnvVars { missing: Vec<EnvVarSpec> },

    #[error("bridge not connected")]
    BridgeNotConnected,

    #[error("bridge connection appears stale")]
    BridgeStale { last_heartbeat_ms: u64 },

    #[error("bridge call timed out after {waited_ms} ms")]
    Timeout { waited_ms: u64 },

    #[error("{message}")]
    ExecutionFailed { code: String, message: String },
}

impl ToolCallError {
    /// Stable machine-readable code for the calling agent.
    pub fn code(&self) -> &str {
        match self {
            ToolCallError::MissingEnvVars { .. } => "MISSING_ENV_VARS",
            ToolCallError::BridgeNotConnected => "BRIDGE_NOT_CONNECTED",
            ToolCallError::BridgeStale { .. } => "BRIDGE_STALE",
            ToolCallError::Timeout { .. } => "TIMEOUT",
            ToolCallError::ExecutionFailed { code, .. } => code,
        }
    }

    /// Full agent-facing description, including the missing-variable
    /// listing for credential failures.
    pub fn describe(&self) -> String {
        match self {
            ToolCallError::MissingEnvVars { missing } => {
                let vars: Vec<String> = missing
                    .iter()
                    .map(|v| match &v.description {
                        Some(d) => format!("{} ({})", v.name, d),
                        None => v.name.clone(),
                    })
                    .collect();
                format!(
                    "Missing required environment variables: {}",
                    vars.join(", ")
                )
            }
            ToolCallError::BridgeNotConnected => {
                "Bridge not connected: the owner's local bridge process is not registered"
                    .to_string()
            }
            ToolCallError::BridgeStale { last_heartbeat_ms } => format!(
                "Bridge connection appears stale: no heartbeat since {} (unix ms)",
                last_heartbeat_ms
            ),
            ToolCallError::Timeout { waited_ms } => {
                format!("Bridge call timed out after {} ms", waited_ms)
            }
            ToolCallError::ExecutionFailed { code, message } => {
                format!("Tool execution failed ({}): {}", code, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env_vars_description_lists_names() {
        let err = ToolCallError::MissingEnvVars {
            missing: vec![
                EnvVarSpec::required("GITHUB_TOKEN", "GitHub personal access token"),
                EnvVarSpec::required("GITHUB_ORG", "Organization slug"),
            ],
        };
        assert_eq!(err.code(), "MISSING_ENV_VARS");
        let text = err.describe();
        assert!(text.contains("GITHUB_TOKEN (GitHub personal access token)"));
        assert!(text.contains("GITHUB_ORG"));
    }

    #[test]
    fn test_resolve_error_codes() {
        assert_eq!(
            ResolveError::InvalidToolName("x".into()).code(),
            "INVALID_TOOL_NAME"
        );
        assert_eq!(
            ResolveError::NotFoundInCollection("x".into()).code(),
            "TOOL_NOT_FOUND_IN_COLLECTION"
        );
    }

    #[test]
    fn test_execution_failed_keeps_executor_code() {
        let err = ToolCallError::ExecutionFailed {
            code: "HTTP_502".to_string(),
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.code(), "HTTP_502");
        assert!(err.describe().contains("bad gateway"));
    }
}

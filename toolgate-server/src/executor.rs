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

//! Outbound invocation of the remote sandbox executor.
//!
//! Registry tools are executed by an external HTTP service addressed by
//! (package, tool, version). The gateway's only obligations here are an
//! explicit per-call timeout and a structured error it can surface to the
//! calling agent.

use crate::config::ExecutorConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Structured executor failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ExecutionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            code: "EXECUTION_FAILED".to_string(),
            message: message.into(),
            retryable: false,
            details: None,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            code: "EXECUTOR_TIMEOUT".to_string(),
            message: message.into(),
            retryable: true,
            details: None,
        }
    }
}

/// One registry-tool execution request.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteRequest {
    pub package: String,
    pub tool: String,
    pub version: String,
    pub arguments: Value,
    pub env: HashMap<String, String>,
    /// Effective timeout for this call (collection override or default)
    #[serde(skip)]
    pub timeout: Duration,
}

/// Seam for the sandbox executor; mocked in tests.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, request: ExecuteRequest) -> Result<Value, ExecutionError>;
}

/// HTTP client for the real executor service.
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: String,
    default_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    output: Value,
}

#[derive(Debug, Deserialize)]
struct ExecutorErrorBody {
    code: Option<String>,
    message: Option<String>,
}

impl HttpExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

#[async_trait]
impl ToolExecutor for HttpExecutor {
    async fn execute(&self, request: ExecuteRequest) -> Result<Value, ExecutionError> {
        let timeout = if request.timeout.is_zero() {
            self.default_timeout
        } else {
            request.timeout
        };
        let url = format!("{}/v1/execute", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExecutionError::timeout(format!(
                        "executor did not respond within {} ms",
                        timeout.as_millis()
                    ))
                } else {
                    ExecutionError {
                        code: "REQUEST_FAILED".to_string(),
                        message: e.to_string(),
                        retryable: e.is_connect(),
                        details: None,
                    }
                }
            })?;

        let status = response.status();
        if status.is_success() {
            let body: ExecuteResponse = response.json().await.map_err(|e| ExecutionError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                retryable: false,
                details: None,
            })?;
            Ok(body.output)
        } else {
            // Prefer the executor's structured error body when it sends one.
            let body: Option<ExecutorErrorBody> = response.json().await.ok();
            let (code, message) = match body {
                Some(b) => (
                    b.code.unwrap_or_else(|| format!("HTTP_{}", status.as_u16())),
                    b.message.unwrap_or_else(|| format!("HTTP error: {}", status)),
                ),
                None => (
                    format!("HTTP_{}", status.as_u16()),
                    format!("HTTP error: {}", status),
                ),
            };
            Err(ExecutionError {
                code,
                message,
                retryable: status.is_server_error(),
                details: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_without_timeout_field() {
        let request = ExecuteRequest {
            package: "@acme/github".to_string(),
            tool: "create_issue".to_string(),
            version: "1.2.0".to_string(),
            arguments: serde_json::json!({"title": "x"}),
            env: HashMap::from([("GITHUB_TOKEN".to_string(), "t".to_string())]),
            timeout: Duration::from_secs(30),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["package"], "@acme/github");
        assert!(value.get("timeout").is_none());
    }

    #[test]
    fn test_timeout_error_is_retryable() {
        let err = ExecutionError::timeout("slow");
        assert_eq!(err.code, "EXECUTOR_TIMEOUT");
        assert!(err.retryable);
    }
}

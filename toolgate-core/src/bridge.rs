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

//! Bridge connection and pending call/result records.
//!
//! A bridge connection is the server-side view of one user's local bridge
//! process: its liveness (status + heartbeat) and the catalog of tools it
//! currently advertises. Pending calls and results are the two ephemeral
//! keyspaces of the queue-and-poll RPC bridge.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Connection status of a user's local bridge process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeStatus {
    Connected,
    Disconnected,
}

/// Callable tool definition advertised by a bridge process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeToolDef {
    pub server_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// Server-side record of a user's local bridge process. One per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConnection {
    pub user_id: String,
    pub status: BridgeStatus,
    /// Last heartbeat, unix milliseconds
    pub last_heartbeat_ms: u64,
    /// Live catalog of tools the bridge process advertises
    #[serde(default)]
    pub tools: Vec<BridgeToolDef>,
}

impl BridgeConnection {
    pub fn is_connected(&self) -> bool {
        self.status == BridgeStatus::Connected
    }

    /// Staleness is derived, not stored: connected but no heartbeat within
    /// the window.
    pub fn is_stale(&self, staleness_window_ms: u64, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_heartbeat_ms) > staleness_window_ms
    }

    pub fn find_tool(&self, server_id: &str, name: &str) -> Option<&BridgeToolDef> {
        self.tools
            .iter()
            .find(|t| t.server_id == server_id && t.name == name)
    }
}

/// A queued, not-yet-delivered call to a user's bridge process.
/// Keyed by (user_id, call_id); consumed exactly once by the next poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingBridgeCall {
    pub call_id: String,
    pub user_id: String,
    pub server_id: String,
    pub tool: String,
    pub arguments: serde_json::Value,
    /// Enqueue time, unix milliseconds
    pub enqueued_at_ms: u64,
}

/// Structured error reported back by a bridge process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeErrorPayload {
    pub code: String,
    pub message: String,
}

/// Outcome of one bridge call, as submitted by the bridge process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BridgeErrorPayload>,
}

impl BridgeOutcome {
    pub fn ok(value: serde_json::Value) -> Self {
        Self {
            result: Some(value),
            error: None,
        }
    }

    pub fn err(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(BridgeErrorPayload {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// A delivered-but-unclaimed result. Keyed by call_id; consumed exactly
/// once by the waiter that matches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingBridgeResult {
    pub call_id: String,
    pub outcome: BridgeOutcome,
    /// Arrival time, unix milliseconds
    pub arrived_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(status: BridgeStatus, last_heartbeat_ms: u64) -> BridgeConnection {
        BridgeConnection {
            user_id: "user-1".to_string(),
            status,
            last_heartbeat_ms,
            tools: vec![],
        }
    }

    #[test]
    fn test_staleness_is_derived_from_heartbeat() {
        let now = now_millis();
        let fresh = connection(BridgeStatus::Connected, now - 1_000);
        assert!(!fresh.is_stale(120_000, now));

        let stale = connection(BridgeStatus::Connected, now - 180_000);
        assert!(stale.is_connected());
        assert!(stale.is_stale(120_000, now));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&BridgeStatus::Connected).unwrap();
        assert_eq!(json, "\"connected\"");
        let back: BridgeStatus = serde_json::from_str("\"disconnected\"").unwrap();
        assert_eq!(back, BridgeStatus::Disconnected);
    }
}

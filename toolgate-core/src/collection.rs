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

//! Tool Collections
//!
//! A collection is a curated, ordered set of callable tools exposed to MCP
//! clients. Registry tools point at (package, tool, version) triples run by
//! the remote sandbox executor; bridge tools point at a server inside the
//! owning user's local bridge process.

use crate::error::CollectionError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A curated set of tools exposed over MCP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    /// Unique collection identifier
    pub id: String,
    /// User that owns this collection
    pub owner_id: String,
    /// Registry tools, in display/listing order
    #[serde(default)]
    pub registry_tools: Vec<RegistryToolRef>,
    /// Bridge tools (pointers into the owner's bridge catalog)
    #[serde(default)]
    pub bridge_tools: Vec<BridgeToolRef>,
    /// Executor overrides for this collection
    #[serde(default)]
    pub executor: ExecutorSettings,
    /// Owner-stored environment variables injected into registry executions
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
}

impl Collection {
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            registry_tools: Vec::new(),
            bridge_tools: Vec::new(),
            executor: ExecutorSettings::default(),
            env_vars: HashMap::new(),
        }
    }

    /// Verify the per-collection uniqueness invariant: registry refs unique
    /// per (package, tool), bridge refs unique per (server_id, tool).
    pub fn validate(&self) -> Result<(), CollectionError> {
        let mut seen = HashSet::new();
        for r in &self.registry_tools {
            if !seen.insert((r.package.as_str(), r.tool.as_str())) {
                return Err(CollectionError::DuplicateRegistryTool {
                    package: r.package.clone(),
                    tool: r.tool.clone(),
                });
            }
        }
        let mut seen = HashSet::new();
        for b in &self.bridge_tools {
            if !seen.insert((b.server_id.as_str(), b.tool.as_str())) {
                return Err(CollectionError::DuplicateBridgeTool {
                    server_id: b.server_id.clone(),
                    tool: b.tool.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn has_bridge_tool(&self, server_id: &str, tool: &str) -> bool {
        self.bridge_tools
            .iter()
            .any(|b| b.server_id == server_id && b.tool == tool)
    }
}

/// Executor overrides stored on a collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorSettings {
    /// Per-call execution timeout override (seconds)
    pub timeout_secs: Option<u64>,
}

/// Reference to a registry tool resolvable by the sandbox executor.
///
/// `description`, `input_schema` and `required_env` are catalog data cached
/// from the registry so `tools/list` does not fan out to the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryToolRef {
    /// Full package name, e.g. `@acme/github-tools`
    pub package: String,
    /// Tool name within the package
    pub tool: String,
    /// Package version pinned for this collection
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's arguments
    pub input_schema: serde_json::Value,
    /// Environment variables the tool declares
    #[serde(default)]
    pub required_env: Vec<EnvVarSpec>,
}

impl RegistryToolRef {
    /// Shortened package name: text after the last `/`, or the whole name.
    pub fn short_package(&self) -> &str {
        self.package.rsplit('/').next().unwrap_or(&self.package)
    }

    /// Legacy flattened package name: `@scope/name` became `scope-name`.
    pub fn flattened_package(&self) -> String {
        self.package.trim_start_matches('@').replace('/', "-")
    }

    /// Name this tool is listed under in `tools/list` (current scheme).
    pub fn listed_name(&self) -> String {
        format!("{}__{}", self.short_package(), self.tool)
    }
}

/// Declared environment variable of a registry tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVarSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl EnvVarSpec {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, default: Option<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            required: false,
            default,
        }
    }

    /// A variable the caller must supply: required and without a default.
    pub fn must_be_supplied(&self) -> bool {
        self.required && self.default.is_none()
    }
}

/// Pointer to a tool living in the owning user's local bridge process.
///
/// The callable definition (description, input schema) lives in the owner's
/// [`crate::bridge::BridgeConnection`] catalog, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeToolRef {
    pub server_id: String,
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry_ref(package: &str, tool: &str) -> RegistryToolRef {
        RegistryToolRef {
            package: package.to_string(),
            tool: tool.to_string(),
            version: "1.0.0".to_string(),
            description: None,
            input_schema: json!({"type": "object"}),
            required_env: vec![],
        }
    }

    #[test]
    fn test_package_name_forms() {
        let r = registry_ref("@acme/github-tools", "create_issue");
        assert_eq!(r.short_package(), "github-tools");
        assert_eq!(r.flattened_package(), "acme-github-tools");
        assert_eq!(r.listed_name(), "github-tools__create_issue");

        let unscoped = registry_ref("weather", "forecast");
        assert_eq!(unscoped.short_package(), "weather");
        assert_eq!(unscoped.flattened_package(), "weather");
    }

    #[test]
    fn test_duplicate_registry_tool_rejected() {
        let mut c = Collection::new("col-1", "user-1");
        c.registry_tools.push(registry_ref("@acme/a", "t"));
        c.registry_tools.push(registry_ref("@acme/a", "t"));
        assert!(matches!(
            c.validate(),
            Err(CollectionError::DuplicateRegistryTool { .. })
        ));
    }

    #[test]
    fn test_distinct_tools_pass_validation() {
        let mut c = Collection::new("col-1", "user-1");
        c.registry_tools.push(registry_ref("@acme/a", "t"));
        c.registry_tools.push(registry_ref("@acme/b", "t"));
        c.bridge_tools.push(BridgeToolRef {
            server_id: "srv1".to_string(),
            tool: "echo".to_string(),
            display_name: None,
        });
        assert!(c.validate().is_ok());
    }
}

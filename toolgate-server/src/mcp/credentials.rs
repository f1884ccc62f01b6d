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

//! Per-caller credential resolution for registry executions.
//!
//! The collection owner gets the stored env map unconditionally. Any other
//! caller gets the variables they supplied on the request and nothing else:
//! the stored map is never merged in, so owner credentials cannot leak to
//! third-party callers. Non-owner calls fail before the executor is ever
//! contacted when a variable with no default is absent.

use std::collections::HashMap;
use toolgate_core::{Collection, RegistryToolRef, ToolCallError};

/// Resolve the environment map for one registry execution. An empty
/// caller id means the request carried no identity; it is never treated
/// as the owner, even against a malformed owner id.
pub fn resolve_env(
    tool: &RegistryToolRef,
    collection: &Collection,
    caller_id: &str,
    caller_env: &HashMap<String, String>,
) -> Result<HashMap<String, String>, ToolCallError> {
    let is_owner = !caller_id.is_empty() && caller_id == collection.owner_id;
    if is_owner {
        return Ok(collection.env_vars.clone());
    }

    let missing: Vec<_> = tool
        .required_env
        .iter()
        .filter(|spec| spec.must_be_supplied())
        .filter(|spec| {
            caller_env
                .get(&spec.name)
                .map(|v| v.is_empty())
                .unwrap_or(true)
        })
        .cloned()
        .collect();

    if !missing.is_empty() {
        return Err(ToolCallError::MissingEnvVars { missing });
    }

    Ok(caller_env.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolgate_core::EnvVarSpec;

    fn github_tool() -> RegistryToolRef {
        RegistryToolRef {
            package: "@acme/github".to_string(),
            tool: "create_issue".to_string(),
            version: "1.0.0".to_string(),
            description: None,
            input_schema: json!({"type": "object"}),
            required_env: vec![
                EnvVarSpec::required("GITHUB_TOKEN", "GitHub personal access token"),
                EnvVarSpec::optional("GITHUB_API_URL", Some("https://api.github.com".into())),
            ],
        }
    }

    fn collection_owned_by(owner: &str) -> Collection {
        let mut c = Collection::new("col-1", owner);
        c.env_vars
            .insert("GITHUB_TOKEN".to_string(), "owner-secret".to_string());
        c
    }

    #[test]
    fn test_owner_gets_stored_vars() {
        let collection = collection_owned_by("alice");
        let env = resolve_env(&github_tool(), &collection, "alice", &HashMap::new()).unwrap();
        assert_eq!(env.get("GITHUB_TOKEN").map(String::as_str), Some("owner-secret"));
    }

    #[test]
    fn test_non_owner_never_sees_stored_vars() {
        let collection = collection_owned_by("alice");
        let caller_env =
            HashMap::from([("GITHUB_TOKEN".to_string(), "caller-token".to_string())]);
        let env = resolve_env(&github_tool(), &collection, "bob", &caller_env).unwrap();
        assert_eq!(env.get("GITHUB_TOKEN").map(String::as_str), Some("caller-token"));
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn test_non_owner_missing_required_var_fails_fast() {
        let collection = collection_owned_by("alice");
        let err =
            resolve_env(&github_tool(), &collection, "bob", &HashMap::new()).unwrap_err();
        match err {
            ToolCallError::MissingEnvVars { missing } => {
                assert_eq!(missing.len(), 1);
                assert_eq!(missing[0].name, "GITHUB_TOKEN");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_string_counts_as_missing() {
        let collection = collection_owned_by("alice");
        let caller_env = HashMap::from([("GITHUB_TOKEN".to_string(), String::new())]);
        assert!(matches!(
            resolve_env(&github_tool(), &collection, "bob", &caller_env),
            Err(ToolCallError::MissingEnvVars { .. })
        ));
    }

    #[test]
    fn test_unidentified_caller_is_never_owner() {
        // Even a malformed empty owner id must not hand out stored vars.
        let mut collection = collection_owned_by("");
        collection
            .env_vars
            .insert("GITHUB_TOKEN".to_string(), "stored".to_string());

        let err = resolve_env(&github_tool(), &collection, "", &HashMap::new()).unwrap_err();
        assert!(matches!(err, ToolCallError::MissingEnvVars { .. }));
    }

    #[test]
    fn test_optional_with_default_is_not_demanded() {
        let collection = collection_owned_by("alice");
        let caller_env =
            HashMap::from([("GITHUB_TOKEN".to_string(), "caller-token".to_string())]);
        // GITHUB_API_URL absent: optional with a default, executor fills it.
        assert!(resolve_env(&github_tool(), &collection, "bob", &caller_env).is_ok());
    }
}

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

//! Tool-name parsing and catalog resolution.
//!
//! Two name families reach the gateway:
//!
//! - `bridge:<serverId>/<toolName>` — a tool inside the owner's local
//!   bridge process;
//! - `<packageEncoding>__<tool>` — a registry tool. The package encoding
//!   has drifted over time (full scoped name, flattened legacy form,
//!   current shortened form), and tool names may themselves contain `__`,
//!   so a single split is not decidable. Parsing therefore yields every
//!   candidate split, and each candidate's package text is matched against
//!   a ref under a fixed scheme priority. Old and new spellings of the
//!   same tool must land on the identical (package, tool, version) triple.

use toolgate_core::{Collection, RegistryToolRef, ResolveError};

/// One possible (package text, tool name) reading of a registry name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryCandidate<'n> {
    pub package_text: &'n str,
    pub tool: &'n str,
}

/// A parsed, not yet catalog-checked, tool name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedName<'n> {
    Bridge { server_id: &'n str, tool: &'n str },
    /// Candidate splits in left-to-right boundary order
    Registry(Vec<RegistryCandidate<'n>>),
}

/// A name resolved against a collection's attached tools.
#[derive(Debug)]
pub enum ResolvedTool<'c> {
    Registry(&'c RegistryToolRef),
    Bridge { server_id: String, tool: String },
}

const BRIDGE_PREFIX: &str = "bridge:";
const PACKAGE_SEPARATOR: &str = "__";

/// Parse a tool name into its possible readings. Shape-only: no catalog
/// lookup happens here.
pub fn parse(name: &str) -> Result<ParsedName<'_>, ResolveError> {
    if let Some(rest) = name.strip_prefix(BRIDGE_PREFIX) {
        let (server_id, tool) = rest
            .split_once('/')
            .ok_or_else(|| ResolveError::InvalidToolName(name.to_string()))?;
        if server_id.is_empty() || tool.is_empty() {
            return Err(ResolveError::InvalidToolName(name.to_string()));
        }
        return Ok(ParsedName::Bridge { server_id, tool });
    }

    let mut candidates = Vec::new();
    let mut search_from = 0;
    while let Some(offset) = name[search_from..].find(PACKAGE_SEPARATOR) {
        let boundary = search_from + offset;
        let package_text = &name[..boundary];
        let tool = &name[boundary + PACKAGE_SEPARATOR.len()..];
        if !package_text.is_empty() && !tool.is_empty() {
            candidates.push(RegistryCandidate { package_text, tool });
        }
        search_from = boundary + 1;
    }

    if candidates.is_empty() {
        return Err(ResolveError::InvalidToolName(name.to_string()));
    }
    Ok(ParsedName::Registry(candidates))
}

/// Package-matching schemes, in the priority order they are tried.
fn package_matches(candidate_text: &str, r: &RegistryToolRef) -> bool {
    candidate_text == r.package
        || candidate_text == r.flattened_package()
        || candidate_text == r.short_package()
}

/// Resolve a tool name against a collection. Evaluates every candidate
/// split against every attached registry ref; the first hit in candidate
/// order wins, so earlier (shorter-package) readings take precedence.
pub fn resolve<'c>(
    name: &str,
    collection: &'c Collection,
) -> Result<ResolvedTool<'c>, ResolveError> {
    match parse(name)? {
        ParsedName::Bridge { server_id, tool } => {
            if collection.has_bridge_tool(server_id, tool) {
                Ok(ResolvedTool::Bridge {
                    server_id: server_id.to_string(),
                    tool: tool.to_string(),
                })
            } else {
                Err(ResolveError::NotFoundInCollection(name.to_string()))
            }
        }
        ParsedName::Registry(candidates) => {
            for candidate in &candidates {
                for r in &collection.registry_tools {
                    if r.tool == candidate.tool && package_matches(candidate.package_text, r) {
                        return Ok(ResolvedTool::Registry(r));
                    }
                }
            }
            Err(ResolveError::NotFoundInCollection(name.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolgate_core::BridgeToolRef;

    fn collection_with(refs: Vec<RegistryToolRef>) -> Collection {
        let mut c = Collection::new("col-1", "user-1");
        c.registry_tools = refs;
        c
    }

    fn registry_ref(package: &str, tool: &str, version: &str) -> RegistryToolRef {
        RegistryToolRef {
            package: package.to_string(),
            tool: tool.to_string(),
            version: version.to_string(),
            description: None,
            input_schema: json!({"type": "object"}),
            required_env: vec![],
        }
    }

    #[test]
    fn test_bridge_name_parses() {
        match parse("bridge:srv1/echo").unwrap() {
            ParsedName::Bridge { server_id, tool } => {
                assert_eq!(server_id, "srv1");
                assert_eq!(tool, "echo");
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_names_rejected() {
        assert!(matches!(
            parse("bridge:no-slash"),
            Err(ResolveError::InvalidToolName(_))
        ));
        assert!(matches!(
            parse("bridge:/tool"),
            Err(ResolveError::InvalidToolName(_))
        ));
        assert!(matches!(
            parse("no_separator_here"),
            Err(ResolveError::InvalidToolName(_))
        ));
        assert!(matches!(
            parse("__leading"),
            Err(ResolveError::InvalidToolName(_))
        ));
    }

    #[test]
    fn test_every_boundary_becomes_a_candidate() {
        match parse("pkg__tool__variant").unwrap() {
            ParsedName::Registry(candidates) => {
                assert_eq!(
                    candidates,
                    vec![
                        RegistryCandidate {
                            package_text: "pkg",
                            tool: "tool__variant"
                        },
                        RegistryCandidate {
                            package_text: "pkg__tool",
                            tool: "variant"
                        },
                    ]
                );
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_legacy_and_current_names_resolve_to_same_triple() {
        let collection = collection_with(vec![registry_ref(
            "@acme/github-tools",
            "create_issue",
            "2.1.0",
        )]);

        // current short name, legacy flattened name, exact full name
        for name in [
            "github-tools__create_issue",
            "acme-github-tools__create_issue",
            "@acme/github-tools__create_issue",
        ] {
            match resolve(name, &collection).unwrap() {
                ResolvedTool::Registry(r) => {
                    assert_eq!(r.package, "@acme/github-tools");
                    assert_eq!(r.tool, "create_issue");
                    assert_eq!(r.version, "2.1.0");
                }
                other => panic!("unexpected resolution for {}: {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_tool_names_containing_separator_resolve() {
        let collection = collection_with(vec![registry_ref("@acme/db", "run__migration", "1.0.0")]);
        match resolve("db__run__migration", &collection).unwrap() {
            ResolvedTool::Registry(r) => assert_eq!(r.tool, "run__migration"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unattached_tool_is_not_found() {
        let collection = collection_with(vec![registry_ref("@acme/a", "t", "1.0.0")]);
        assert!(matches!(
            resolve("other__t", &collection),
            Err(ResolveError::NotFoundInCollection(_))
        ));
    }

    #[test]
    fn test_bridge_resolution_requires_attachment() {
        let mut collection = collection_with(vec![]);
        collection.bridge_tools.push(BridgeToolRef {
            server_id: "srv1".to_string(),
            tool: "echo".to_string(),
            display_name: None,
        });

        assert!(matches!(
            resolve("bridge:srv1/echo", &collection).unwrap(),
            ResolvedTool::Bridge { .. }
        ));
        assert!(matches!(
            resolve("bridge:srv2/echo", &collection),
            Err(ResolveError::NotFoundInCollection(_))
        ));
    }
}

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

//! Toolgate Core
//!
//! Domain model for the MCP tool-execution gateway: tool collections,
//! registry/bridge tool references, bridge-connection records, the pending
//! call/result records used by the polling bridge, and the stable error
//! taxonomy surfaced to calling agents.

pub mod bridge;
pub mod collection;
pub mod error;

pub use bridge::{
    now_millis, BridgeConnection, BridgeErrorPayload, BridgeOutcome, BridgeStatus, BridgeToolDef,
    PendingBridgeCall, PendingBridgeResult,
};
pub use collection::{BridgeToolRef, Collection, EnvVarSpec, ExecutorSettings, RegistryToolRef};
pub use error::{CollectionError, ResolveError, ToolCallError};

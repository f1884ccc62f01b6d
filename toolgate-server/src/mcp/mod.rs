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

//! Model Context Protocol surface of the gateway.
//!
//! `protocol` holds the JSON-RPC/MCP wire types, `name` the tool-name
//! resolver, `credentials` the per-caller env resolution, `handlers` the
//! dispatcher, and `server` the axum transport.

pub mod credentials;
pub mod handlers;
pub mod name;
pub mod protocol;
pub mod server;

pub use handlers::{CallerContext, McpHandler};

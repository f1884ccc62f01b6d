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

//! Bridge RPC bridge.
//!
//! The server cannot push to a user's local bridge process, so delivery is
//! pull-based: bridge calls are queued, the bridge process drains them on
//! its polling loop, and results are correlated back to the suspended
//! caller by call id. This module turns that asynchronous channel into a
//! synchronous request/response primitive with timeout.

pub mod rpc;

pub use rpc::BridgeRpc;

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

//! Data-access seam for collections and bridge connections.
//!
//! The gateway only reads and writes through [`CollectionStore`]; the
//! backing implementation (in-memory, SQL, KV) is deployment-specific.
//! [`MemoryStore`] is the single-process implementation used by tests and
//! standalone deployments.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use toolgate_core::{now_millis, BridgeConnection, BridgeStatus, Collection};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Read/write interface the gateway needs from the persistent store.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn get_collection(&self, id: &str) -> Result<Option<Collection>, StoreError>;

    async fn get_bridge_connection(
        &self,
        user_id: &str,
    ) -> Result<Option<BridgeConnection>, StoreError>;

    /// Create or replace a user's bridge-connection record.
    async fn upsert_bridge_connection(&self, conn: BridgeConnection) -> Result<(), StoreError>;

    async fn set_bridge_status(
        &self,
        user_id: &str,
        status: BridgeStatus,
    ) -> Result<(), StoreError>;

    async fn touch_bridge_heartbeat(&self, user_id: &str, at_ms: u64) -> Result<(), StoreError>;

    /// Best-effort usage counter; callers must not depend on the outcome.
    async fn record_tool_usage(&self, collection_id: &str, tool: &str) -> Result<(), StoreError>;
}

/// In-memory store for a single long-lived process.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, Collection>,
    connections: DashMap<String, BridgeConnection>,
    usage: DashMap<(String, String), u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_collection(&self, collection: Collection) {
        self.collections.insert(collection.id.clone(), collection);
    }

    pub fn usage_count(&self, collection_id: &str, tool: &str) -> u64 {
        self.usage
            .get(&(collection_id.to_string(), tool.to_string()))
            .map(|v| *v)
            .unwrap_or(0)
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn get_collection(&self, id: &str) -> Result<Option<Collection>, StoreError> {
        Ok(self.collections.get(id).map(|c| c.clone()))
    }

    async fn get_bridge_connection(
        &self,
        user_id: &str,
    ) -> Result<Option<BridgeConnection>, StoreError> {
        Ok(self.connections.get(user_id).map(|c| c.clone()))
    }

    async fn upsert_bridge_connection(&self, conn: BridgeConnection) -> Result<(), StoreError> {
        self.connections.insert(conn.user_id.clone(), conn);
        Ok(())
    }

    async fn set_bridge_status(
        &self,
        user_id: &str,
        status: BridgeStatus,
    ) -> Result<(), StoreError> {
        match self.connections.get_mut(user_id) {
            Some(mut conn) => {
                conn.status = status;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!(
                "bridge connection for user {}",
                user_id
            ))),
        }
    }

    async fn touch_bridge_heartbeat(&self, user_id: &str, at_ms: u64) -> Result<(), StoreError> {
        match self.connections.get_mut(user_id) {
            Some(mut conn) => {
                conn.last_heartbeat_ms = at_ms;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!(
                "bridge connection for user {}",
                user_id
            ))),
        }
    }

    async fn record_tool_usage(&self, collection_id: &str, tool: &str) -> Result<(), StoreError> {
        *self
            .usage
            .entry((collection_id.to_string(), tool.to_string()))
            .or_insert(0) += 1;
        Ok(())
    }
}

impl MemoryStore {
    /// Convenience used by the register endpoint: mark a user connected
    /// with a fresh heartbeat and the advertised catalog.
    pub fn seed_connection(&self, conn: BridgeConnection) {
        self.connections.insert(conn.user_id.clone(), conn);
    }

    /// Build a freshly-heartbeated connected record.
    pub fn connected_record(
        user_id: impl Into<String>,
        tools: Vec<toolgate_core::BridgeToolDef>,
    ) -> BridgeConnection {
        BridgeConnection {
            user_id: user_id.into(),
            status: BridgeStatus::Connected,
            last_heartbeat_ms: now_millis(),
            tools,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_heartbeat_updates_existing_connection() {
        let store = MemoryStore::new();
        store.seed_connection(MemoryStore::connected_record("user-1", vec![]));

        store.touch_bridge_heartbeat("user-1", 42).await.unwrap();
        let conn = store.get_bridge_connection("user-1").await.unwrap().unwrap();
        assert_eq!(conn.last_heartbeat_ms, 42);
    }

    #[tokio::test]
    async fn test_heartbeat_for_unknown_user_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.touch_bridge_heartbeat("ghost", 1).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_flips_status() {
        let store = MemoryStore::new();
        store.seed_connection(MemoryStore::connected_record("user-1", vec![]));

        store
            .set_bridge_status("user-1", BridgeStatus::Disconnected)
            .await
            .unwrap();
        let conn = store.get_bridge_connection("user-1").await.unwrap().unwrap();
        assert_eq!(conn.status, BridgeStatus::Disconnected);
    }
}

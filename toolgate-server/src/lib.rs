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

pub mod api;
pub mod bridge;
pub mod config;
pub mod executor;
pub mod mcp;
pub mod store;

use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::AppState;
use bridge::BridgeRpc;
use config::ServerConfig;
use executor::HttpExecutor;
use mcp::McpHandler;
use store::{CollectionStore, MemoryStore};

pub async fn run_server(config: ServerConfig) -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolgate_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Toolgate Server");
    tracing::info!("Configuration: {:#?}", config);

    config.validate()?;
    let addr = config.socket_addr()?;

    let store: Arc<dyn CollectionStore> = Arc::new(MemoryStore::new());
    let bridge = Arc::new(BridgeRpc::new(config.gateway.pending_ttl()));
    let executor = Arc::new(HttpExecutor::new(&config.executor));
    let handler = Arc::new(McpHandler::new(
        Arc::clone(&store),
        executor,
        Arc::clone(&bridge),
        config.gateway.clone(),
    ));

    // Background expiry of abandoned pending calls/results
    Arc::clone(&bridge).spawn_sweeper(config.gateway.sweep_interval());

    let state = AppState {
        store,
        bridge,
        handler,
    };

    let app = Router::new()
        .merge(mcp::server::router(state.clone()))
        .merge(api::bridge::router(state))
        .layer(if config.server.enable_cors {
            let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
            if config.server.cors_origins.is_empty() {
                tracing::warn!(
                    "CORS: Allowing all origins (development mode). Set cors_origins in production!"
                );
            } else {
                tracing::info!("CORS: Allowing origins: {:?}", config.server.cors_origins);
            }
            cors.allow_origin(Any)
        } else {
            CorsLayer::new()
        })
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Toolgate listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

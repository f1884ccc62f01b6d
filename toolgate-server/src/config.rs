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

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Toolgate Server Configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub server: HttpServerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP listen address (e.g., "127.0.0.1:47180")
    #[serde(default = "default_http_addr")]
    pub listen_addr: String,

    /// Enable CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    /// Allowed CORS origins (empty = allow all, use specific origins in production)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Timing knobs of the bridge RPC bridge and the pending-entry sweep.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Heartbeat age beyond which a connected bridge is treated as stale
    #[serde(default = "default_bridge_staleness")]
    pub bridge_staleness_secs: u64,

    /// How long a `tools/call` waits for a bridge result
    #[serde(default = "default_bridge_call_timeout")]
    pub bridge_call_timeout_secs: u64,

    /// TTL for unclaimed pending calls and results
    #[serde(default = "default_pending_ttl")]
    pub pending_ttl_secs: u64,

    /// Period of the background sweep over the pending keyspaces
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bridge_staleness_secs: default_bridge_staleness(),
            bridge_call_timeout_secs: default_bridge_call_timeout(),
            pending_ttl_secs: default_pending_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl GatewayConfig {
    pub fn staleness_window(&self) -> Duration {
        Duration::from_secs(self.bridge_staleness_secs)
    }

    pub fn bridge_call_timeout(&self) -> Duration {
        Duration::from_secs(self.bridge_call_timeout_secs)
    }

    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Outbound sandbox-executor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutorConfig {
    /// Base URL of the sandbox executor service
    #[serde(default = "default_executor_url")]
    pub base_url: String,

    /// Default per-call timeout in seconds (collections may override)
    #[serde(default = "default_executor_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: default_executor_url(),
            request_timeout_secs: default_executor_timeout(),
        }
    }
}

// Default values
fn default_http_addr() -> String {
    "127.0.0.1:47180".to_string()
}

fn default_enable_cors() -> bool {
    true
}

fn default_bridge_staleness() -> u64 {
    120
}

fn default_bridge_call_timeout() -> u64 {
    300
}

fn default_pending_ttl() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_executor_url() -> String {
    "http://127.0.0.1:47190".to_string()
}

fn default_executor_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: HttpServerConfig {
                listen_addr: default_http_addr(),
                enable_cors: default_enable_cors(),
                cors_origins: vec![],
            },
            gateway: GatewayConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - TOOLGATE_HTTP_ADDR: HTTP listen address (default: 127.0.0.1:47180)
    /// - TOOLGATE_ENABLE_CORS: Enable CORS (default: true)
    /// - TOOLGATE_EXECUTOR_URL: Sandbox executor base URL
    /// - TOOLGATE_EXECUTOR_TIMEOUT: Executor request timeout in seconds
    /// - TOOLGATE_BRIDGE_STALENESS: Bridge staleness window in seconds
    /// - TOOLGATE_BRIDGE_CALL_TIMEOUT: Bridge call timeout in seconds
    /// - TOOLGATE_PENDING_TTL: Pending-entry TTL in seconds
    /// - TOOLGATE_SWEEP_INTERVAL: Sweep period in seconds
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("TOOLGATE_HTTP_ADDR") {
            config.server.listen_addr = addr;
        }

        if let Ok(cors) = std::env::var("TOOLGATE_ENABLE_CORS") {
            config.server.enable_cors = cors.parse().unwrap_or(true);
        }

        if let Ok(url) = std::env::var("TOOLGATE_EXECUTOR_URL") {
            config.executor.base_url = url;
        }

        if let Ok(timeout) = std::env::var("TOOLGATE_EXECUTOR_TIMEOUT") {
            if let Ok(val) = timeout.parse() {
                config.executor.request_timeout_secs = val;
            }
        }

        if let Ok(staleness) = std::env::var("TOOLGATE_BRIDGE_STALENESS") {
            if let Ok(val) = staleness.parse() {
                config.gateway.bridge_staleness_secs = val;
            }
        }

        if let Ok(timeout) = std::env::var("TOOLGATE_BRIDGE_CALL_TIMEOUT") {
            if let Ok(val) = timeout.parse() {
                config.gateway.bridge_call_timeout_secs = val;
            }
        }

        if let Ok(ttl) = std::env::var("TOOLGATE_PENDING_TTL") {
            if let Ok(val) = ttl.parse() {
                config.gateway.pending_ttl_secs = val;
            }
        }

        if let Ok(interval) = std::env::var("TOOLGATE_SWEEP_INTERVAL") {
            if let Ok(val) = interval.parse() {
                config.gateway.sweep_interval_secs = val;
            }
        }

        config
    }

    /// Load configuration with priority: file > env > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        // Override with environment variables
        config = Self::merge_with_env(config);

        Ok(config)
    }

    /// Merge config with environment variables (env takes priority)
    fn merge_with_env(mut config: Self) -> Self {
        let env_config = Self::from_env();

        // Only override if env var was explicitly set
        if std::env::var("TOOLGATE_HTTP_ADDR").is_ok() {
            config.server.listen_addr = env_config.server.listen_addr;
        }
        if std::env::var("TOOLGATE_ENABLE_CORS").is_ok() {
            config.server.enable_cors = env_config.server.enable_cors;
        }
        if std::env::var("TOOLGATE_EXECUTOR_URL").is_ok() {
            config.executor.base_url = env_config.executor.base_url;
        }
        if std::env::var("TOOLGATE_EXECUTOR_TIMEOUT").is_ok() {
            config.executor.request_timeout_secs = env_config.executor.request_timeout_secs;
        }
        if std::env::var("TOOLGATE_BRIDGE_STALENESS").is_ok() {
            config.gateway.bridge_staleness_secs = env_config.gateway.bridge_staleness_secs;
        }
        if std::env::var("TOOLGATE_BRIDGE_CALL_TIMEOUT").is_ok() {
            config.gateway.bridge_call_timeout_secs = env_config.gateway.bridge_call_timeout_secs;
        }
        if std::env::var("TOOLGATE_PENDING_TTL").is_ok() {
            config.gateway.pending_ttl_secs = env_config.gateway.pending_ttl_secs;
        }
        if std::env::var("TOOLGATE_SWEEP_INTERVAL").is_ok() {
            config.gateway.sweep_interval_secs = env_config.gateway.sweep_interval_secs;
        }

        config
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.listen_addr.parse()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.gateway.sweep_interval_secs == 0 {
            anyhow::bail!("sweep_interval_secs must be non-zero");
        }
        if self.gateway.pending_ttl_secs == 0 {
            anyhow::bail!("pending_ttl_secs must be non-zero");
        }
        if self.executor.base_url.is_empty() {
            anyhow::bail!("executor base_url must be configured");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1:47180");
        assert_eq!(config.gateway.bridge_staleness_secs, 120);
        assert_eq!(config.gateway.bridge_call_timeout_secs, 300);
        assert_eq!(config.gateway.pending_ttl_secs, 300);
        assert_eq!(config.gateway.sweep_interval_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("TOOLGATE_HTTP_ADDR", "0.0.0.0:8080");
        std::env::set_var("TOOLGATE_BRIDGE_CALL_TIMEOUT", "15");

        let config = ServerConfig::from_env();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.gateway.bridge_call_timeout_secs, 15);

        std::env::remove_var("TOOLGATE_HTTP_ADDR");
        std::env::remove_var("TOOLGATE_BRIDGE_CALL_TIMEOUT");
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let mut config = ServerConfig::default();
        config.gateway.sweep_interval_secs = 0;
        assert!(config.validate().is_err());
    }
}

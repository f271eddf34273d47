// Copyright 2025 Gatescope (https://github.com/gatescope)
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

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use gatescope_core::RetryPolicy;
use gatescope_stream::{BackendOptions, SessionOptions};

/// Gatescope Console Configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub inspector: InspectorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP API listen address (e.g., "127.0.0.1:47200")
    #[serde(default = "default_http_addr")]
    pub listen_addr: String,

    /// Enable CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Gateway base URL the console attaches to
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Path of the gateway's live event stream
    #[serde(default = "default_stream_path")]
    pub stream_path: String,

    /// Path of the gateway's one-shot entries snapshot
    #[serde(default = "default_entries_path")]
    pub entries_path: String,

    /// API key sent as X-API-Key when callers provide no credential
    pub api_key: Option<String>,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Snapshot request timeout in seconds (the stream request is exempt)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InspectorConfig {
    /// Maximum number of traces kept in the ring buffer
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Entry-id dedup window carried across reconnects
    #[serde(default = "default_dedup_window")]
    pub dedup_window: usize,

    /// Treat snapshot entries as summaries with intentionally empty bodies
    #[serde(default)]
    pub summary_snapshots: bool,

    /// First reconnect delay in seconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_secs: u64,

    /// Reconnect delay ceiling in seconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Fan-out channel capacity for live viewers
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

// Default values
fn default_http_addr() -> String {
    "127.0.0.1:47200".to_string()
}

fn default_enable_cors() -> bool {
    true
}

fn default_backend_url() -> String {
    "http://127.0.0.1:4444".to_string()
}

fn default_stream_path() -> String {
    "/api/logs".to_string()
}

fn default_entries_path() -> String {
    "/debug/entries".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_capacity() -> usize {
    1000
}

fn default_dedup_window() -> usize {
    4096
}

fn default_initial_backoff() -> u64 {
    1
}

fn default_max_backoff() -> u64 {
    30
}

fn default_broadcast_capacity() -> usize {
    1024
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_http_addr(),
            enable_cors: default_enable_cors(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            stream_path: default_stream_path(),
            entries_path: default_entries_path(),
            api_key: None,
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            dedup_window: default_dedup_window(),
            summary_snapshots: false,
            initial_backoff_secs: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            server: HttpServerConfig::default(),
            backend: BackendConfig::default(),
            inspector: InspectorConfig::default(),
        }
    }
}

impl ConsoleConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - GATESCOPE_HTTP_ADDR: HTTP listen address (default: 127.0.0.1:47200)
    /// - GATESCOPE_ENABLE_CORS: Enable CORS (default: true)
    /// - GATESCOPE_BACKEND_URL: Gateway base URL (default: http://127.0.0.1:4444)
    /// - GATESCOPE_BACKEND_API_KEY: API key for gateway requests
    /// - GATESCOPE_CAPACITY: Trace ring buffer capacity (default: 1000)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("GATESCOPE_HTTP_ADDR") {
            config.server.listen_addr = addr;
        }

        if let Ok(cors) = std::env::var("GATESCOPE_ENABLE_CORS") {
            config.server.enable_cors = cors.parse().unwrap_or(true);
        }

        if let Ok(url) = std::env::var("GATESCOPE_BACKEND_URL") {
            config.backend.base_url = url;
        }

        if let Ok(key) = std::env::var("GATESCOPE_BACKEND_API_KEY") {
            config.backend.api_key = Some(key);
        }

        if let Ok(capacity) = std::env::var("GATESCOPE_CAPACITY") {
            if let Ok(val) = capacity.parse() {
                config.inspector.capacity = val;
            }
        }

        config
    }

    /// Load configuration with priority: file > env > defaults
    pub fn load(config_file: Option<std::path::PathBuf>) -> Result<Self> {
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
        if std::env::var("GATESCOPE_HTTP_ADDR").is_ok() {
            config.server.listen_addr = env_config.server.listen_addr;
        }
        if std::env::var("GATESCOPE_ENABLE_CORS").is_ok() {
            config.server.enable_cors = env_config.server.enable_cors;
        }
        if std::env::var("GATESCOPE_BACKEND_URL").is_ok() {
            config.backend.base_url = env_config.backend.base_url;
        }
        if std::env::var("GATESCOPE_BACKEND_API_KEY").is_ok() {
            config.backend.api_key = env_config.backend.api_key;
        }
        if std::env::var("GATESCOPE_CAPACITY").is_ok() {
            config.inspector.capacity = env_config.inspector.capacity;
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

        if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            anyhow::bail!(
                "backend.base_url must be an absolute http(s) URL, got '{}'",
                self.backend.base_url
            );
        }

        if self.inspector.capacity == 0 {
            anyhow::bail!("inspector.capacity must be at least 1");
        }

        Ok(())
    }

    /// Gateway connection settings for the stream layer
    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            base_url: self.backend.base_url.clone(),
            stream_path: self.backend.stream_path.clone(),
            entries_path: self.backend.entries_path.clone(),
            api_key: self.backend.api_key.clone(),
            connect_timeout: Duration::from_secs(self.backend.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.backend.request_timeout_secs),
        }
    }

    /// Session tunables for the stream layer
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            capacity: self.inspector.capacity,
            dedup_window: self.inspector.dedup_window,
            retry: RetryPolicy {
                initial_delay: Duration::from_secs(self.inspector.initial_backoff_secs),
                max_delay: Duration::from_secs(self.inspector.max_backoff_secs),
                ..RetryPolicy::default()
            },
            summary_snapshots: self.inspector.summary_snapshots,
            broadcast_capacity: self.inspector.broadcast_capacity,
        }
    }
}

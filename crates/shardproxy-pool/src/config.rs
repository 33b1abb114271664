//! Backend pool configuration.
//!
//! ```toml
//! addr = "10.0.0.5:3306"
//! user = "proxy"
//! password = "secret"
//! db = "orders"
//! max_connections = 64
//!
//! [health]
//! interval_ms = 3000
//! down_after = 3
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::session::{DEFAULT_CHARSET, Target};

#[derive(Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub addr: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub db: String,
    /// Zero selects the built-in default capacity.
    #[serde(default)]
    pub max_connections: usize,
    /// Charset reused sessions are reset to.
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default)]
    pub health: HealthCheckConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Consecutive failed probes before the backend is marked down.
    #[serde(default = "default_down_after")]
    pub down_after: u32,
}

fn default_charset() -> String {
    DEFAULT_CHARSET.to_string()
}

fn default_interval_ms() -> u64 {
    3000
}

fn default_down_after() -> u32 {
    3
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            down_after: default_down_after(),
        }
    }
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl PoolConfig {
    pub fn new(addr: &str, user: &str, password: &str, db: &str) -> Self {
        Self {
            addr: addr.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            db: db.to_string(),
            max_connections: 0,
            charset: default_charset(),
            health: HealthCheckConfig::default(),
        }
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_charset(mut self, charset: &str) -> Self {
        self.charset = charset.to_string();
        self
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: PoolConfig = toml::from_str(content)?;
        if config.addr.is_empty() {
            anyhow::bail!("pool config: addr must not be empty");
        }
        Ok(config)
    }

    pub fn target(&self) -> Target {
        Target::new(&self.addr, &self.user, &self.password, &self.db)
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("addr", &self.addr)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("db", &self.db)
            .field("max_connections", &self.max_connections)
            .field("charset", &self.charset)
            .field("health", &self.health)
            .finish()
    }
}

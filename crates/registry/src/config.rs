//! Registry configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use wgsync_common::{Error, Result};

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// gRPC listen port
    pub port: u16,

    /// Address to bind
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Registry store
    pub db: DbConfig,
}

/// Store connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// SQLite database file
    pub path: PathBuf,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            port: wgsync_common::DEFAULT_REGISTRY_PORT,
            bind: default_bind(),
            db: DbConfig {
                path: PathBuf::from("/var/lib/wgsync/registry.db"),
            },
        }
    }
}

impl RegistryConfig {
    /// Load configuration from file. A missing file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::InvalidConfig("port must be non-zero".to_string()));
        }
        if self.db.path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("db.path must be set".to_string()));
        }
        self.listen_addr()?;
        Ok(())
    }

    /// Socket address the gRPC server binds
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|e| Error::InvalidConfig(format!("invalid bind address {}: {}", self.bind, e)))
    }
}

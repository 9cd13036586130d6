//! Local state reader
//!
//! Reports what is actually applied on this node: the text of the tunnel
//! configuration file and whether the tunnel service is running.

use crate::tunnel::TunnelControl;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of reading the applied configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedConfig {
    Present(String),
    Missing,
    Unreadable(String),
}

impl AppliedConfig {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Present(text) => Some(text),
            _ => None,
        }
    }
}

/// Snapshot of what is applied on the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAppliedState {
    pub config: AppliedConfig,
    pub service_active: bool,
}

/// Reads the configuration file and queries the tunnel service
#[derive(Clone)]
pub struct LocalStateReader {
    config_path: PathBuf,
    service: String,
    tunnel: Arc<dyn TunnelControl>,
}

impl LocalStateReader {
    pub fn new(config_path: PathBuf, service: String, tunnel: Arc<dyn TunnelControl>) -> Self {
        Self {
            config_path,
            service,
            tunnel,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Current contents of the configuration file
    pub async fn applied_config(&self) -> AppliedConfig {
        match tokio::fs::read_to_string(&self.config_path).await {
            Ok(text) => AppliedConfig::Present(text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No configuration at {:?}", self.config_path);
                AppliedConfig::Missing
            }
            Err(e) => {
                warn!("Cannot read {:?}: {}", self.config_path, e);
                AppliedConfig::Unreadable(e.to_string())
            }
        }
    }

    /// Whether the tunnel service is running
    pub async fn is_service_active(&self) -> bool {
        self.tunnel.is_active(&self.service).await
    }

    pub async fn snapshot(&self) -> LocalAppliedState {
        LocalAppliedState {
            config: self.applied_config().await,
            service_active: self.is_service_active().await,
        }
    }
}

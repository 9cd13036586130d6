//! Reconciliation engine
//!
//! Compares the desired topology with what is applied on the node and takes
//! the smallest action that converges them. Convergence is judged on the
//! canonical rendering: the file on disk either matches it byte for byte or
//! it gets rewritten, which also catches edits made outside the agent.

use crate::config::AgentConfig;
use crate::local_state::{AppliedConfig, LocalAppliedState, LocalStateReader};
use crate::tunnel::TunnelControl;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use wgsync_common::{render_config, DesiredNetworkConfig, Error, Result};

/// Why a full resync was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncReason {
    ServiceInactive,
    ConfigMissing,
    ConfigUnreadable,
    ConfigDrift,
}

/// Action chosen for one reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Registry does not know this node: stop everything
    Teardown,
    /// Rewrite the configuration and restart the service
    FullResync(ResyncReason),
    /// Already converged
    Noop,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Teardown => write!(f, "teardown"),
            Self::FullResync(reason) => write!(f, "full resync ({:?})", reason),
            Self::Noop => write!(f, "noop"),
        }
    }
}

/// Pick the action for `desired` given what is applied
pub fn decide(desired: &DesiredNetworkConfig, applied: &LocalAppliedState) -> Decision {
    if desired.is_empty() {
        return Decision::Teardown;
    }
    if !applied.service_active {
        return Decision::FullResync(ResyncReason::ServiceInactive);
    }
    match &applied.config {
        AppliedConfig::Missing => Decision::FullResync(ResyncReason::ConfigMissing),
        AppliedConfig::Unreadable(_) => Decision::FullResync(ResyncReason::ConfigUnreadable),
        AppliedConfig::Present(text) if *text != render_config(desired) => {
            Decision::FullResync(ResyncReason::ConfigDrift)
        }
        AppliedConfig::Present(_) => Decision::Noop,
    }
}

/// Applies decisions to the configuration file and tunnel service
///
/// At most one reconciliation runs at a time, whether it comes from the
/// scheduled tick or an out-of-band trigger.
pub struct Reconciler {
    local: LocalStateReader,
    tunnel: Arc<dyn TunnelControl>,
    tunnel_name: String,
    service: String,
    config_path: PathBuf,
    guard: Mutex<()>,
}

impl Reconciler {
    pub fn new(config: &AgentConfig, tunnel: Arc<dyn TunnelControl>) -> Self {
        let config_path = config.config_path();
        let service = config.service_name();
        Self {
            local: LocalStateReader::new(config_path.clone(), service.clone(), tunnel.clone()),
            tunnel,
            tunnel_name: config.tunnel.clone(),
            service,
            config_path,
            guard: Mutex::new(()),
        }
    }

    pub fn local_state(&self) -> &LocalStateReader {
        &self.local
    }

    /// Converge the node with `desired`
    pub async fn reconcile(&self, desired: &DesiredNetworkConfig) -> Result<Decision> {
        let _guard = self.guard.lock().await;

        let applied = self.local.snapshot().await;
        let decision = decide(desired, &applied);
        debug!("Reconcile decision: {}", decision);

        match decision {
            Decision::Teardown => self.teardown(&applied).await?,
            Decision::FullResync(reason) => self.resync(desired, reason).await?,
            Decision::Noop => {}
        }

        Ok(decision)
    }

    /// Stop the tunnel on process exit. Best effort.
    pub async fn shutdown(&self) {
        let _guard = self.guard.lock().await;

        info!("Stopping {}", self.service);
        if let Err(e) = self.tunnel.stop(&self.service).await {
            warn!("Failed to stop {}: {}", self.service, e);
        }
        self.tunnel.delete_interface(&self.tunnel_name).await;
    }

    async fn teardown(&self, applied: &LocalAppliedState) -> Result<()> {
        if applied.config.text() != Some("") {
            info!("Node is not registered, clearing {:?}", self.config_path);
            self.write_config("").await?;
        }

        if applied.service_active {
            info!("Tearing down {}", self.tunnel_name);
            self.tunnel.delete_interface(&self.tunnel_name).await;
            self.tunnel.stop(&self.service).await?;
        }

        Ok(())
    }

    async fn resync(&self, desired: &DesiredNetworkConfig, reason: ResyncReason) -> Result<()> {
        info!(
            "Resyncing {} ({:?}, {} peers)",
            self.tunnel_name,
            reason,
            desired.peers.len()
        );

        self.write_config(&render_config(desired)).await?;

        if let Err(first) = self.tunnel.restart(&self.service).await {
            // A stale interface left behind by a crashed wg-quick blocks the restart
            warn!(
                "Restart of {} failed ({}), removing {} and retrying",
                self.service, first, self.tunnel_name
            );
            self.tunnel.delete_interface(&self.tunnel_name).await;
            self.tunnel
                .restart(&self.service)
                .await
                .map_err(|e| Error::RestartFailed {
                    service: self.service.clone(),
                    reason: e.to_string(),
                })?;
        }

        info!("{} is up", self.service);
        Ok(())
    }

    async fn write_config(&self, text: &str) -> Result<()> {
        if let Some(dir) = self.config_path.parent() {
            let mut builder = tokio::fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            builder.mode(0o755);
            builder.create(dir).await?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // The file carries the interface private key
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&self.config_path).await?;
        // `mode` only applies on creation; tighten files left behind by other tools
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
        }
        tokio::io::AsyncWriteExt::write_all(&mut file, text.as_bytes()).await?;
        tokio::io::AsyncWriteExt::flush(&mut file).await?;
        Ok(())
    }
}

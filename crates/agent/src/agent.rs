//! Polling loop
//!
//! One heartbeat per interval, each followed by a reconciliation. A failed
//! heartbeat leaves the node untouched: only an explicit empty topology
//! from the registry tears the tunnel down.

use crate::config::AgentConfig;
use crate::heartbeat::{exclude_self, RegistryClient};
use crate::probe;
use crate::reconciler::{Decision, Reconciler};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use wgsync_common::{HeartbeatRequest, Result};

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Applied(Decision),
    /// Heartbeat failed; nothing was changed
    Skipped,
}

/// Node agent
pub struct Agent {
    config: AgentConfig,
    client: RegistryClient,
    reconciler: Arc<Reconciler>,
}

impl Agent {
    pub fn new(config: AgentConfig, client: RegistryClient, reconciler: Arc<Reconciler>) -> Self {
        Self {
            config,
            client,
            reconciler,
        }
    }

    /// Probe the node, send a heartbeat and reconcile
    pub async fn tick(&self) -> Result<TickOutcome> {
        let request = match probe::announce(&self.config).await {
            Ok(request) => request,
            Err(e) => {
                warn!("Cannot build heartbeat: {}", e);
                return Ok(TickOutcome::Skipped);
            }
        };
        self.tick_with(request).await
    }

    /// Send `request` and reconcile against the answer
    pub async fn tick_with(&self, request: HeartbeatRequest) -> Result<TickOutcome> {
        let own_host = own_host(&request.endpoint);

        let desired = match self.client.heartbeat(request).await {
            Ok(desired) => desired,
            Err(e) => {
                warn!("Heartbeat to {} failed: {}", self.config.server_addr, e);
                return Ok(TickOutcome::Skipped);
            }
        };

        let desired = exclude_self(desired, &own_host);
        let decision = self.reconciler.reconcile(&desired).await?;
        Ok(TickOutcome::Applied(decision))
    }

    /// Run until SIGINT or SIGTERM, then tear the tunnel down
    ///
    /// SIGHUP triggers an immediate extra tick.
    pub async fn run(self) -> Result<()> {
        info!(
            "Syncing {} from {} every {:?}",
            self.config.tunnel, self.config.server_addr, self.config.heartbeat_interval
        );

        let mut ticker = tokio::time::interval(self.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut hangup = signal(SignalKind::hangup())?;
        let mut terminate = signal(SignalKind::terminate())?;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.run_tick().await,
                _ = hangup.recv() => {
                    info!("Received SIGHUP, resyncing now");
                    self.run_tick().await;
                }
                _ = terminate.recv() => {
                    info!("Received SIGTERM");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.reconciler.shutdown().await;
        info!("Agent shutdown complete");
        Ok(())
    }

    async fn run_tick(&self) {
        match self.tick().await {
            Ok(TickOutcome::Applied(Decision::Noop)) => debug!("Tunnel is in sync"),
            Ok(TickOutcome::Applied(decision)) => info!("Applied {}", decision),
            Ok(TickOutcome::Skipped) => {}
            Err(e) => error!("Reconciliation failed: {}", e),
        }
    }
}

fn own_host(endpoint: &str) -> String {
    endpoint
        .parse::<SocketAddr>()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| endpoint.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tunnel::{InMemoryTunnel, TunnelCall};

    #[test]
    fn test_own_host() {
        assert_eq!(own_host("10.1.2.3:9619"), "10.1.2.3");
        assert_eq!(own_host("[fd00::1]:9619"), "fd00::1");
    }

    #[tokio::test]
    async fn test_unreachable_registry_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig {
            server_addr: "127.0.0.1:1".to_string(),
            config_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let tunnel = Arc::new(InMemoryTunnel::active());
        let reconciler = Arc::new(Reconciler::new(&config, tunnel.clone()));
        let agent = Agent::new(
            config.clone(),
            RegistryClient::connect_lazy(&config).unwrap(),
            reconciler,
        );

        let outcome = agent
            .tick_with(HeartbeatRequest {
                endpoint: "127.0.0.1:9619".to_string(),
                hardware_address: None,
                hostname: "node".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(outcome, TickOutcome::Skipped);
        assert_eq!(tunnel.calls(), Vec::<TunnelCall>::new());
        assert!(!config.config_path().exists());
    }
}

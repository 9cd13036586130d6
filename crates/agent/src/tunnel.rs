//! Tunnel control
//!
//! The OS-level tunnel service and interface are driven through
//! [`TunnelControl`] so the reconciler never shells out directly.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::process::Command;
use tracing::{debug, info, warn};
use wgsync_common::{Error, Result};

/// Marker `systemctl status` prints for a running unit
const ACTIVE_MARKER: &str = "Active: active";

/// Start, stop and inspect the tunnel service
#[async_trait]
pub trait TunnelControl: Send + Sync {
    /// Start the service, restarting it if it already runs
    async fn restart(&self, service: &str) -> Result<()>;

    /// Stop the service
    async fn stop(&self, service: &str) -> Result<()>;

    /// Whether the service is currently running
    async fn is_active(&self, service: &str) -> bool;

    /// Remove the tunnel interface. Best effort, failures are ignored.
    async fn delete_interface(&self, name: &str);
}

// ============================================================================
// systemd + iproute2
// ============================================================================

/// Tunnel control through `systemctl` and `ip`
#[derive(Debug, Clone, Default)]
pub struct SystemdTunnel;

impl SystemdTunnel {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<std::process::Output> {
        debug!("Running: {} {}", program, args.join(" "));
        Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::Tunnel(format!("{} failed to start: {}", program, e)))
    }

    async fn systemctl(&self, verb: &str, service: &str) -> Result<()> {
        let output = self.run("systemctl", &[verb, service]).await?;
        if !output.status.success() {
            return Err(Error::Tunnel(format!(
                "systemctl {} {} failed: {}",
                verb,
                service,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TunnelControl for SystemdTunnel {
    async fn restart(&self, service: &str) -> Result<()> {
        self.systemctl("restart", service).await
    }

    async fn stop(&self, service: &str) -> Result<()> {
        self.systemctl("stop", service).await
    }

    async fn is_active(&self, service: &str) -> bool {
        // `systemctl status` exits non-zero for inactive units
        match self.run("systemctl", &["status", service]).await {
            Ok(output) => String::from_utf8_lossy(&output.stdout).contains(ACTIVE_MARKER),
            Err(e) => {
                warn!("Cannot query {}: {}", service, e);
                false
            }
        }
    }

    async fn delete_interface(&self, name: &str) {
        match self.run("ip", &["link", "delete", "dev", name]).await {
            Ok(output) if output.status.success() => debug!("Deleted interface {}", name),
            Ok(output) => debug!(
                "ip link delete {}: {}",
                name,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => debug!("ip link delete {}: {}", name, e),
        }
    }
}

// ============================================================================
// In-memory implementation (dry runs and tests)
// ============================================================================

/// A tunnel operation observed by [`InMemoryTunnel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelCall {
    Restart(String),
    Stop(String),
    DeleteInterface(String),
}

#[derive(Debug, Default)]
struct InMemoryState {
    active: bool,
    failing_restarts: u32,
    calls: Vec<TunnelCall>,
}

/// Tunnel control that only tracks state and logs what it would do
#[derive(Debug, Default)]
pub struct InMemoryTunnel {
    state: Mutex<InMemoryState>,
}

impl InMemoryTunnel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start out with the service already running
    pub fn active() -> Self {
        let tunnel = Self::default();
        tunnel.state.lock().active = true;
        tunnel
    }

    /// Make the next `n` restarts fail
    pub fn fail_next_restarts(&self, n: u32) {
        self.state.lock().failing_restarts = n;
    }

    /// Flip the service state behind the reconciler's back
    pub fn set_active(&self, active: bool) {
        self.state.lock().active = active;
    }

    pub fn calls(&self) -> Vec<TunnelCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }
}

#[async_trait]
impl TunnelControl for InMemoryTunnel {
    async fn restart(&self, service: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(TunnelCall::Restart(service.to_string()));
        if state.failing_restarts > 0 {
            state.failing_restarts -= 1;
            state.active = false;
            return Err(Error::Tunnel(format!("restart of {} refused", service)));
        }
        state.active = true;
        info!("[in-memory] restarted {}", service);
        Ok(())
    }

    async fn stop(&self, service: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(TunnelCall::Stop(service.to_string()));
        state.active = false;
        info!("[in-memory] stopped {}", service);
        Ok(())
    }

    async fn is_active(&self, _service: &str) -> bool {
        self.state.lock().active
    }

    async fn delete_interface(&self, name: &str) {
        self.state
            .lock()
            .calls
            .push(TunnelCall::DeleteInterface(name.to_string()));
        info!("[in-memory] deleted interface {}", name);
    }
}

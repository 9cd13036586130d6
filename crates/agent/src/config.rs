//! Agent configuration

use std::path::PathBuf;
use std::time::Duration;

/// Agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Registry address (`host:port`, optionally with an `http://` scheme)
    pub server_addr: String,

    /// Physical NIC whose hardware address identifies this node
    pub nic: Option<String>,

    /// Name of the managed tunnel interface
    pub tunnel: String,

    /// Directory holding `<tunnel>.conf`
    pub config_dir: PathBuf,

    /// Time between heartbeats
    pub heartbeat_interval: Duration,

    /// Port announced as part of this node's endpoint
    pub announce_port: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", wgsync_common::DEFAULT_REGISTRY_PORT),
            nic: None,
            tunnel: wgsync_common::DEFAULT_TUNNEL_NAME.to_string(),
            config_dir: PathBuf::from("/etc/wireguard"),
            heartbeat_interval: Duration::from_secs(10),
            announce_port: wgsync_common::DEFAULT_ANNOUNCE_PORT,
        }
    }
}

impl AgentConfig {
    /// Canonical configuration file of the tunnel
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(format!("{}.conf", self.tunnel))
    }

    /// systemd unit managing the tunnel
    pub fn service_name(&self) -> String {
        format!("wg-quick@{}.service", self.tunnel)
    }

    /// Registry address without a scheme, for socket-level probes
    pub fn server_host_port(&self) -> &str {
        self.server_addr
            .strip_prefix("http://")
            .or_else(|| self.server_addr.strip_prefix("https://"))
            .unwrap_or(&self.server_addr)
            .trim_end_matches('/')
    }

    /// Registry URI for the gRPC channel
    pub fn server_uri(&self) -> String {
        if self.server_addr.contains("://") {
            self.server_addr.clone()
        } else {
            format!("http://{}", self.server_addr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let config = AgentConfig {
            tunnel: "mesh0".to_string(),
            config_dir: PathBuf::from("/tmp/wg"),
            ..Default::default()
        };
        assert_eq!(config.config_path(), PathBuf::from("/tmp/wg/mesh0.conf"));
        assert_eq!(config.service_name(), "wg-quick@mesh0.service");
    }

    #[test]
    fn test_server_address_forms() {
        let mut config = AgentConfig {
            server_addr: "10.0.0.1:9618".to_string(),
            ..Default::default()
        };
        assert_eq!(config.server_uri(), "http://10.0.0.1:9618");
        assert_eq!(config.server_host_port(), "10.0.0.1:9618");

        config.server_addr = "http://registry.lan:9618/".to_string();
        assert_eq!(config.server_uri(), "http://registry.lan:9618/");
        assert_eq!(config.server_host_port(), "registry.lan:9618");
    }
}

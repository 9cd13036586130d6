//! Node identity probing
//!
//! Collects what a node announces about itself: hostname, the hardware
//! address of a chosen NIC, and the local address it reaches the registry
//! from.

use crate::config::AgentConfig;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, warn};
use wgsync_common::{Error, HeartbeatRequest, Result};

/// Build this tick's heartbeat request
pub async fn announce(config: &AgentConfig) -> Result<HeartbeatRequest> {
    let ip = local_ip(config.server_host_port()).await?;
    let endpoint = SocketAddr::new(ip, config.announce_port).to_string();

    let hardware_address = match &config.nic {
        Some(nic) => {
            let hw = hardware_address(nic);
            if hw.is_none() {
                warn!("No hardware address found for interface {}", nic);
            }
            hw
        }
        None => None,
    };

    let request = HeartbeatRequest {
        endpoint,
        hardware_address,
        hostname: hostname()?,
    };
    debug!("Announcing {:?}", request);
    Ok(request)
}

/// This machine's hostname
pub fn hostname() -> Result<String> {
    hostname::get()?
        .into_string()
        .map_err(|_| Error::Probe("hostname is not valid UTF-8".to_string()))
}

/// Hardware address of `nic`, as reported by sysfs
pub fn hardware_address(nic: &str) -> Option<String> {
    std::fs::read_to_string(format!("/sys/class/net/{}/address", nic))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Local address used to reach `server`
///
/// Connecting a UDP socket sends nothing; it only asks the kernel to pick a
/// route and source address.
pub async fn local_ip(server: &str) -> Result<IpAddr> {
    let target = tokio::net::lookup_host(server)
        .await?
        .next()
        .ok_or_else(|| Error::Probe(format!("cannot resolve {}", server)))?;

    let bind: SocketAddr = match target {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };

    let socket = UdpSocket::bind(bind).await?;
    socket.connect(target).await?;
    Ok(socket.local_addr()?.ip())
}

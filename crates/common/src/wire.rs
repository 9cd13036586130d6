//! Conversions between the gRPC wire messages and the domain types

use crate::proto;
use crate::types::{DesiredNetworkConfig, HeartbeatRequest, InterfaceConfig, PeerConfig};

impl From<proto::PeerRequest> for HeartbeatRequest {
    fn from(req: proto::PeerRequest) -> Self {
        Self {
            endpoint: req.endpoint,
            // An empty hardware address carries no identity
            hardware_address: req.hardware_address.filter(|hw| !hw.is_empty()),
            hostname: req.hostname,
        }
    }
}

impl From<HeartbeatRequest> for proto::PeerRequest {
    fn from(req: HeartbeatRequest) -> Self {
        Self {
            endpoint: req.endpoint,
            hardware_address: req.hardware_address,
            hostname: req.hostname,
        }
    }
}

impl From<&InterfaceConfig> for proto::InterfaceResponse {
    fn from(iface: &InterfaceConfig) -> Self {
        Self {
            private_key: iface.private_key.clone(),
            address: iface.address.clone(),
            listen_port: iface.listen_port,
            post_up: iface.post_up.clone(),
            pre_down: iface.pre_down.clone(),
        }
    }
}

impl From<proto::InterfaceResponse> for InterfaceConfig {
    fn from(iface: proto::InterfaceResponse) -> Self {
        Self {
            private_key: iface.private_key,
            address: iface.address,
            listen_port: iface.listen_port,
            post_up: iface.post_up,
            pre_down: iface.pre_down,
        }
    }
}

impl From<&PeerConfig> for proto::PeerResponse {
    fn from(peer: &PeerConfig) -> Self {
        Self {
            endpoint: peer.endpoint.clone(),
            public_key: peer.public_key.clone(),
            allowed_ips: peer.allowed_ips.clone(),
            persistent_keepalive: peer.persistent_keepalive,
        }
    }
}

impl From<proto::PeerResponse> for PeerConfig {
    fn from(peer: proto::PeerResponse) -> Self {
        Self {
            public_key: peer.public_key,
            allowed_ips: peer.allowed_ips,
            endpoint: peer.endpoint,
            persistent_keepalive: peer.persistent_keepalive,
        }
    }
}

impl From<&DesiredNetworkConfig> for proto::NetworkResponse {
    fn from(config: &DesiredNetworkConfig) -> Self {
        Self {
            interface: config.interface.as_ref().map(Into::into),
            peers: config.peers.iter().map(Into::into).collect(),
        }
    }
}

impl From<proto::NetworkResponse> for DesiredNetworkConfig {
    fn from(resp: proto::NetworkResponse) -> Self {
        match resp.interface {
            Some(iface) => DesiredNetworkConfig::new(
                iface.into(),
                resp.peers.into_iter().map(Into::into).collect(),
            ),
            // Peers without an interface cannot be applied
            None => DesiredNetworkConfig::empty(),
        }
    }
}

//! Core types for wgsync
//!
//! A node's desired state is one [`InterfaceConfig`] plus an ordered list of
//! [`PeerConfig`]s, both projected out of registry [`PeerRecord`]s.

use std::fmt;

// ============================================================================
// Registry records
// ============================================================================

/// One registry row per mesh node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub id: i64,
    pub hardware_address: Option<String>,
    pub hostname: String,
    pub token: Option<String>,
    pub public_key: String,
    /// Only meaningful for the node's own interface
    pub private_key: String,
    pub post_up: String,
    pub pre_down: String,
    /// Tunnel address in CIDR form
    pub address: String,
    pub listen_port: i32,
    /// Last announced `ip:port`, empty until the node's first heartbeat
    pub endpoint: String,
    pub allowed_ips: String,
    pub persistent_keepalive: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PeerRecord {
    /// The record seen as the requester's own interface
    pub fn interface_config(&self) -> InterfaceConfig {
        InterfaceConfig {
            private_key: self.private_key.clone(),
            address: self.address.clone(),
            listen_port: self.listen_port,
            post_up: self.post_up.clone(),
            pre_down: self.pre_down.clone(),
        }
    }

    /// The record seen as a peer of some other node
    pub fn peer_config(&self) -> PeerConfig {
        PeerConfig {
            public_key: self.public_key.clone(),
            allowed_ips: self.allowed_ips.clone(),
            endpoint: self.endpoint.clone(),
            persistent_keepalive: self.persistent_keepalive,
        }
    }
}

/// Fields needed to register a new node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPeer {
    pub hardware_address: Option<String>,
    pub hostname: String,
    pub token: Option<String>,
    pub public_key: String,
    pub private_key: String,
    pub post_up: String,
    pub pre_down: String,
    pub address: String,
    pub listen_port: i32,
    pub endpoint: String,
    pub allowed_ips: String,
    pub persistent_keepalive: i32,
}

/// Registry columns a node can be identified by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityColumn {
    HardwareAddress,
    Hostname,
    Token,
}

impl IdentityColumn {
    /// Column name in the `peers` table
    pub fn column(&self) -> &'static str {
        match self {
            Self::HardwareAddress => "hardware_address",
            Self::Hostname => "hostname",
            Self::Token => "token",
        }
    }
}

impl fmt::Display for IdentityColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

// ============================================================================
// Heartbeat
// ============================================================================

/// What a node announces about itself on every tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatRequest {
    /// `ip:port` the node is reachable at
    pub endpoint: String,
    pub hardware_address: Option<String>,
    pub hostname: String,
}

// ============================================================================
// Desired state
// ============================================================================

/// The node's own tunnel interface
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceConfig {
    pub private_key: String,
    pub address: String,
    pub listen_port: i32,
    pub post_up: String,
    pub pre_down: String,
}

/// Another node as seen from the requester. Never carries a private key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerConfig {
    pub public_key: String,
    pub allowed_ips: String,
    pub endpoint: String,
    pub persistent_keepalive: i32,
}

impl PeerConfig {
    /// Host part of the endpoint (`1.2.3.4` for `1.2.3.4:9619`)
    pub fn endpoint_host(&self) -> &str {
        match self.endpoint.rsplit_once(':') {
            Some((host, _)) => host.trim_start_matches('[').trim_end_matches(']'),
            None => &self.endpoint,
        }
    }
}

/// Topology a node should be running, computed fresh for every heartbeat
///
/// A config without an interface is the "unrecognized node" signal and
/// drives teardown on the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredNetworkConfig {
    pub interface: Option<InterfaceConfig>,
    pub peers: Vec<PeerConfig>,
}

impl DesiredNetworkConfig {
    pub fn new(interface: InterfaceConfig, peers: Vec<PeerConfig>) -> Self {
        Self {
            interface: Some(interface),
            peers,
        }
    }

    /// The topology returned for unknown or ambiguous nodes
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.interface.is_none()
    }
}

//! wgsync E2E Test Harness
//!
//! Runs a real registry gRPC server in-process on a free local port so the
//! agent can be exercised against it over the network.

pub mod error;
pub mod server;

pub use error::{E2eError, E2eResult};
pub use server::RegistryHandle;

use wgsync_common::NewPeer;

/// A registry row for a test node
///
/// Keys are derived from the hostname so assertions can tell nodes apart.
pub fn node(hostname: &str, hardware_address: Option<&str>, endpoint: &str) -> NewPeer {
    NewPeer {
        hardware_address: hardware_address.map(str::to_string),
        hostname: hostname.to_string(),
        token: None,
        public_key: format!("{}-public", hostname),
        private_key: format!("{}-private", hostname),
        post_up: String::new(),
        pre_down: String::new(),
        address: "10.99.0.1/24".to_string(),
        listen_port: 9619,
        endpoint: endpoint.to_string(),
        allowed_ips: "10.99.0.0/24".to_string(),
        persistent_keepalive: 25,
    }
}

//! wgsync Registry
//!
//! Server side of the heartbeat protocol: maps an announcing node to its
//! registry record and answers with the topology it should be running.

pub mod config;
pub mod grpc;
pub mod resolver;

pub use config::RegistryConfig;
pub use grpc::{serve, serve_with_shutdown, RegistryService};
pub use resolver::{Resolution, TopologyResolver};

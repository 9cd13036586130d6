//! wgsync Agent
//!
//! Runs on every mesh node: announces the node to the registry on a fixed
//! cadence and converges the local WireGuard configuration and service with
//! the topology it gets back.

pub mod agent;
pub mod config;
pub mod heartbeat;
pub mod local_state;
pub mod probe;
pub mod reconciler;
pub mod tunnel;

pub use agent::{Agent, TickOutcome};
pub use config::AgentConfig;
pub use heartbeat::RegistryClient;
pub use local_state::{AppliedConfig, LocalAppliedState, LocalStateReader};
pub use reconciler::{decide, Decision, Reconciler, ResyncReason};
pub use tunnel::{InMemoryTunnel, SystemdTunnel, TunnelCall, TunnelControl};

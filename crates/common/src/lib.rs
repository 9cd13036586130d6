//! wgsync Common Library
//!
//! Data model, canonical configuration rendering, wire contract and the
//! registry store shared by the registry server and the node agent.

pub mod db;
pub mod error;
pub mod render;
pub mod types;
pub mod wire;

pub mod proto {
    #![allow(clippy::all)]
    tonic::include_proto!("wgsync.v1");
}

// Re-export commonly used types
pub use db::Database;
pub use error::{Error, Result};
pub use render::render_config;
pub use types::*;

/// wgsync version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Port the registry listens on when the configuration does not say otherwise
pub const DEFAULT_REGISTRY_PORT: u16 = 9618;

/// Port a node announces as the listen port of its tunnel endpoint
pub const DEFAULT_ANNOUNCE_PORT: u16 = 9619;

/// Name of the tunnel interface managed on every node
pub const DEFAULT_TUNNEL_NAME: &str = "wgsync";

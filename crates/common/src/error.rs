//! Error types for wgsync

use thiserror::Error;

/// Result type alias using wgsync Error
pub type Result<T> = std::result::Result<T, Error>;

/// wgsync error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Registry call failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tunnel control error: {0}")]
    Tunnel(String),

    #[error("Service {service} failed to restart after interface cleanup: {reason}")]
    RestartFailed { service: String, reason: String },

    #[error("Node identity probe failed: {0}")]
    Probe(String),
}

impl From<Error> for tonic::Status {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidConfig(msg) => tonic::Status::invalid_argument(msg),
            Error::Rpc(status) => status,
            _ => tonic::Status::internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_internal() {
        let status = tonic::Status::from(Error::Database(rusqlite::Error::QueryReturnedNoRows));
        assert_eq!(status.code(), tonic::Code::Internal);
    }

    #[test]
    fn test_invalid_config_maps_to_invalid_argument() {
        let status = tonic::Status::from(Error::InvalidConfig("port".to_string()));
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert_eq!(status.message(), "port");
    }
}

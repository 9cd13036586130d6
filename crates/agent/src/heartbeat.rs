//! Registry gRPC client

use crate::config::AgentConfig;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;
use wgsync_common::proto::sync_net_client::SyncNetClient;
use wgsync_common::proto::PeerRequest;
use wgsync_common::{DesiredNetworkConfig, HeartbeatRequest, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the registry heartbeat service
#[derive(Clone)]
pub struct RegistryClient {
    client: SyncNetClient<Channel>,
}

impl RegistryClient {
    /// Create a client that connects on first use
    ///
    /// An unreachable registry shows up as a failed heartbeat on each tick
    /// rather than as a startup error.
    pub fn connect_lazy(config: &AgentConfig) -> Result<Self> {
        let channel = Endpoint::from_shared(config.server_uri())?
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .connect_lazy();
        Ok(Self {
            client: SyncNetClient::new(channel),
        })
    }

    /// Announce the node and fetch its topology
    pub async fn heartbeat(&self, request: HeartbeatRequest) -> Result<DesiredNetworkConfig> {
        let mut client = self.client.clone();
        let response = client
            .heartbeat(tonic::Request::new(PeerRequest::from(request)))
            .await?
            .into_inner();
        debug!(
            "Registry answered with {} peers (interface: {})",
            response.peers.len(),
            response.interface.is_some()
        );
        Ok(DesiredNetworkConfig::from(response))
    }
}

/// Drop peers living on this node's own address and order by endpoint
///
/// The registry already excludes the requester's record; this guards
/// against a stale duplicate registration pointing back at us.
pub fn exclude_self(mut desired: DesiredNetworkConfig, own_host: &str) -> DesiredNetworkConfig {
    if desired.is_empty() {
        return desired;
    }
    desired.peers.retain(|p| p.endpoint_host() != own_host);
    desired.peers.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
    desired
}

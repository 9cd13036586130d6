//! gRPC server implementation

use crate::config::RegistryConfig;
use crate::resolver::TopologyResolver;
use std::future::Future;
use std::net::SocketAddr;
use tonic::{Request, Response, Status};
use tracing::{debug, info};
use wgsync_common::proto::sync_net_server::{SyncNet, SyncNetServer};
use wgsync_common::proto::{NetworkResponse, PeerRequest};
use wgsync_common::{Database, HeartbeatRequest};

/// Heartbeat service backed by the registry store
///
/// Each call is independent; the only write is the resolved node's endpoint.
#[derive(Clone)]
pub struct RegistryService {
    resolver: TopologyResolver,
}

impl RegistryService {
    pub fn new(db: Database) -> Self {
        Self {
            resolver: TopologyResolver::new(db),
        }
    }
}

#[tonic::async_trait]
impl SyncNet for RegistryService {
    async fn heartbeat(
        &self,
        request: Request<PeerRequest>,
    ) -> Result<Response<NetworkResponse>, Status> {
        let req = HeartbeatRequest::from(request.into_inner());
        debug!(
            "Heartbeat: hostname={} hardware_address={:?} endpoint={}",
            req.hostname, req.hardware_address, req.endpoint
        );

        let topology = self.resolver.heartbeat(&req).map_err(Status::from)?;

        debug!(
            "Topology for {}: {} peers",
            req.hostname,
            topology.peers.len()
        );

        Ok(Response::new(NetworkResponse::from(&topology)))
    }
}

/// Open the store and serve until the process ends
pub async fn serve(config: RegistryConfig) -> anyhow::Result<()> {
    let addr = config.listen_addr()?;
    let db = Database::open(&config.db.path)?;
    serve_with_shutdown(addr, db, std::future::pending()).await
}

/// Serve on `addr` until `signal` resolves
pub async fn serve_with_shutdown<F>(
    addr: SocketAddr,
    db: Database,
    signal: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    let service = RegistryService::new(db);

    info!("gRPC server listening on {}", addr);

    tonic::transport::Server::builder()
        .add_service(SyncNetServer::new(service))
        .serve_with_shutdown(addr, signal)
        .await?;

    Ok(())
}

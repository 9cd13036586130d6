//! Registry and agent talking over a real gRPC connection

use std::sync::Arc;
use wgsync_agent::{
    Agent, AgentConfig, Decision, InMemoryTunnel, Reconciler, RegistryClient, ResyncReason,
    TickOutcome, TunnelCall,
};
use wgsync_common::{render_config, Database, HeartbeatRequest};
use wgsync_e2e::{node, RegistryHandle};

const SERVICE: &str = "wg-quick@wgsync.service";

struct Node {
    _dir: tempfile::TempDir,
    config: AgentConfig,
    tunnel: Arc<InMemoryTunnel>,
    agent: Agent,
}

impl Node {
    fn new(registry: &RegistryHandle, tunnel: InMemoryTunnel) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig {
            server_addr: registry.server_addr(),
            config_dir: dir.path().join("wireguard"),
            ..Default::default()
        };
        let tunnel = Arc::new(tunnel);
        let reconciler = Arc::new(Reconciler::new(&config, tunnel.clone()));
        let client = RegistryClient::connect_lazy(&config).unwrap();
        let agent = Agent::new(config.clone(), client, reconciler);
        Self {
            _dir: dir,
            config,
            tunnel,
            agent,
        }
    }

    fn applied_text(&self) -> Option<String> {
        std::fs::read_to_string(self.config.config_path()).ok()
    }
}

fn announce(hw: Option<&str>, hostname: &str, endpoint: &str) -> HeartbeatRequest {
    HeartbeatRequest {
        endpoint: endpoint.to_string(),
        hardware_address: hw.map(str::to_string),
        hostname: hostname.to_string(),
    }
}

async fn registry_with_a_and_b() -> RegistryHandle {
    let db = Database::open_memory().unwrap();
    db.insert_peer(&node("node-a", Some("aa"), "1.1.1.1:9619")).unwrap();
    db.insert_peer(&node("node-b", Some("bb"), "2.2.2.2:9619")).unwrap();
    RegistryHandle::spawn(db).await.unwrap()
}

#[tokio::test]
async fn scenario_a_peers_and_endpoint_capture() {
    let mut registry = registry_with_a_and_b().await;
    let client = RegistryClient::connect_lazy(&AgentConfig {
        server_addr: registry.server_addr(),
        ..Default::default()
    })
    .unwrap();

    let from_a = client
        .heartbeat(announce(Some("aa"), "node-a", "1.1.1.1:9619"))
        .await
        .unwrap();
    assert_eq!(from_a.interface.as_ref().unwrap().private_key, "node-a-private");
    assert_eq!(from_a.peers.len(), 1);
    assert_eq!(from_a.peers[0].public_key, "node-b-public");
    assert_eq!(from_a.peers[0].endpoint, "2.2.2.2:9619");

    // A moves behind a new address
    client
        .heartbeat(announce(Some("aa"), "node-a", "3.3.3.3:9619"))
        .await
        .unwrap();
    let stored: Vec<_> = registry
        .db()
        .find_peers(wgsync_common::IdentityColumn::HardwareAddress, "aa")
        .unwrap();
    assert_eq!(stored[0].endpoint, "3.3.3.3:9619");

    let from_b = client
        .heartbeat(announce(Some("bb"), "node-b", "2.2.2.2:9619"))
        .await
        .unwrap();
    assert_eq!(from_b.peers.len(), 1);
    assert_eq!(from_b.peers[0].public_key, "node-a-public");
    assert_eq!(from_b.peers[0].endpoint, "3.3.3.3:9619");

    registry.stop().await;
}

#[tokio::test]
async fn scenario_b_unknown_node_tears_down() {
    let mut registry = registry_with_a_and_b().await;
    let ghost = Node::new(&registry, InMemoryTunnel::active());
    std::fs::create_dir_all(&ghost.config.config_dir).unwrap();
    std::fs::write(ghost.config.config_path(), "[Interface]\nPrivateKey = old\n").unwrap();

    let outcome = ghost
        .agent
        .tick_with(announce(Some("zz"), "ghost", "9.9.9.9:9619"))
        .await
        .unwrap();

    assert_eq!(outcome, TickOutcome::Applied(Decision::Teardown));
    assert_eq!(ghost.applied_text().as_deref(), Some(""));
    assert_eq!(
        ghost.tunnel.calls(),
        vec![
            TunnelCall::DeleteInterface("wgsync".to_string()),
            TunnelCall::Stop(SERVICE.to_string()),
        ]
    );

    // Teardown is idempotent once stopped
    ghost.tunnel.clear_calls();
    let outcome = ghost
        .agent
        .tick_with(announce(Some("zz"), "ghost", "9.9.9.9:9619"))
        .await
        .unwrap();
    assert_eq!(outcome, TickOutcome::Applied(Decision::Teardown));
    assert!(ghost.tunnel.calls().is_empty());

    registry.stop().await;
}

#[tokio::test]
async fn scenario_c_duplicate_hardware_address_is_not_resolved() {
    let db = Database::open_memory().unwrap();
    db.insert_peer(&node("node-a", Some("aa"), "1.1.1.1:9619")).unwrap();
    db.insert_peer(&node("node-b", Some("aa"), "2.2.2.2:9619")).unwrap();
    let mut registry = RegistryHandle::spawn(db).await.unwrap();

    let client = RegistryClient::connect_lazy(&AgentConfig {
        server_addr: registry.server_addr(),
        ..Default::default()
    })
    .unwrap();

    let topology = client
        .heartbeat(announce(Some("aa"), "node-x", "1.1.1.1:9619"))
        .await
        .unwrap();
    assert!(topology.is_empty());
    assert!(topology.peers.is_empty());

    // Neither duplicate had its endpoint rewritten
    let rows = registry.db().list_peers().unwrap();
    assert_eq!(rows[0].endpoint, "1.1.1.1:9619");
    assert_eq!(rows[1].endpoint, "2.2.2.2:9619");

    registry.stop().await;
}

#[tokio::test]
async fn converges_then_stays_idle() {
    let mut registry = registry_with_a_and_b().await;
    let a = Node::new(&registry, InMemoryTunnel::new());
    let hello = announce(Some("aa"), "node-a", "1.1.1.1:9619");

    let first = a.agent.tick_with(hello.clone()).await.unwrap();
    assert_eq!(
        first,
        TickOutcome::Applied(Decision::FullResync(ResyncReason::ServiceInactive))
    );
    let applied = a.applied_text().unwrap();
    assert!(applied.starts_with("[Interface]\nPrivateKey = node-a-private\n"));
    assert!(applied.contains("Publickey = node-b-public\n"));
    assert!(!applied.contains("node-a-public"));

    let second = a.agent.tick_with(hello.clone()).await.unwrap();
    assert_eq!(second, TickOutcome::Applied(Decision::Noop));
    assert_eq!(a.applied_text().unwrap(), applied);
    assert_eq!(a.tunnel.calls(), vec![TunnelCall::Restart(SERVICE.to_string())]);

    // The registry grows: the next tick picks up the new peer
    registry
        .db()
        .insert_peer(&node("node-c", Some("cc"), "0.0.0.3:9619"))
        .unwrap();
    let third = a.agent.tick_with(hello).await.unwrap();
    assert_eq!(
        third,
        TickOutcome::Applied(Decision::FullResync(ResyncReason::ConfigDrift))
    );
    let applied = a.applied_text().unwrap();
    let c = applied.find("node-c-public").unwrap();
    let b = applied.find("node-b-public").unwrap();
    assert!(c < b, "peers must be ordered by endpoint");

    registry.stop().await;
}

#[tokio::test]
async fn stopped_service_is_restarted_even_when_file_matches() {
    let mut registry = registry_with_a_and_b().await;
    let a = Node::new(&registry, InMemoryTunnel::new());
    let hello = announce(Some("aa"), "node-a", "1.1.1.1:9619");

    a.agent.tick_with(hello.clone()).await.unwrap();
    let applied = a.applied_text().unwrap();

    a.tunnel.set_active(false);
    a.tunnel.clear_calls();

    let outcome = a.agent.tick_with(hello).await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Applied(Decision::FullResync(ResyncReason::ServiceInactive))
    );
    assert_eq!(a.applied_text().unwrap(), applied);
    assert_eq!(a.tunnel.calls(), vec![TunnelCall::Restart(SERVICE.to_string())]);

    registry.stop().await;
}

#[tokio::test]
async fn repeated_resolution_is_byte_identical() {
    let db = Database::open_memory().unwrap();
    db.insert_peer(&node("node-a", Some("aa"), "1.1.1.1:9619")).unwrap();
    db.insert_peer(&node("node-d", Some("dd"), "")).unwrap();
    db.insert_peer(&node("node-c", Some("cc"), "")).unwrap();
    db.insert_peer(&node("node-b", Some("bb"), "2.2.2.2:9619")).unwrap();
    let mut registry = RegistryHandle::spawn(db).await.unwrap();

    let client = RegistryClient::connect_lazy(&AgentConfig {
        server_addr: registry.server_addr(),
        ..Default::default()
    })
    .unwrap();

    let hello = announce(Some("aa"), "node-a", "1.1.1.1:9619");
    let first = render_config(&client.heartbeat(hello.clone()).await.unwrap());
    let second = render_config(&client.heartbeat(hello).await.unwrap());
    assert_eq!(first, second);

    registry.stop().await;
}

#[tokio::test]
async fn registry_outage_leaves_node_untouched() {
    let mut registry = registry_with_a_and_b().await;
    let a = Node::new(&registry, InMemoryTunnel::new());
    let hello = announce(Some("aa"), "node-a", "1.1.1.1:9619");

    a.agent.tick_with(hello.clone()).await.unwrap();
    let applied = a.applied_text().unwrap();
    a.tunnel.clear_calls();

    registry.stop().await;

    let outcome = a.agent.tick_with(hello).await.unwrap();
    assert_eq!(outcome, TickOutcome::Skipped);
    assert!(a.tunnel.calls().is_empty());
    assert_eq!(a.applied_text().unwrap(), applied);
}

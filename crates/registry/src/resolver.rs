//! Topology resolution
//!
//! Maps an announcing node to exactly one registry record and builds the
//! personalized topology it should run. Unknown and ambiguous identities
//! both resolve to the empty topology, which tells the node to tear its
//! tunnel down.

use tracing::{debug, error, info, warn};
use wgsync_common::{
    Database, DesiredNetworkConfig, HeartbeatRequest, IdentityColumn, PeerConfig, PeerRecord,
    Result,
};

/// Outcome of resolving an announcing node against the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(PeerRecord),
    NotFound,
    /// No predicate matched a single row and at least one matched several
    Ambiguous {
        column: IdentityColumn,
        value: String,
        matches: usize,
    },
}

/// Rows matched by a single predicate
enum Lookup {
    Missing,
    Unique(PeerRecord),
    Duplicate(usize),
}

/// Resolves nodes and assembles their topology from the registry store
#[derive(Clone)]
pub struct TopologyResolver {
    db: Database,
}

impl TopologyResolver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Handle one heartbeat: resolve, capture the endpoint, build the topology
    pub fn heartbeat(&self, req: &HeartbeatRequest) -> Result<DesiredNetworkConfig> {
        let mut me = match self.resolve(req)? {
            Resolution::Found(record) => record,
            Resolution::NotFound => {
                warn!(
                    "Unknown node (hardware address {:?}, hostname {})",
                    req.hardware_address, req.hostname
                );
                return Ok(DesiredNetworkConfig::empty());
            }
            Resolution::Ambiguous {
                column,
                value,
                matches,
            } => {
                error!(
                    "Refusing to resolve node: {} rows share {} = {}",
                    matches, column, value
                );
                return Ok(DesiredNetworkConfig::empty());
            }
        };

        if me.endpoint != req.endpoint {
            info!(
                "Node {} moved from {:?} to {:?}",
                me.hostname, me.endpoint, req.endpoint
            );
            if !self.db.update_endpoint(me.id, &req.endpoint)? {
                warn!("Node {} disappeared while updating its endpoint", me.hostname);
                return Ok(DesiredNetworkConfig::empty());
            }
            me.endpoint = req.endpoint.clone();
        }

        self.build_topology(&me)
    }

    /// Resolve the announcing node to its registry record
    pub fn resolve(&self, req: &HeartbeatRequest) -> Result<Resolution> {
        let mut ambiguous = None;

        for (column, value) in identity_predicates(req) {
            match self.lookup(column, value)? {
                Lookup::Unique(record) => {
                    debug!("Resolved {} by {} = {}", record.hostname, column, value);
                    return Ok(Resolution::Found(record));
                }
                Lookup::Duplicate(matches) => {
                    warn!("Duplicate {}: {} ({} rows)", column, value, matches);
                    if ambiguous.is_none() {
                        ambiguous = Some(Resolution::Ambiguous {
                            column,
                            value: value.to_string(),
                            matches,
                        });
                    }
                }
                Lookup::Missing => {}
            }
        }

        Ok(ambiguous.unwrap_or(Resolution::NotFound))
    }

    /// Interface from `me`, every other record as a peer
    pub fn build_topology(&self, me: &PeerRecord) -> Result<DesiredNetworkConfig> {
        let records = self.db.list_peers()?;
        Ok(DesiredNetworkConfig::new(
            me.interface_config(),
            order_peers(records, me.id),
        ))
    }

    fn lookup(&self, column: IdentityColumn, value: &str) -> Result<Lookup> {
        let mut rows = self.db.find_peers(column, value)?;
        Ok(match rows.len() {
            0 => Lookup::Missing,
            1 => Lookup::Unique(rows.remove(0)),
            n => Lookup::Duplicate(n),
        })
    }
}

/// Identity predicates in priority order. Absent or empty values are skipped.
pub fn identity_predicates(req: &HeartbeatRequest) -> Vec<(IdentityColumn, &str)> {
    let hw = req.hardware_address.as_deref();
    let hostname = Some(req.hostname.as_str());

    [
        (IdentityColumn::HardwareAddress, hw),
        (IdentityColumn::Hostname, hostname),
        (IdentityColumn::Token, hw),
        (IdentityColumn::Token, hostname),
    ]
    .into_iter()
    .filter_map(|(column, value)| match value {
        Some(v) if !v.is_empty() => Some((column, v)),
        _ => None,
    })
    .collect()
}

/// Peers of `self_id`, ascending by endpoint
///
/// Public key and row id break ties so the order stays total when several
/// nodes have not announced an endpoint yet.
pub fn order_peers(mut records: Vec<PeerRecord>, self_id: i64) -> Vec<PeerConfig> {
    records.retain(|r| r.id != self_id);
    records.sort_by(|a, b| {
        a.endpoint
            .cmp(&b.endpoint)
            .then_with(|| a.public_key.cmp(&b.public_key))
            .then_with(|| a.id.cmp(&b.id))
    });
    records.iter().map(PeerRecord::peer_config).collect()
}

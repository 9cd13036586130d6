//! SQLite registry store
//!
//! One row per mesh node in the `peers` table. Identity columns are indexed
//! but deliberately not unique: duplicates have to stay observable so the
//! resolver can refuse to pick between them.

use crate::types::{IdentityColumn, NewPeer, PeerRecord};
use crate::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const PEER_COLUMNS: &str = "id, hardware_address, hostname, token, public_key, private_key, \
     post_up, pre_down, address, listen_port, endpoint, allowed_ips, persistent_keepalive, \
     created_at, updated_at";

/// Database wrapper for the peer registry
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path.as_ref())?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        info!("Opened registry database at {:?}", path.as_ref());
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS peers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hardware_address TEXT,
                hostname TEXT NOT NULL,
                token TEXT,
                public_key TEXT NOT NULL,
                private_key TEXT NOT NULL,
                post_up TEXT NOT NULL DEFAULT '',
                pre_down TEXT NOT NULL DEFAULT '',
                address TEXT NOT NULL,
                listen_port INTEGER NOT NULL,
                endpoint TEXT NOT NULL DEFAULT '',
                allowed_ips TEXT NOT NULL,
                persistent_keepalive INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_peers_hardware_address ON peers(hardware_address);
            CREATE INDEX IF NOT EXISTS idx_peers_hostname ON peers(hostname);
            CREATE INDEX IF NOT EXISTS idx_peers_token ON peers(token);
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    /// Register a node, returning its row id
    pub fn insert_peer(&self, peer: &NewPeer) -> Result<i64> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT INTO peers (hardware_address, hostname, token, public_key, private_key,
                post_up, pre_down, address, listen_port, endpoint, allowed_ips,
                persistent_keepalive, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                peer.hardware_address,
                peer.hostname,
                peer.token,
                peer.public_key,
                peer.private_key,
                peer.post_up,
                peer.pre_down,
                peer.address,
                peer.listen_port,
                peer.endpoint,
                peer.allowed_ips,
                peer.persistent_keepalive,
                now,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Inserted peer {} with id {}", peer.hostname, id);
        Ok(id)
    }

    /// Get a peer by row id
    pub fn get_peer(&self, id: i64) -> Result<Option<PeerRecord>> {
        let conn = self.conn.lock();

        let record = conn
            .query_row(
                &format!("SELECT {} FROM peers WHERE id = ?1", PEER_COLUMNS),
                params![id],
                read_peer,
            )
            .optional()?;

        Ok(record)
    }

    /// All peers whose identity column equals `value`
    pub fn find_peers(&self, column: IdentityColumn, value: &str) -> Result<Vec<PeerRecord>> {
        let conn = self.conn.lock();

        // Column names come from a closed enum, never from the request
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM peers WHERE {} = ?1 ORDER BY id",
            PEER_COLUMNS,
            column.column()
        ))?;

        let rows = stmt.query_map(params![value], read_peer)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }

        Ok(results)
    }

    /// List all peers
    pub fn list_peers(&self) -> Result<Vec<PeerRecord>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(&format!("SELECT {} FROM peers ORDER BY id", PEER_COLUMNS))?;

        let rows = stmt.query_map([], read_peer)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }

        Ok(results)
    }

    /// Record a new endpoint for one peer. Returns false if the row is gone.
    pub fn update_endpoint(&self, id: i64, endpoint: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();

        let rows = conn.execute(
            "UPDATE peers SET endpoint = ?1, updated_at = ?2 WHERE id = ?3",
            params![endpoint, now, id],
        )?;

        if rows > 0 {
            debug!("Updated endpoint of peer {} to {}", id, endpoint);
        }

        Ok(rows > 0)
    }
}

fn read_peer(row: &Row<'_>) -> rusqlite::Result<PeerRecord> {
    Ok(PeerRecord {
        id: row.get(0)?,
        hardware_address: row.get(1)?,
        hostname: row.get(2)?,
        token: row.get(3)?,
        public_key: row.get(4)?,
        private_key: row.get(5)?,
        post_up: row.get(6)?,
        pre_down: row.get(7)?,
        address: row.get(8)?,
        listen_port: row.get(9)?,
        endpoint: row.get(10)?,
        allowed_ips: row.get(11)?,
        persistent_keepalive: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(hostname: &str, hw: Option<&str>) -> NewPeer {
        NewPeer {
            hardware_address: hw.map(str::to_string),
            hostname: hostname.to_string(),
            public_key: format!("{}-pub", hostname),
            private_key: format!("{}-priv", hostname),
            address: "10.0.0.1/24".to_string(),
            listen_port: 9619,
            allowed_ips: "10.0.0.1/32".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_crud() {
        let db = Database::open_memory().unwrap();

        let id = db.insert_peer(&peer("node-a", Some("aa"))).unwrap();

        let record = db.get_peer(id).unwrap().unwrap();
        assert_eq!(record.hostname, "node-a");
        assert_eq!(record.hardware_address.as_deref(), Some("aa"));
        assert_eq!(record.token, None);
        assert_eq!(record.endpoint, "");

        assert_eq!(db.list_peers().unwrap().len(), 1);
        assert!(db.get_peer(id + 1).unwrap().is_none());
    }

    #[test]
    fn test_find_peers_reports_duplicates() {
        let db = Database::open_memory().unwrap();
        db.insert_peer(&peer("node-a", Some("aa"))).unwrap();
        db.insert_peer(&peer("node-b", Some("aa"))).unwrap();
        db.insert_peer(&peer("node-c", None)).unwrap();

        assert_eq!(db.find_peers(IdentityColumn::HardwareAddress, "aa").unwrap().len(), 2);
        assert_eq!(db.find_peers(IdentityColumn::Hostname, "node-c").unwrap().len(), 1);
        assert!(db.find_peers(IdentityColumn::Token, "node-c").unwrap().is_empty());
    }

    #[test]
    fn test_update_endpoint() {
        let db = Database::open_memory().unwrap();
        let id = db.insert_peer(&peer("node-a", None)).unwrap();

        assert!(db.update_endpoint(id, "3.3.3.3:9619").unwrap());
        assert_eq!(db.get_peer(id).unwrap().unwrap().endpoint, "3.3.3.3:9619");

        assert!(!db.update_endpoint(id + 100, "4.4.4.4:9619").unwrap());
    }

    #[test]
    fn test_open_file_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("registry.db");

        let db = Database::open(&path).unwrap();
        db.insert_peer(&peer("node-a", None)).unwrap();
        drop(db);

        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.list_peers().unwrap().len(), 1);
    }
}

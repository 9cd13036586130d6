//! Registry management - serving and health checking an in-process registry

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};
use wgsync_common::Database;

use crate::error::{E2eError, E2eResult};

/// Handle to a running registry
pub struct RegistryHandle {
    pub addr: SocketAddr,
    db: Database,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), String>>>,
}

impl RegistryHandle {
    /// Serve `db` on a free loopback port
    pub async fn spawn(db: Database) -> E2eResult<Self> {
        let port = find_free_port()?;
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        info!("Spawning registry on {}", addr);

        let (tx, rx) = oneshot::channel::<()>();
        let serve_db = db.clone();
        let task = tokio::spawn(async move {
            wgsync_registry::serve_with_shutdown(addr, serve_db, async {
                let _ = rx.await;
            })
            .await
            .map_err(|e| e.to_string())
        });

        let mut handle = RegistryHandle {
            addr,
            db,
            shutdown: Some(tx),
            task: Some(task),
        };

        if let Err(e) = handle.wait_for_healthy(Duration::from_secs(10)).await {
            handle.stop().await;
            return Err(e);
        }

        info!("Registry is listening on {}", addr);
        Ok(handle)
    }

    /// Wait for the listener to accept connections
    async fn wait_for_healthy(&mut self, timeout: Duration) -> E2eResult<()> {
        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout {
            attempts += 1;

            if let Some(task) = &self.task {
                if task.is_finished() {
                    let result = match self.task.take() {
                        Some(task) => task.await.map_err(|e| e.to_string()).and_then(|r| r),
                        None => Ok(()),
                    };
                    return Err(E2eError::ServerStartup(
                        result.err().unwrap_or_else(|| "server exited".to_string()),
                    ));
                }
            }

            if TcpStream::connect(self.addr).await.is_ok() {
                return Ok(());
            }

            sleep(Duration::from_millis(50)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    /// Registry store behind the server
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Address in the form the agent takes on its command line
    pub fn server_addr(&self) -> String {
        self.addr.to_string()
    }

    /// Stop the server and wait for it to exit
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Registry exited with error: {}", e),
                Err(e) => warn!("Registry task failed: {}", e),
            }
        }
    }
}

impl Drop for RegistryHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Find a free port to use
fn find_free_port() -> E2eResult<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_free_port() {
        let port = find_free_port().unwrap();
        assert!(port > 0);
    }
}

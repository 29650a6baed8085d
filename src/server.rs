//! TCP listener and accept loop.
//!
//! Binding the listener is the only fatal startup step. Accepted
//! connections are handed to [`crate::connection::handle_client`] tasks; a
//! node configured with `--replicaof` additionally runs the replication
//! coordinator in its own task.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::commands::CommandDispatcher;
use crate::config::ServerConfig;
use crate::connection::handle_client;
use crate::connections::ConnectionManager;
use crate::replication;
use crate::store::Store;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind listener: {0}")]
    Bind(std::io::Error),
}

pub struct Server {
    config: Arc<ServerConfig>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Runs the accept loop until cancellation.
    ///
    /// In-flight connection tasks end when their sockets close; they are
    /// not awaited here.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), ServerError> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.port))
            .await
            .map_err(ServerError::Bind)?;

        info!(
            port = self.config.port,
            role = self.config.role().as_str(),
            "listening"
        );

        let store = Arc::new(Mutex::new(Store::new()));
        let connections = Arc::new(ConnectionManager::new());
        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&self.config),
            store,
            Arc::clone(&connections),
        ));
        let active_clients = Arc::new(AtomicU32::new(0));

        if let Some(endpoint) = self.config.replica_of.clone() {
            tokio::spawn(replication::run_replica(
                endpoint,
                self.config.port,
                Arc::clone(&dispatcher),
                shutdown.clone(),
            ));
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("listener shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            let count = active_clients.fetch_add(1, Ordering::SeqCst) + 1;
                            debug!(peer = %peer_addr, active_clients = count, "accepted connection");

                            tokio::spawn(handle_client(
                                stream,
                                peer_addr.to_string(),
                                Arc::clone(&dispatcher),
                                Arc::clone(&connections),
                                Arc::clone(&active_clients),
                            ));
                        }
                        Err(e) => {
                            error!("accept error: {}", e);
                        }
                    }
                }
            }
        }
    }
}

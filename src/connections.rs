//! Registry of active peer connections, partitioned by role.
//!
//! Replica peers are the ones that completed the PSYNC handshake against
//! this node acting as primary; write propagation fans out to them. The
//! registry lock is never held across a socket write: fan-out snapshots the
//! replica handles first and writes outside the lock.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub type WriteHandle = Arc<Mutex<OwnedWriteHalf>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PeerRole {
    Client,
    Replica,
}

#[derive(Default)]
struct Registry {
    clients: HashMap<String, WriteHandle>,
    replicas: HashMap<String, WriteHandle>,
}

impl Registry {
    fn map_for(&mut self, role: PeerRole) -> &mut HashMap<String, WriteHandle> {
        match role {
            PeerRole::Client => &mut self.clients,
            PeerRole::Replica => &mut self.replicas,
        }
    }
}

#[derive(Default)]
pub struct ConnectionManager {
    registry: Mutex<Registry>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, addr: &str, handle: WriteHandle, role: PeerRole) {
        let mut registry = self.registry.lock().await;
        registry.map_for(role).insert(addr.to_string(), handle);
    }

    pub async fn remove(&self, addr: &str, role: PeerRole) {
        let mut registry = self.registry.lock().await;
        registry.map_for(role).remove(addr);
    }

    pub async fn replica_count(&self) -> usize {
        self.registry.lock().await.replicas.len()
    }

    pub async fn client_count(&self) -> usize {
        self.registry.lock().await.clients.len()
    }

    /// Writes `payload` to every registered replica.
    ///
    /// A failing write is logged and skipped; the peer stays registered
    /// until its connection handler observes the close and removes it.
    pub async fn fanout(&self, payload: &[u8]) {
        let targets: Vec<(String, WriteHandle)> = {
            let registry = self.registry.lock().await;
            registry
                .replicas
                .iter()
                .map(|(addr, handle)| (addr.clone(), Arc::clone(handle)))
                .collect()
        };

        for (addr, handle) in targets {
            let mut writer = handle.lock().await;
            let result = async {
                writer.write_all(payload).await?;
                writer.flush().await
            }
            .await;

            match result {
                Ok(()) => debug!(replica = %addr, "propagated command"),
                Err(e) => warn!(replica = %addr, "failed to propagate command: {}", e),
            }
        }
    }
}

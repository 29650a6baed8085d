//! Maps decoded frames to command handlers.
//!
//! The dispatcher knows which node role it serves: on a primary, successful
//! SETs are re-serialized and fanned out to replicas; in replica mode,
//! replies are suppressed except for `REPLCONF GETACK *`, which reports the
//! replication offset handed in by the replica loop.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use crate::commands::{
    config_get, echo, error::CommandError, get, info, keys, ping, psync, replconf, set, wait,
};
use crate::config::ServerConfig;
use crate::connections::ConnectionManager;
use crate::resp::{encode_command, Command};
use crate::store::Store;

/// What the connection loop should do with a dispatched command.
#[derive(Debug, PartialEq)]
pub enum DispatchOutcome {
    /// Write the reply bytes to the peer.
    Reply(Vec<u8>),
    /// Write nothing.
    NoReply,
    /// Write the FULLRESYNC line and the snapshot payload, then register
    /// the peer as a replica.
    FullResync { header: String, snapshot: Vec<u8> },
}

pub struct CommandDispatcher {
    config: Arc<ServerConfig>,
    store: Arc<Mutex<Store>>,
    connections: Arc<ConnectionManager>,
}

impl CommandDispatcher {
    pub fn new(
        config: Arc<ServerConfig>,
        store: Arc<Mutex<Store>>,
        connections: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            config,
            store,
            connections,
        }
    }

    /// Dispatches a command from a client connection. Command errors become
    /// RESP error replies; they never tear down the connection.
    pub async fn dispatch(&self, command: &Command) -> DispatchOutcome {
        match self.execute(command, 0).await {
            Ok(outcome) => outcome,
            Err(e) => DispatchOutcome::Reply(e.to_resp()),
        }
    }

    /// Dispatches a command streamed from this node's primary.
    ///
    /// `acked_offset` is the replication offset as it stood before this
    /// frame was counted. All replies are suppressed except the GETACK
    /// acknowledgement.
    pub async fn dispatch_replicated(
        &self,
        command: &Command,
        acked_offset: u64,
    ) -> Option<Vec<u8>> {
        let wants_ack = command.name == "replconf" && replconf::is_getack(&command.args);

        match self.execute(command, acked_offset).await {
            Ok(DispatchOutcome::Reply(reply)) if wants_ack => Some(reply),
            Ok(_) => None,
            Err(e) => {
                warn!(command = %command.name, "replicated command failed: {}", e);
                None
            }
        }
    }

    async fn execute(
        &self,
        command: &Command,
        acked_offset: u64,
    ) -> Result<DispatchOutcome, CommandError> {
        use DispatchOutcome::Reply;

        match command.name.as_str() {
            "ping" => Ok(Reply(ping::ping())),
            "echo" => echo::echo(&command.args).map(Reply),
            "set" => {
                let reply = set::set(&self.store, &command.args).await?;
                self.propagate(command).await;
                Ok(Reply(reply))
            }
            "get" => get::get(&self.store, &self.config, &command.args)
                .await
                .map(Reply),
            "config" => config_get::config_get(&self.config, &command.args).map(Reply),
            "keys" => keys::keys(&self.config, &command.args).await.map(Reply),
            "info" => info::info(&self.config, &command.args).map(Reply),
            "replconf" => Ok(Reply(replconf::replconf(&command.args, acked_offset))),
            "psync" => {
                let (header, snapshot) = psync::psync();
                Ok(DispatchOutcome::FullResync { header, snapshot })
            }
            "wait" => Ok(Reply(wait::wait())),
            _ => Err(CommandError::UnknownCommand),
        }
    }

    /// Re-serializes a successful write and fans it out to the replicas.
    /// Only a primary propagates; a replica applying its primary's stream
    /// has no downstream peers.
    async fn propagate(&self, command: &Command) {
        if !self.config.is_primary() {
            return;
        }

        if self.connections.replica_count().await == 0 {
            return;
        }

        let mut parts: Vec<Vec<u8>> = Vec::with_capacity(command.args.len() + 1);
        parts.push(command.name.clone().into_bytes());
        parts.extend(command.args.iter().cloned());

        let frame = encode_command(&parts);
        self.connections.fanout(&frame).await;
    }
}

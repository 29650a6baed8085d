use jiff::Timestamp;
use tokio::sync::Mutex;
use tracing::warn;

use crate::commands::error::CommandError;
use crate::config::ServerConfig;
use crate::rdb;
use crate::resp::RespValue;
use crate::store::Store;

pub struct GetArguments {
    pub key: Vec<u8>,
}

impl GetArguments {
    pub fn parse(arguments: &[Vec<u8>]) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongArity("get"));
        }

        Ok(Self {
            key: arguments[0].clone(),
        })
    }
}

/// Reads the live store, unless a snapshot file is configured, in which case
/// the key is looked up in the snapshot via single-key mode. Missing,
/// expired and unreadable all answer with a null bulk.
pub async fn get(
    store: &Mutex<Store>,
    config: &ServerConfig,
    arguments: &[Vec<u8>],
) -> Result<Vec<u8>, CommandError> {
    let get_arguments = GetArguments::parse(arguments)?;

    if let Some(path) = config.snapshot_path() {
        let reply = match rdb::lookup_key(&path, &get_arguments.key).await {
            Ok(Some(entry)) if !entry.is_expired(Timestamp::now()) => {
                RespValue::BulkString(entry.content)
            }
            Ok(_) => RespValue::NullBulkString,
            Err(e) => {
                warn!(path = %path.display(), "snapshot lookup failed: {}", e);
                RespValue::NullBulkString
            }
        };

        return Ok(reply.encode());
    }

    let mut store_guard = store.lock().await;
    let reply = match store_guard.get(&get_arguments.key) {
        Some(content) => RespValue::BulkString(content),
        None => RespValue::NullBulkString,
    };

    Ok(reply.encode())
}

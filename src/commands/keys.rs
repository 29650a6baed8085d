use globset::Glob;
use tracing::warn;

use crate::commands::error::CommandError;
use crate::config::ServerConfig;
use crate::rdb;
use crate::resp::RespValue;

pub struct KeysArguments {
    pub pattern: String,
}

impl KeysArguments {
    pub fn parse(arguments: &[Vec<u8>]) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongArity("keys"));
        }

        // The pattern itself must be text; the keys it matches need not be.
        let pattern = std::str::from_utf8(&arguments[0])
            .map_err(|e| CommandError::InvalidGlobPattern(e.to_string()))?;

        Ok(Self {
            pattern: pattern.to_string(),
        })
    }
}

/// Enumerates keys from the snapshot file. An unreadable or unconfigured
/// snapshot answers with an empty array.
pub async fn keys(config: &ServerConfig, arguments: &[Vec<u8>]) -> Result<Vec<u8>, CommandError> {
    let keys_arguments = KeysArguments::parse(arguments)?;

    let matcher = Glob::new(&keys_arguments.pattern)
        .map_err(|e| CommandError::InvalidGlobPattern(e.to_string()))?
        .compile_matcher();

    let Some(path) = config.snapshot_path() else {
        return Ok(RespValue::Array(Vec::new()).encode());
    };

    let entries = match rdb::load_snapshot(&path).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), "snapshot enumeration failed: {}", e);
            return Ok(RespValue::Array(Vec::new()).encode());
        }
    };

    let matching = entries
        .keys()
        .filter(|key| matcher.is_match(&*String::from_utf8_lossy(key)))
        .map(|key| RespValue::BulkString(key.clone()))
        .collect();

    Ok(RespValue::Array(matching).encode())
}

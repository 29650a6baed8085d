//! On-disk snapshot loading.
//!
//! The snapshot file is read in fixed-size chunks and streamed through the
//! byte-level state machine in [`parser`], so memory use is independent of
//! file size. The server never writes snapshots.

mod parser;

use std::collections::HashMap;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

use crate::store::Entry;

pub use parser::{SnapshotError, SnapshotParser};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Parses the whole snapshot into a key → entry map.
pub async fn load_snapshot(
    path: impl AsRef<Path>,
) -> Result<HashMap<Vec<u8>, Entry>, SnapshotError> {
    read_snapshot(path, None).await
}

/// Parses the snapshot in single-key mode, returning as soon as `key` has
/// been decoded. Expiry filtering is left to the caller.
pub async fn lookup_key(
    path: impl AsRef<Path>,
    key: &[u8],
) -> Result<Option<Entry>, SnapshotError> {
    let entries = read_snapshot(path, Some(key)).await?;
    Ok(entries.get(key).cloned())
}

async fn read_snapshot(
    path: impl AsRef<Path>,
    target: Option<&[u8]>,
) -> Result<HashMap<Vec<u8>, Entry>, SnapshotError> {
    let file = File::open(path).await?;
    let mut reader = BufReader::new(file);

    let mut parser = match target {
        Some(key) => SnapshotParser::with_target(key),
        None => SnapshotParser::new(),
    };

    let mut buffer = [0u8; READ_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }

        parser.feed(&buffer[..n])?;
        if parser.is_done() {
            break;
        }
    }

    parser.finish()
}

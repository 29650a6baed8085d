//! Primary/replica replication.
//!
//! The replica side performs the handshake with its primary — PING,
//! REPLCONF listening-port, REPLCONF capa, PSYNC — drains the bootstrap
//! snapshot, then applies the command stream locally with replies
//! suppressed. The primary side's share of the protocol (the FULLRESYNC
//! line and the empty-snapshot payload) is produced here and written by the
//! PSYNC handler's connection loop.

use std::sync::Arc;

use regex::Regex;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::commands::CommandDispatcher;
use crate::config::MasterEndpoint;
use crate::resp::{encode_command, FrameDecoder, RespError};

/// Replication id reported by INFO and FULLRESYNC.
pub const REPLICATION_ID: &str = "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb";

/// Snapshot of an empty keyspace as produced by redis 7.2; the payload a
/// primary sends right after the FULLRESYNC line.
const EMPTY_SNAPSHOT_HEX: &str = "524544495330303131fa0972656469732d76657205372e322e30fa0a72656469732d62697473c040fa056374696d65c26d08bc65fa08757365642d6d656dc2b0c41000fa08616f662d62617365c000fff06e3bfec0ff5aa2";

#[derive(Error, Debug)]
pub enum ReplicationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("primary closed the connection")]
    ConnectionClosed,
    #[error("unexpected reply from primary: {0:?}")]
    UnexpectedReply(String),
    #[error("invalid replication id: {0:?}")]
    InvalidReplicationId(String),
    #[error("invalid snapshot length header: {0:?}")]
    InvalidSnapshotLength(String),
    #[error("protocol error in replication stream: {0}")]
    Resp(#[from] RespError),
}

pub fn fullresync_reply() -> String {
    format!("+FULLRESYNC {} 0\r\n", REPLICATION_ID)
}

/// The empty snapshot framed as `$<len>\r\n<bytes>` — without the trailing
/// CRLF an ordinary bulk string would carry.
pub fn snapshot_frame() -> Vec<u8> {
    let payload = hex::decode(EMPTY_SNAPSHOT_HEX).expect("snapshot constant is valid hex");

    let mut frame = format!("${}\r\n", payload.len()).into_bytes();
    frame.extend_from_slice(&payload);
    frame
}

/// Entry point for the replica coordinator task.
///
/// Handshake or stream errors abort the coordinator but never the process;
/// the node keeps serving reads of whatever it already has. Cancellation
/// closes the socket and ends the task.
pub async fn run_replica(
    endpoint: MasterEndpoint,
    listen_port: u16,
    dispatcher: Arc<CommandDispatcher>,
    shutdown: CancellationToken,
) {
    let primary = format!("{}:{}", endpoint.host, endpoint.port);

    tokio::select! {
        _ = shutdown.cancelled() => {
            info!(%primary, "replication coordinator cancelled");
        }
        result = replicate(&endpoint, listen_port, dispatcher) => {
            match result {
                Ok(()) => info!(%primary, "replication stream ended"),
                Err(e) => error!(%primary, "replication aborted: {}", e),
            }
        }
    }
}

async fn replicate(
    endpoint: &MasterEndpoint,
    listen_port: u16,
    dispatcher: Arc<CommandDispatcher>,
) -> Result<(), ReplicationError> {
    let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;
    let mut stream = BufReader::new(stream);

    handshake(&mut stream, listen_port).await?;
    info!("handshake with primary complete, entering replica loop");

    replica_loop(&mut stream, dispatcher).await
}

/// Runs the handshake sequence, each step waiting for the primary's reply
/// before sending the next.
async fn handshake(
    stream: &mut BufReader<TcpStream>,
    listen_port: u16,
) -> Result<(), ReplicationError> {
    send_command(stream, &["PING"]).await?;
    expect_reply(stream, "+PONG").await?;

    send_command(
        stream,
        &["REPLCONF", "listening-port", &listen_port.to_string()],
    )
    .await?;
    expect_reply(stream, "+OK").await?;

    send_command(stream, &["REPLCONF", "capa", "psync2"]).await?;
    expect_reply(stream, "+OK").await?;

    send_command(stream, &["PSYNC", "?", "-1"]).await?;
    let reply = read_reply_line(stream).await?;
    validate_fullresync(&reply)?;

    // The snapshot arrives as `$<n>\r\n` followed by exactly n payload
    // bytes. The payload is discarded: the replica starts from an empty
    // keyspace and is brought up to date by the command stream.
    let header = read_reply_line(stream).await?;
    let length = header
        .strip_prefix('$')
        .and_then(|len| len.parse::<u64>().ok())
        .ok_or_else(|| ReplicationError::InvalidSnapshotLength(header.clone()))?;

    let mut snapshot = (&mut *stream).take(length);
    tokio::io::copy(&mut snapshot, &mut tokio::io::sink()).await?;

    Ok(())
}

/// Applies the primary's command stream locally.
///
/// The offset counts serialized bytes of every inbound frame and is bumped
/// before the frame executes, so a GETACK answers with the offset as it
/// stood before the GETACK itself.
async fn replica_loop(
    stream: &mut BufReader<TcpStream>,
    dispatcher: Arc<CommandDispatcher>,
) -> Result<(), ReplicationError> {
    let mut decoder = FrameDecoder::new();
    let mut buffer = [0u8; 1024];
    let mut offset: u64 = 0;

    loop {
        while let Some(command) = decoder.decode()? {
            let acked_offset = offset;
            offset += command.wire_len as u64;

            if let Some(reply) = dispatcher.dispatch_replicated(&command, acked_offset).await {
                stream.write_all(&reply).await?;
                stream.flush().await?;
            }
        }

        let n = stream.read(&mut buffer).await?;
        if n == 0 {
            return Ok(());
        }
        decoder.feed(&buffer[..n]);
    }
}

async fn send_command(
    stream: &mut BufReader<TcpStream>,
    parts: &[&str],
) -> Result<(), ReplicationError> {
    stream.write_all(&encode_command(parts)).await?;
    stream.flush().await?;
    Ok(())
}

async fn expect_reply(
    stream: &mut BufReader<TcpStream>,
    expected: &str,
) -> Result<(), ReplicationError> {
    let line = read_reply_line(stream).await?;

    if line != expected {
        return Err(ReplicationError::UnexpectedReply(line));
    }

    Ok(())
}

async fn read_reply_line(stream: &mut BufReader<TcpStream>) -> Result<String, ReplicationError> {
    let mut line = String::new();
    let n = stream.read_line(&mut line).await?;

    if n == 0 {
        return Err(ReplicationError::ConnectionClosed);
    }

    Ok(line.trim_end_matches("\r\n").to_string())
}

fn validate_fullresync(line: &str) -> Result<(), ReplicationError> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    if parts.len() != 3 || parts[0] != "+FULLRESYNC" || parts[2].parse::<i64>().is_err() {
        return Err(ReplicationError::UnexpectedReply(line.to_string()));
    }

    let replid_regex = Regex::new(r"^[a-zA-Z0-9]{40}$").expect("literal regex");
    if !replid_regex.is_match(parts[1]) {
        return Err(ReplicationError::InvalidReplicationId(parts[1].to_string()));
    }

    Ok(())
}

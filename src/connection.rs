//! Per-connection command loop.
//!
//! Each accepted socket runs one of these in its own task: buffered reads
//! feed the frame decoder, decoded commands go through the dispatcher, and
//! replies are written back. A peer that completes PSYNC is re-registered
//! as a replica and from then on receives propagated writes.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::commands::{CommandDispatcher, DispatchOutcome};
use crate::connections::{ConnectionManager, PeerRole, WriteHandle};
use crate::resp::FrameDecoder;

/// Idle sockets are dropped after this long without a read.
pub const READ_DEADLINE: Duration = Duration::from_secs(5 * 60);

pub async fn handle_client(
    stream: TcpStream,
    peer_addr: String,
    dispatcher: Arc<CommandDispatcher>,
    connections: Arc<ConnectionManager>,
    active_clients: Arc<AtomicU32>,
) {
    let (mut reader, writer) = stream.into_split();
    let writer: WriteHandle = Arc::new(Mutex::new(writer));

    let mut role = PeerRole::Client;
    connections.add(&peer_addr, Arc::clone(&writer), role).await;

    let mut decoder = FrameDecoder::new();
    let mut buffer = [0u8; 1024];

    'connection: loop {
        // Drain every complete frame before reading more bytes.
        loop {
            let command = match decoder.decode() {
                Ok(Some(command)) => command,
                Ok(None) => break,
                Err(e) => {
                    // The stream may be desynchronized after a bad frame,
                    // so the connection is closed rather than resynced.
                    warn!(peer = %peer_addr, "protocol error, closing connection: {}", e);
                    break 'connection;
                }
            };

            match dispatcher.dispatch(&command).await {
                DispatchOutcome::Reply(reply) => {
                    if let Err(e) = write_reply(&writer, &reply).await {
                        warn!(peer = %peer_addr, "failed to write reply: {}", e);
                        break 'connection;
                    }
                }
                DispatchOutcome::NoReply => {}
                DispatchOutcome::FullResync { header, snapshot } => {
                    let write = async {
                        write_reply(&writer, header.as_bytes()).await?;
                        write_reply(&writer, &snapshot).await
                    }
                    .await;

                    if let Err(e) = write {
                        warn!(peer = %peer_addr, "failed to send full resync: {}", e);
                        break 'connection;
                    }

                    connections.remove(&peer_addr, role).await;
                    role = PeerRole::Replica;
                    connections.add(&peer_addr, Arc::clone(&writer), role).await;
                    info!(peer = %peer_addr, "registered replica");
                }
            }
        }

        let n = match timeout(READ_DEADLINE, reader.read(&mut buffer)).await {
            Ok(Ok(0)) => {
                debug!(peer = %peer_addr, "client disconnected");
                break;
            }
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                warn!(peer = %peer_addr, "read error: {}", e);
                break;
            }
            Err(_) => {
                info!(peer = %peer_addr, "read deadline reached, closing connection");
                break;
            }
        };

        decoder.feed(&buffer[..n]);
    }

    connections.remove(&peer_addr, role).await;
    let remaining = active_clients.fetch_sub(1, Ordering::SeqCst) - 1;
    debug!(peer = %peer_addr, active_clients = remaining, "connection closed");
}

async fn write_reply(writer: &WriteHandle, payload: &[u8]) -> tokio::io::Result<()> {
    let mut writer_guard = writer.lock().await;
    writer_guard.write_all(payload).await?;
    writer_guard.flush().await?;

    Ok(())
}

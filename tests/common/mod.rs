//! Shared helpers for the integration tests: booting a server on an
//! ephemeral port, raw socket I/O with deadlines, and snapshot fixtures.

#![allow(dead_code)]

use std::time::Duration;

use redlite::config::ServerConfig;
use redlite::resp::{Command, FrameDecoder};
use redlite::server::Server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

pub const TEST_DEADLINE: Duration = Duration::from_secs(2);

/// Picks a currently free port. The listener is dropped before the server
/// rebinds it, which is racy in principle but reliable for tests.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub fn master_config(port: u16) -> ServerConfig {
    ServerConfig {
        port,
        dir: None,
        dbfilename: None,
        replica_of: None,
    }
}

/// Spawns a server task and waits until its listener accepts connections.
pub async fn spawn_server(config: ServerConfig) -> (u16, CancellationToken) {
    let port = config.port;
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();

    tokio::spawn(async move {
        Server::new(config).run(token).await.unwrap();
    });

    for _ in 0..100 {
        if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return (port, shutdown);
        }
        sleep(Duration::from_millis(10)).await;
    }

    panic!("server on port {} never became ready", port);
}

pub async fn connect(port: u16) -> TcpStream {
    TcpStream::connect(("127.0.0.1", port)).await.unwrap()
}

pub async fn send(stream: &mut TcpStream, payload: &[u8]) {
    stream.write_all(payload).await.unwrap();
    stream.flush().await.unwrap();
}

/// Reads exactly `expected.len()` bytes and asserts they match.
pub async fn expect_exact(stream: &mut TcpStream, expected: &str) {
    let mut buf = vec![0u8; expected.len()];
    timeout(TEST_DEADLINE, stream.read_exact(&mut buf))
        .await
        .expect("timed out waiting for reply")
        .unwrap();

    assert_eq!(String::from_utf8_lossy(&buf), expected);
}

/// Reads exactly `len` bytes.
pub async fn read_exact(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    timeout(TEST_DEADLINE, stream.read_exact(&mut buf))
        .await
        .expect("timed out waiting for reply")
        .unwrap();
    buf
}

/// A socket wrapper that decodes inbound RESP command frames, used by tests
/// that play the primary's side of the replication protocol.
pub struct FrameConn {
    pub stream: TcpStream,
    decoder: FrameDecoder,
}

impl FrameConn {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::new(),
        }
    }

    pub async fn read_command(&mut self) -> Command {
        let mut buffer = [0u8; 1024];

        loop {
            if let Some(command) = self.decoder.decode().unwrap() {
                return command;
            }

            let n = timeout(TEST_DEADLINE, self.stream.read(&mut buffer))
                .await
                .expect("timed out waiting for command frame")
                .unwrap();
            assert!(n > 0, "peer closed while a command frame was expected");
            self.decoder.feed(&buffer[..n]);
        }
    }

    pub async fn write(&mut self, payload: &[u8]) {
        self.stream.write_all(payload).await.unwrap();
        self.stream.flush().await.unwrap();
    }
}

/// Builds a snapshot file image: header, metadata marker, database section
/// and resize block, the given record bytes, then the end-of-file opcode.
pub fn snapshot_bytes(records: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"REDIS0011");
    bytes.push(0xFA);
    bytes.extend_from_slice(b"\x09redis-ver\x057.2.0");
    bytes.push(0xFE);
    bytes.push(0x00);
    bytes.push(0xFB);
    bytes.push(0x04);
    bytes.push(0x01);
    bytes.extend_from_slice(records);
    bytes.push(0xFF);
    bytes
}

pub fn snapshot_record(key: &str, value: &str) -> Vec<u8> {
    let mut bytes = vec![0x00, key.len() as u8];
    bytes.extend_from_slice(key.as_bytes());
    bytes.push(value.len() as u8);
    bytes.extend_from_slice(value.as_bytes());
    bytes
}

pub fn snapshot_record_with_expiry_ms(key: &str, value: &str, expiry_ms: u64) -> Vec<u8> {
    let mut bytes = vec![0xFC];
    bytes.extend_from_slice(&expiry_ms.to_le_bytes());
    bytes.extend(snapshot_record(key, value));
    bytes
}

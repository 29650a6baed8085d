//! Dispatcher-level tests: command semantics without sockets.

mod common;

use std::sync::Arc;

use redlite::commands::{CommandDispatcher, DispatchOutcome};
use redlite::config::ServerConfig;
use redlite::connections::ConnectionManager;
use redlite::replication::REPLICATION_ID;
use redlite::resp::{encode_command, Command};
use redlite::store::Store;
use tokio::sync::Mutex;

use common::master_config;

struct TestEnv {
    dispatcher: CommandDispatcher,
    store: Arc<Mutex<Store>>,
}

impl TestEnv {
    fn new(config: ServerConfig) -> Self {
        let store = Arc::new(Mutex::new(Store::new()));
        let dispatcher = CommandDispatcher::new(
            Arc::new(config),
            Arc::clone(&store),
            Arc::new(ConnectionManager::new()),
        );

        Self { dispatcher, store }
    }

    fn master() -> Self {
        Self::new(master_config(6379))
    }

    async fn dispatch(&self, parts: &[&str]) -> DispatchOutcome {
        self.dispatcher.dispatch(&command(parts)).await
    }

    async fn expect_reply(&self, parts: &[&str], expected: &str) {
        assert_eq!(
            self.dispatch(parts).await,
            DispatchOutcome::Reply(expected.as_bytes().to_vec()),
            "dispatching {:?}",
            parts
        );
    }
}

/// Builds a command the way the decoder would produce it.
fn command(parts: &[&str]) -> Command {
    Command {
        name: parts[0].to_ascii_lowercase(),
        args: parts[1..].iter().map(|s| s.as_bytes().to_vec()).collect(),
        wire_len: encode_command(parts).len(),
    }
}

#[tokio::test]
async fn test_ping_and_echo() {
    let env = TestEnv::master();

    env.expect_reply(&["PING"], "+PONG\r\n").await;
    env.expect_reply(&["ECHO", "hey"], "$3\r\nhey\r\n").await;
    env.expect_reply(
        &["ECHO"],
        "-ERR wrong number of arguments for 'echo' command\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_set_and_get_round_trip() {
    let env = TestEnv::master();

    env.expect_reply(&["SET", "grape", "mango"], "+OK\r\n").await;
    env.expect_reply(&["GET", "grape"], "$5\r\nmango\r\n").await;
    env.expect_reply(&["GET", "missing"], "$-1\r\n").await;

    let mut store = env.store.lock().await;
    assert_eq!(store.get(b"grape"), Some(b"mango".to_vec()));
}

#[tokio::test]
async fn test_binary_value_round_trip() {
    let env = TestEnv::master();

    let value = vec![0x00, 0xFF, 0x0D, 0x0A, 0x9C];
    let set = Command {
        name: "set".to_string(),
        args: vec![b"blob".to_vec(), value.clone()],
        wire_len: 0,
    };
    assert_eq!(
        env.dispatcher.dispatch(&set).await,
        DispatchOutcome::Reply(b"+OK\r\n".to_vec())
    );

    let mut expected = b"$5\r\n".to_vec();
    expected.extend_from_slice(&value);
    expected.extend_from_slice(b"\r\n");

    let get = Command {
        name: "get".to_string(),
        args: vec![b"blob".to_vec()],
        wire_len: 0,
    };
    assert_eq!(
        env.dispatcher.dispatch(&get).await,
        DispatchOutcome::Reply(expected)
    );
}

#[tokio::test]
async fn test_set_argument_errors() {
    let env = TestEnv::master();

    env.expect_reply(
        &["SET", "grape"],
        "-ERR wrong number of arguments for 'set' command\r\n",
    )
    .await;
    env.expect_reply(&["SET", "grape", "mango", "nx", "100"], "-ERR syntax error\r\n")
        .await;
    env.expect_reply(
        &["SET", "grape", "mango", "px", "abc"],
        "-ERR value is not an integer or out of range\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_unknown_command() {
    let env = TestEnv::master();

    env.expect_reply(&["FLUSHALL"], "-ERR unknown command\r\n").await;
}

#[tokio::test]
async fn test_config_get() {
    let mut config = master_config(6379);
    config.dir = Some("/data".to_string());
    config.dbfilename = Some("dump.rdb".to_string());
    let env = TestEnv::new(config);

    env.expect_reply(
        &["CONFIG", "GET", "dir"],
        "*2\r\n$3\r\ndir\r\n$5\r\n/data\r\n",
    )
    .await;
    env.expect_reply(
        &["CONFIG", "get", "DBFILENAME"],
        "*2\r\n$10\r\ndbfilename\r\n$8\r\ndump.rdb\r\n",
    )
    .await;
    env.expect_reply(
        &["CONFIG", "SET", "dir"],
        "-ERR unsupported CONFIG subcommand: SET\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_info_replication() {
    let env = TestEnv::master();

    let body = format!(
        "role:master\nmaster_replid:{}\nmaster_repl_offset:0",
        REPLICATION_ID
    );
    env.expect_reply(
        &["INFO", "replication"],
        &format!("${}\r\n{}\r\n", body.len(), body),
    )
    .await;
}

#[tokio::test]
async fn test_replconf_and_wait() {
    let env = TestEnv::master();

    env.expect_reply(&["REPLCONF", "listening-port", "6380"], "+OK\r\n")
        .await;
    env.expect_reply(&["WAIT", "0", "100"], ":0\r\n").await;
}

#[tokio::test]
async fn test_psync_produces_full_resync() {
    let env = TestEnv::master();

    let outcome = env.dispatch(&["PSYNC", "?", "-1"]).await;
    let DispatchOutcome::FullResync { header, snapshot } = outcome else {
        panic!("expected FullResync, got {:?}", outcome);
    };

    assert_eq!(header, format!("+FULLRESYNC {} 0\r\n", REPLICATION_ID));
    assert!(snapshot.starts_with(b"$88\r\n"));
}

#[tokio::test]
async fn test_replicated_dispatch_suppresses_replies() {
    let env = TestEnv::master();

    let outcome = env
        .dispatcher
        .dispatch_replicated(&command(&["SET", "foo", "bar"]), 0)
        .await;
    assert_eq!(outcome, None);

    // The write was applied even though nothing was answered.
    let mut store = env.store.lock().await;
    assert_eq!(store.get(b"foo"), Some(b"bar".to_vec()));
}

#[tokio::test]
async fn test_replicated_getack_reports_given_offset() {
    let env = TestEnv::master();

    let outcome = env
        .dispatcher
        .dispatch_replicated(&command(&["REPLCONF", "GETACK", "*"]), 154)
        .await;
    assert_eq!(
        outcome,
        Some(b"*3\r\n$8\r\nREPLCONF\r\n$3\r\nACK\r\n$3\r\n154\r\n".to_vec())
    );
}

#[tokio::test]
async fn test_replicated_errors_are_swallowed() {
    let env = TestEnv::master();

    let outcome = env
        .dispatcher
        .dispatch_replicated(&command(&["BOGUS"]), 0)
        .await;
    assert_eq!(outcome, None);
}

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;

use redlite::config::ServerConfig;
use redlite::server::Server;

/// Parses flags, installs the shutdown signal and runs the server. A bind
/// failure surfaces as the process exit code.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_args(std::env::args())
        .context("invalid command line arguments")?;

    let shutdown = CancellationToken::new();

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    Server::new(config).run(shutdown).await?;

    Ok(())
}

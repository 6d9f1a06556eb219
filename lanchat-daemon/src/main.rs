// lanchat daemon: serverless peer discovery and direct messaging over UDP.

mod config;
mod engine;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use engine::{DebugSink, DiscoveryEngine};

#[derive(Parser)]
#[command(name = "lanchat-daemon", version, about = "LAN peer discovery and messaging daemon")]
struct Cli {
    /// Username to announce on the network.
    #[arg(long)]
    username: String,
    /// Seconds between status reports in the log.
    #[arg(long, default_value_t = 5)]
    status_interval: u64,
}

/// Tag the username with a short random suffix so two people picking the
/// same name can still tell each other apart.
fn tagged_username(username: &str) -> String {
    let suffix = Uuid::new_v4().to_string();
    format!("{username}#{}", &suffix[..4])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = config::load();
    let username = tagged_username(&cli.username);

    let sink: DebugSink = Arc::new(|line: &str| info!(target: "lanchat::debug", "{line}"));
    let engine = Arc::new(DiscoveryEngine::with_debug_sink(
        username.clone(),
        cfg.engine_config(),
        Some(sink),
    ));
    engine.set_debug(cfg.debug);
    engine.start().await?;
    info!(%username, port = cfg.port, "lanchat daemon running");

    let status_engine = engine.clone();
    let status = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cli.status_interval.max(1)));
        loop {
            ticker.tick().await;
            let peers = status_engine.list_peers();
            info!(
                peers = peers.len(),
                messages = status_engine.list_messages(None).len(),
                "status"
            );
        }
    });

    shutdown_signal().await?;
    status.abort();
    engine.stop().await;
    info!("shut down");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}

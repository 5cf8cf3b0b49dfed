//! `goban-server`: binds the HTTP/WebSocket transport to a [`RoomRegistry`]
//! and serves it until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use goban_room::RoomRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Realtime multi-room server for an infinite-board Go variant.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about)]
struct ServerArgs {
    /// Address to bind the HTTP/WebSocket listener on.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Postgres connection string for the optional persistence adapter.
    /// Ignored unless built with `--features persistence`.
    #[cfg(feature = "persistence")]
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = ServerArgs::parse();
    let cancel = CancellationToken::new();

    let registry = Arc::new(build_registry(&args, cancel.clone()).await?);
    let app = goban_net::router(Arc::clone(&registry), cancel.clone());

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!(addr = %args.bind, "listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(error) = result {
                error!(%error, "server exited with an error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    cancel.cancel();
    Ok(())
}

#[cfg(feature = "persistence")]
async fn build_registry(args: &ServerArgs, cancel: CancellationToken) -> anyhow::Result<RoomRegistry> {
    use anyhow::Context as _;

    match &args.database_url {
        Some(url) => {
            let persistence = goban_persist::PostgresPersistence::connect(url)
                .await
                .context("failed to initialize persistence adapter")?;
            Ok(RoomRegistry::with_persistence(cancel, Arc::new(persistence)))
        }
        None => Ok(RoomRegistry::new(cancel)),
    }
}

#[cfg(not(feature = "persistence"))]
async fn build_registry(_args: &ServerArgs, cancel: CancellationToken) -> anyhow::Result<RoomRegistry> {
    Ok(RoomRegistry::new(cancel))
}

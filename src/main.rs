//! hivebot daemon entry point.

use anyhow::Context as _;
use clap::Parser;
use hivebot::api::{self, ApiState};
use hivebot::config::Config;
use hivebot::handlers::App;
use hivebot::messaging::TelegramConnector;
use hivebot::store::{self, BotRepository, ParticipantRepository};

use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "hivebot", version)]
#[command(about = "Host many scripted conversational Telegram bots")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Override the HTTP bind port from the environment
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    init_tracing(cli.debug);

    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let pool = store::connect(&config.database_uri)
        .await
        .context("failed to open database")?;

    let app = Arc::new(App::new(
        BotRepository::new(pool.clone()),
        ParticipantRepository::new(pool),
        Arc::new(TelegramConnector),
    ));

    // Bring every enabled bot back up; per-bot failures are logged and the
    // rest of the fleet still starts.
    if let Err(error) = app.start_enabled.handle().await {
        tracing::error!(%error, "failed to start some enabled bots");
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let bind = SocketAddr::from(([0, 0, 0, 0], config.port));
    let cors = api::cors_layer(&config.cors_allowed_origins);
    let server = api::serve(bind, ApiState { app: app.clone() }, cors, shutdown_rx)
        .await
        .context("failed to start HTTP server")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");

    let _ = shutdown_tx.send(true);
    app.manager.shutdown().await;
    server.await.context("HTTP server task failed")?;

    Ok(())
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "hivebot=debug,info" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

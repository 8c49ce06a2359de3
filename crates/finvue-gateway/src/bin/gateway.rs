//! finvue-gateway server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), overlays
//! `FINVUE_*` environment variables and `PORT`, and serves the gateway.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use finvue_edgar::EdgarClient;
use finvue_gateway::{AppState, GatewayConfig};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "FinVue SEC EDGAR gateway")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();

    let config = GatewayConfig::load(Some(&cli.config)).context("failed to read configuration")?;

    let source = EdgarClient::builder()
        .contact(&config.contact)
        .tickers_url(&config.tickers_url)
        .data_base_url(&config.data_base_url)
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to configure SEC EDGAR client (is `contact` set?)")?;

    let address = config.address();
    let state = AppState::new(Arc::new(source), config).context("invalid gateway configuration")?;
    let _sweeper = state.throttle.spawn_sweeper();

    let app = finvue_gateway::router(state);

    tracing::info!("Server is running on http://{address}");
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}

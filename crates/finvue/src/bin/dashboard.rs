//! FinVue dashboard binary.
//!
//! Loads the company directory through the gateway, fetches the selected
//! companies' concepts and prints the overview and charts as text.

use std::sync::Arc;

use anyhow::{Context as _, bail};
use clap::Parser;
use finvue::{
    DashboardSession, GatewayClient, InMemoryCache, RenderSink, TextSink,
    client::DEFAULT_GATEWAY_URL, session::DIRECTORY_ERROR,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "FinVue financial statement dashboard")]
struct Cli {
    /// Base URL of the FinVue gateway.
    #[arg(long, env = "FINVUE_GATEWAY", default_value = DEFAULT_GATEWAY_URL)]
    gateway: String,

    /// Ticker to show; repeat to compare several companies.
    #[arg(long = "ticker", value_name = "TICKER")]
    tickers: Vec<String>,

    /// Concept label to chart (Assets, Liabilities, Equity, Revenue, NetIncome).
    #[arg(long, default_value = "Assets")]
    metric: String,

    /// Show the company-facts statement view and ratios instead.
    #[arg(long)]
    statement: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let source = GatewayClient::new(&cli.gateway).context("failed to build gateway client")?;
    let session = DashboardSession::new(Arc::new(source), Arc::new(InMemoryCache::new()));
    let label = match session.concept(&cli.metric) {
        Some(metric) => metric.label.clone(),
        None if cli.statement => cli.metric.clone(),
        None => bail!("unknown dashboard metric {:?}", cli.metric),
    };
    let mut sink = TextSink::new(std::io::stdout().lock());

    sink.loading()?;
    if let Err(e) = session.load_directory().await {
        sink.error(DIRECTORY_ERROR)?;
        return Err(e).context("failed to load company directory");
    }

    if let Some((first, rest)) = cli.tickers.split_first() {
        session
            .select(first)
            .await
            .with_context(|| format!("unknown ticker {first}"))?;
        if !rest.is_empty() {
            session.toggle_comparison().await;
        }
        for ticker in rest {
            session
                .select(ticker)
                .await
                .with_context(|| format!("unknown ticker {ticker}"))?;
        }
    }

    if cli.statement {
        let selection = session.selection().await;
        let Some(entity) = selection.first() else {
            bail!("no company selected");
        };
        let view = session
            .statement(&entity.ticker)
            .await
            .with_context(|| format!("failed to fetch company facts for {}", entity.ticker))?;
        sink.statement(&view)?;
    } else {
        session.refresh().await.context("fetch cycle failed")?;
        sink.dashboard(&session.view(&label).await)?;
    }

    session.end().await?;
    Ok(())
}

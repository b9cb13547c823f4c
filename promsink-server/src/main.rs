// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  promsink — hierarchical-name metrics sink
//
//  Sink:    lazily registered gauges / counters / windowed summaries
//  Export:  Prometheus text exposition over axum
//  Config:  YAML file + PROMSINK_ env overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use clap::Parser;
use promsink_core::config::PromsinkConfig;
use promsink_http::HttpState;
use promsink_metrics::{MetricSink, PrometheusSink, SinkOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "promsink", version, about = "promsink — Prometheus metrics sink")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/promsink/promsink.yaml")]
    config: PathBuf,

    /// Log level, used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Tracing ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "promsink starting");

    // ── Config ──
    // A missing file still goes through load() so env overrides apply.
    if cli.config.exists() {
        info!(path = %cli.config.display(), "Loading config file");
    } else {
        info!(path = %cli.config.display(), "No config file found, using defaults");
    }
    let config = PromsinkConfig::load(&cli.config)?;

    // ── Sink ──
    let sink = Arc::new(PrometheusSink::new(SinkOptions::from(&config.sink))?);
    sink.set_gauge(&["promsink", "up"], 1.0);
    info!(
        summary_max_age_secs = config.sink.summary_max_age_secs,
        process_collector = config.sink.process_collector,
        "Sink ready"
    );

    // ── Scrape server ──
    let state = Arc::new(HttpState::new(Arc::clone(&sink), &config.server)?);
    promsink_http::start(&config.server, state).await?;

    info!("promsink stopped");
    Ok(())
}

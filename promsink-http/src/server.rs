use crate::{handlers, middleware};
use promsink_core::config::ServerConfig;
use promsink_metrics::PrometheusSink;
use axum::{Router as AxumRouter, routing::get};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

const HEALTH_PATH: &str = "/health";

/// Shared state for the scrape server.
pub struct HttpState {
    pub sink: Arc<PrometheusSink>,
    pub metrics_path: String,
    pub self_instrument: bool,
}

impl HttpState {
    /// Build state from config, normalising the metrics path to start with `/`.
    pub fn new(sink: Arc<PrometheusSink>, config: &ServerConfig) -> anyhow::Result<Self> {
        let metrics_path = if config.metrics_path.starts_with('/') {
            config.metrics_path.clone()
        } else {
            format!("/{}", config.metrics_path)
        };
        if metrics_path == HEALTH_PATH {
            anyhow::bail!("metrics_path must not be {HEALTH_PATH}");
        }
        if let Some(c) = metrics_path.chars().find(|&c| !is_static_path_char(c)) {
            anyhow::bail!("metrics_path {metrics_path:?} contains unsupported character {c:?}");
        }
        if metrics_path.contains("//") {
            anyhow::bail!("metrics_path {metrics_path:?} contains an empty segment");
        }

        Ok(Self {
            sink,
            metrics_path,
            self_instrument: config.self_instrument,
        })
    }
}

/// Characters allowed in a literal route. Anything axum would read as a
/// capture or wildcard (`:`, `*`, `{`, `}`) is excluded.
fn is_static_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.' | '~')
}

/// Build the axum router: the sink's scrape handler plus `/health`.
pub fn build_router(state: Arc<HttpState>) -> AxumRouter {
    let mut router = AxumRouter::new().route(&state.metrics_path, state.sink.handler());
    if state.self_instrument {
        router = router.route_layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::count_scrapes,
        ));
    }

    router
        .route(HEALTH_PATH, get(handlers::health::health_check))
        .with_state(state)
}

/// Bind `config.addr` and serve until Ctrl-C.
pub async fn start(config: &ServerConfig, state: Arc<HttpState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.addr).await?;
    info!(
        addr = %listener.local_addr()?,
        path = %state.metrics_path,
        "Serving metrics"
    );
    serve(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<HttpState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl-C handler");
    }
    info!("Shutdown signal received");
}

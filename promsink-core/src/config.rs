use figment::{Figment, providers::{Env, Format, Yaml}};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level promsink configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromsinkConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sink: SinkConfig,
}

/// Scrape endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
    /// Count scrapes through the sink itself as `promsink_scrapes_total`.
    #[serde(default = "default_true")]
    pub self_instrument: bool,
}

/// Sink behaviour. Mirrors the library's `SinkOptions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// How long a summary observation contributes to quantiles.
    #[serde(default = "default_summary_max_age")]
    pub summary_max_age_secs: u64,
    #[serde(default = "default_summary_age_buckets")]
    pub summary_age_buckets: u32,
    #[serde(default = "default_summary_quantiles")]
    pub summary_quantiles: Vec<f64>,
    #[serde(default = "default_true")]
    pub process_collector: bool,
    #[serde(default = "default_true")]
    pub runtime_collector: bool,
}

// ── Defaults ──────────────────────────────────────────────────

fn default_addr() -> String { "0.0.0.0:9102".into() }
fn default_metrics_path() -> String { "/metrics".into() }
fn default_true() -> bool { true }
fn default_summary_max_age() -> u64 { 10 }
fn default_summary_age_buckets() -> u32 { 5 }
fn default_summary_quantiles() -> Vec<f64> { vec![0.5, 0.9, 0.99] }

// ── Impls ─────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            metrics_path: default_metrics_path(),
            self_instrument: true,
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            summary_max_age_secs: default_summary_max_age(),
            summary_age_buckets: default_summary_age_buckets(),
            summary_quantiles: default_summary_quantiles(),
            process_collector: true,
            runtime_collector: true,
        }
    }
}

impl PromsinkConfig {
    /// Load configuration from a YAML file plus `PROMSINK_` env overrides.
    ///
    /// Nested keys use a double underscore: `PROMSINK_SERVER__ADDR`.
    /// A missing file contributes nothing, so defaults apply.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config: PromsinkConfig = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("PROMSINK_").split("__"))
            .extract()?;
        Ok(config)
    }
}

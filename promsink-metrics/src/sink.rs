use crate::exporter::{render_metrics, scrape_response};
use crate::runtime::RuntimeCollector;
use crate::summary::{
    DEFAULT_AGE_BUCKETS, DEFAULT_MAX_AGE, DEFAULT_QUANTILES, SummaryOpts, WindowedSummary,
};
use axum::routing::{MethodRouter, get};
use prometheus::core::Collector;
use prometheus::{Counter, Gauge, Opts, Registry};
use promsink_core::config::SinkConfig;
use promsink_core::{SinkError, flatten_key};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, trace};

/// Backend-agnostic instrumentation surface.
///
/// Call sites name metrics hierarchically (`&["api", "requests"]`) and never
/// see the registry behind the sink.
pub trait MetricSink: Send + Sync {
    /// Set a gauge to `value`. Last write wins.
    fn set_gauge(&self, parts: &[&str], value: f64);
    /// Record one observation in a windowed summary.
    fn add_sample(&self, parts: &[&str], value: f64);
    /// Add `value` to a counter.
    fn incr_counter(&self, parts: &[&str], value: f64);
    /// Emit a single keyed value. Sinks without a history primitive ignore it.
    fn emit_key(&self, parts: &[&str], value: f64);
}

/// Sink that discards every measurement.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlackholeSink;

impl MetricSink for BlackholeSink {
    fn set_gauge(&self, _parts: &[&str], _value: f64) {}
    fn add_sample(&self, _parts: &[&str], _value: f64) {}
    fn incr_counter(&self, _parts: &[&str], _value: f64) {}
    fn emit_key(&self, _parts: &[&str], _value: f64) {}
}

/// Construction options for [`PrometheusSink`].
#[derive(Debug, Clone)]
pub struct SinkOptions {
    pub summary_max_age: Duration,
    pub summary_age_buckets: u32,
    pub summary_quantiles: Vec<f64>,
    /// Register the process collector (Linux only).
    pub process_collector: bool,
    /// Register build info and uptime series.
    pub runtime_collector: bool,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            summary_max_age: DEFAULT_MAX_AGE,
            summary_age_buckets: DEFAULT_AGE_BUCKETS,
            summary_quantiles: DEFAULT_QUANTILES.to_vec(),
            process_collector: true,
            runtime_collector: true,
        }
    }
}

impl SinkOptions {
    /// Summary options every lazily created summary is built from.
    pub(crate) fn summary_opts(&self, name: &str) -> SummaryOpts {
        SummaryOpts::new(name, name)
            .max_age(self.summary_max_age)
            .age_buckets(self.summary_age_buckets)
            .quantiles(self.summary_quantiles.clone())
    }
}

impl From<&SinkConfig> for SinkOptions {
    fn from(cfg: &SinkConfig) -> Self {
        Self {
            summary_max_age: Duration::from_secs(cfg.summary_max_age_secs),
            summary_age_buckets: cfg.summary_age_buckets,
            summary_quantiles: cfg.summary_quantiles.clone(),
            process_collector: cfg.process_collector,
            runtime_collector: cfg.runtime_collector,
        }
    }
}

#[derive(Default)]
struct MetricTables {
    gauges: HashMap<String, Gauge>,
    summaries: HashMap<String, WindowedSummary>,
    counters: HashMap<String, Counter>,
}

/// Metrics sink backed by a private Prometheus registry.
///
/// Metrics are created on first use of a flattened key and live as long as
/// the sink. One mutex covers lookup and registration. Gauges and counters
/// are also updated under it; summary observations happen after it is
/// released, so a scrape sorting a busy summary window never stalls
/// unrelated keys. Scrapes go straight to the registry and never take it.
pub struct PrometheusSink {
    registry: Registry,
    options: SinkOptions,
    tables: Mutex<MetricTables>,
}

impl PrometheusSink {
    pub fn new(options: SinkOptions) -> Result<Self, SinkError> {
        options.summary_opts("summary").validate()?;
        let registry = Registry::new();

        if options.process_collector {
            register_process_collector(&registry)?;
        }
        if options.runtime_collector {
            let runtime = RuntimeCollector::new(env!("CARGO_PKG_VERSION"))
                .map_err(|e| SinkError::registration("runtime", e))?;
            registry
                .register(Box::new(runtime))
                .map_err(|e| SinkError::registration("runtime", e))?;
        }

        debug!(
            process_collector = options.process_collector,
            runtime_collector = options.runtime_collector,
            summary_max_age_secs = options.summary_max_age.as_secs_f64(),
            "Prometheus sink created"
        );

        Ok(Self {
            registry,
            options,
            tables: Mutex::new(MetricTables::default()),
        })
    }

    pub fn with_defaults() -> Result<Self, SinkError> {
        Self::new(SinkOptions::default())
    }

    /// The registry scrapes are served from. Extra collectors may be
    /// registered on it directly.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn tables(&self) -> MutexGuard<'_, MetricTables> {
        // The tables are plain maps; a panicking holder cannot leave them torn.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn try_set_gauge(&self, parts: &[&str], value: f64) -> Result<(), SinkError> {
        let key = flatten_key(parts);
        let mut tables = self.tables();
        let gauge = lookup_or_register(&self.registry, &mut tables.gauges, key, |key| {
            Gauge::with_opts(Opts::new(key, key)).map_err(|e| SinkError::registration(key, e))
        })?;
        gauge.set(value);
        Ok(())
    }

    pub fn try_add_sample(&self, parts: &[&str], value: f64) -> Result<(), SinkError> {
        let key = flatten_key(parts);
        let summary = {
            let mut tables = self.tables();
            lookup_or_register(&self.registry, &mut tables.summaries, key, |key| {
                WindowedSummary::new(self.options.summary_opts(key))
            })?
            .clone()
        };
        summary.observe(value);
        Ok(())
    }

    /// Add `value` to the counter for `parts`.
    ///
    /// Negative and NaN increments are refused before the counter is
    /// touched; the underlying counter only checks this in debug builds.
    pub fn try_incr_counter(&self, parts: &[&str], value: f64) -> Result<(), SinkError> {
        let key = flatten_key(parts);
        if value.is_nan() || value < 0.0 {
            return Err(SinkError::InvalidIncrement { key, value });
        }
        let mut tables = self.tables();
        let counter = lookup_or_register(&self.registry, &mut tables.counters, key, |key| {
            Counter::with_opts(Opts::new(key, key)).map_err(|e| SinkError::registration(key, e))
        })?;
        counter.inc_by(value);
        Ok(())
    }

    /// Current registry contents in the text exposition format.
    pub fn render(&self) -> String {
        render_metrics(&self.registry)
    }

    /// Scrape handler serving the registry in the text exposition format.
    ///
    /// Mount it wherever collectors poll, conventionally `/metrics`.
    pub fn handler<S>(&self) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let registry = self.registry.clone();
        get(move || async move { scrape_response(&registry) })
    }
}

impl MetricSink for PrometheusSink {
    fn set_gauge(&self, parts: &[&str], value: f64) {
        report("set_gauge", self.try_set_gauge(parts, value));
    }

    fn add_sample(&self, parts: &[&str], value: f64) {
        report("add_sample", self.try_add_sample(parts, value));
    }

    fn incr_counter(&self, parts: &[&str], value: f64) {
        report("incr_counter", self.try_incr_counter(parts, value));
    }

    /// Not supported. A pull-based registry has no metric type that retains
    /// an arbitrary number of emitted values per key.
    fn emit_key(&self, parts: &[&str], value: f64) {
        trace!(key = %flatten_key(parts), value, "emit_key ignored by prometheus sink");
    }
}

fn report(operation: &'static str, result: Result<(), SinkError>) {
    if let Err(e) = result {
        error!(operation, kind = e.kind(), error = %e, "Dropping measurement");
    }
}

/// Return the metric cached under `key`, creating and registering it first
/// if this is the key's first use.
fn lookup_or_register<'a, M, F>(
    registry: &Registry,
    table: &'a mut HashMap<String, M>,
    key: String,
    build: F,
) -> Result<&'a M, SinkError>
where
    M: Collector + Clone + 'static,
    F: FnOnce(&str) -> Result<M, SinkError>,
{
    match table.entry(key) {
        Entry::Occupied(entry) => Ok(&*entry.into_mut()),
        Entry::Vacant(entry) => {
            let metric = build(entry.key())?;
            registry
                .register(Box::new(metric.clone()))
                .map_err(|e| SinkError::registration(entry.key().as_str(), e))?;
            debug!(key = %entry.key(), "Registered metric");
            Ok(&*entry.insert(metric))
        }
    }
}

#[cfg(target_os = "linux")]
fn register_process_collector(registry: &Registry) -> Result<(), SinkError> {
    use prometheus::process_collector::ProcessCollector;
    registry
        .register(Box::new(ProcessCollector::for_self()))
        .map_err(|e| SinkError::registration("process", e))
}

#[cfg(not(target_os = "linux"))]
fn register_process_collector(_registry: &Registry) -> Result<(), SinkError> {
    debug!("Process collector is only available on Linux, skipping");
    Ok(())
}

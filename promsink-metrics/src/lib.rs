pub mod exporter;
pub mod runtime;
pub mod sink;
pub mod summary;

pub use exporter::render_metrics;
pub use sink::{BlackholeSink, MetricSink, PrometheusSink, SinkOptions};
pub use summary::{SummaryOpts, SummarySnapshot, WindowedSummary};

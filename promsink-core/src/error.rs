use thiserror::Error;

/// Unified error type for the metrics sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The registry refused a metric or collector, either because the name
    /// is not a valid Prometheus metric name or because it is already taken.
    #[error("Registration of {key:?} failed: {source}")]
    Registration {
        key: String,
        #[source]
        source: prometheus::Error,
    },

    #[error("Counter {key:?} cannot be incremented by {value}")]
    InvalidIncrement { key: String, value: f64 },

    #[error("Invalid summary options: {0}")]
    InvalidSummary(String),
}

impl SinkError {
    /// Wrap a registry error with the key it was raised for.
    pub fn registration(key: impl Into<String>, source: prometheus::Error) -> Self {
        SinkError::Registration {
            key: key.into(),
            source,
        }
    }

    /// Short, stable name of the variant for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SinkError::Registration { .. } => "registration",
            SinkError::InvalidIncrement { .. } => "invalid_increment",
            SinkError::InvalidSummary(_) => "invalid_summary",
        }
    }
}

//! Sliding-window summary collector.
//!
//! The `prometheus` crate ships gauges, counters and histograms but no
//! summary with a time-bounded observation window. `WindowedSummary` fills
//! that gap: observations are kept in age buckets, quantiles are derived at
//! scrape time from the buckets still inside the window, and `sum`/`count`
//! accumulate for the lifetime of the metric.

use prometheus::core::{Collector, Desc};
use prometheus::proto::{Metric, MetricFamily, MetricType, Quantile, Summary};
use promsink_core::SinkError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(10);
pub const DEFAULT_AGE_BUCKETS: u32 = 5;
pub const DEFAULT_QUANTILES: [f64; 3] = [0.5, 0.9, 0.99];

/// Construction options for a [`WindowedSummary`].
#[derive(Debug, Clone)]
pub struct SummaryOpts {
    pub name: String,
    pub help: String,
    /// How long an observation contributes to quantiles.
    pub max_age: Duration,
    /// Number of buckets the window is split into. More buckets expire
    /// observations closer to exactly `max_age`.
    pub age_buckets: u32,
    /// Ranks reported at scrape time, each in `[0, 1]`.
    pub quantiles: Vec<f64>,
}

impl SummaryOpts {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            max_age: DEFAULT_MAX_AGE,
            age_buckets: DEFAULT_AGE_BUCKETS,
            quantiles: DEFAULT_QUANTILES.to_vec(),
        }
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn age_buckets(mut self, age_buckets: u32) -> Self {
        self.age_buckets = age_buckets;
        self
    }

    pub fn quantiles(mut self, quantiles: Vec<f64>) -> Self {
        self.quantiles = quantiles;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SinkError> {
        if self.max_age.is_zero() {
            return Err(SinkError::InvalidSummary("max_age must be non-zero".into()));
        }
        if self.age_buckets == 0 {
            return Err(SinkError::InvalidSummary("age_buckets must be non-zero".into()));
        }
        if let Some(q) = self.quantiles.iter().find(|q| !(0.0..=1.0).contains(*q)) {
            return Err(SinkError::InvalidSummary(format!(
                "quantile {q} is outside [0, 1]"
            )));
        }
        Ok(())
    }
}

/// Point-in-time view of a summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarySnapshot {
    pub count: u64,
    pub sum: f64,
    /// `(rank, value)` pairs in configured order. Values are `NaN` when the
    /// window holds no observations.
    pub quantiles: Vec<(f64, f64)>,
}

struct AgeBucket {
    opened: Instant,
    samples: Vec<f64>,
}

pub(crate) struct Window {
    max_age: Duration,
    bucket_width: Duration,
    /// Oldest first.
    buckets: VecDeque<AgeBucket>,
    count: u64,
    sum: f64,
}

impl Window {
    /// Drop buckets opened `max_age` or more before `now`.
    fn expire(&mut self, now: Instant) {
        while let Some(front) = self.buckets.front() {
            if now.saturating_duration_since(front.opened) < self.max_age {
                break;
            }
            self.buckets.pop_front();
        }
    }

    fn observe(&mut self, value: f64, now: Instant) {
        self.expire(now);
        self.count += 1;
        self.sum += value;
        match self.buckets.back_mut() {
            Some(bucket) if now.saturating_duration_since(bucket.opened) < self.bucket_width => {
                bucket.samples.push(value);
            }
            _ => self.buckets.push_back(AgeBucket {
                opened: now,
                samples: vec![value],
            }),
        }
    }

    fn samples(&self) -> Vec<f64> {
        let len = self.buckets.iter().map(|b| b.samples.len()).sum();
        let mut samples = Vec::with_capacity(len);
        for bucket in &self.buckets {
            samples.extend_from_slice(&bucket.samples);
        }
        samples
    }
}

/// Nearest-rank quantile over sorted samples.
fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return f64::NAN;
    };
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(last)]
}

/// Summary whose quantiles only reflect observations from the last `max_age`.
///
/// Cloning shares the underlying window, so one clone can sit in a lookup
/// table while another is owned by the registry.
#[derive(Clone)]
pub struct WindowedSummary {
    desc: Desc,
    quantiles: Arc<[f64]>,
    window: Arc<Mutex<Window>>,
}

impl WindowedSummary {
    pub fn new(opts: SummaryOpts) -> Result<Self, SinkError> {
        opts.validate()?;
        let desc = Desc::new(opts.name.clone(), opts.help, vec![], HashMap::new())
            .map_err(|e| SinkError::registration(opts.name, e))?;

        Ok(Self {
            desc,
            quantiles: opts.quantiles.into(),
            window: Arc::new(Mutex::new(Window {
                max_age: opts.max_age,
                bucket_width: opts.max_age / opts.age_buckets,
                buckets: VecDeque::new(),
                count: 0,
                sum: 0.0,
            })),
        })
    }

    pub fn name(&self) -> &str {
        &self.desc.fq_name
    }

    /// Record one observation.
    pub fn observe(&self, value: f64) {
        self.observe_at(value, Instant::now());
    }

    pub fn snapshot(&self) -> SummarySnapshot {
        self.snapshot_at(Instant::now())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Window> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn observe_at(&self, value: f64, now: Instant) {
        self.lock().observe(value, now);
    }

    #[cfg(test)]
    pub(crate) fn hold_window(&self) -> std::sync::MutexGuard<'_, Window> {
        self.lock()
    }

    pub(crate) fn snapshot_at(&self, now: Instant) -> SummarySnapshot {
        // Only the copy happens under the lock; sorting does not block observers.
        let (count, sum, mut sorted) = {
            let mut window = self.lock();
            window.expire(now);
            (window.count, window.sum, window.samples())
        };
        sorted.sort_by(f64::total_cmp);

        SummarySnapshot {
            count,
            sum,
            quantiles: self
                .quantiles
                .iter()
                .map(|&q| (q, nearest_rank(&sorted, q)))
                .collect(),
        }
    }
}

impl Collector for WindowedSummary {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let snapshot = self.snapshot();

        let mut summary = Summary::default();
        summary.set_sample_count(snapshot.count);
        summary.set_sample_sum(snapshot.sum);
        for (rank, value) in snapshot.quantiles {
            let mut quantile = Quantile::default();
            quantile.set_quantile(rank);
            quantile.set_value(value);
            summary.mut_quantile().push(quantile);
        }

        let mut metric = Metric::default();
        metric.set_summary(summary);

        let mut family = MetricFamily::default();
        family.set_name(self.desc.fq_name.clone());
        family.set_help(self.desc.help.clone());
        family.set_field_type(MetricType::SUMMARY);
        family.mut_metric().push(metric);
        vec![family]
    }
}

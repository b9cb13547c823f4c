use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, GaugeVec, Opts};
use std::time::Instant;

/// Build and uptime information about the running sink.
///
/// Registered next to the process collector so that every scrape carries a
/// constant `promsink_build_info` series and a monotonically growing uptime.
pub struct RuntimeCollector {
    started: Instant,
    build_info: GaugeVec,
    uptime: Gauge,
}

impl RuntimeCollector {
    pub fn new(version: &str) -> prometheus::Result<Self> {
        let build_info = GaugeVec::new(
            Opts::new("promsink_build_info", "Build information of the metrics sink"),
            &["version"],
        )?;
        build_info.with_label_values(&[version]).set(1.0);

        let uptime = Gauge::new(
            "promsink_uptime_seconds",
            "Seconds since the metrics sink was created",
        )?;

        Ok(Self {
            started: Instant::now(),
            build_info,
            uptime,
        })
    }
}

impl Collector for RuntimeCollector {
    fn desc(&self) -> Vec<&Desc> {
        let mut descs = self.build_info.desc();
        descs.extend(self.uptime.desc());
        descs
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.uptime.set(self.started.elapsed().as_secs_f64());
        let mut families = self.build_info.collect();
        families.extend(self.uptime.collect());
        families
    }
}

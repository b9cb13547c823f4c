use promsink_metrics::{MetricSink, PrometheusSink, SinkOptions};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// ── Helpers ───────────────────────────────────────────────────

fn bare_sink() -> PrometheusSink {
    PrometheusSink::new(SinkOptions {
        process_collector: false,
        runtime_collector: false,
        ..SinkOptions::default()
    })
    .unwrap()
}

/// Value of the exposition line for `series` (name plus any label block).
fn sample(text: &str, series: &str) -> Option<f64> {
    text.lines()
        .find_map(|line| line.strip_prefix(series)?.strip_prefix(' ')?.parse().ok())
}

// =============================================================================
// Gauges
// =============================================================================

#[test]
fn gauge_last_write_wins_under_one_metric() {
    let sink = bare_sink();
    sink.set_gauge(&["x", "y"], 1.0);
    sink.set_gauge(&["x", "y"], 2.0);

    let text = sink.render();
    assert_eq!(text.matches("# TYPE x_y gauge").count(), 1);
    assert_eq!(sample(&text, "x_y"), Some(2.0));
}

#[test]
fn gauge_help_text_is_the_flat_key() {
    let sink = bare_sink();
    sink.set_gauge(&["queue", "depth"], 12.0);
    assert!(sink.render().contains("# HELP queue_depth queue_depth"));
}

#[test]
fn hierarchical_names_are_flattened() {
    let sink = bare_sink();
    sink.set_gauge(&["a.b", "c d", "e-f=g"], 3.0);
    assert_eq!(sample(&sink.render(), "a_b_c_d_e_f_g"), Some(3.0));
}

#[test]
fn metrics_are_created_lazily() {
    let sink = bare_sink();
    assert!(!sink.render().contains("lazy_key"));

    sink.incr_counter(&["lazy", "key"], 1.0);
    let text = sink.render();
    assert_eq!(text.matches("# TYPE lazy_key counter").count(), 1);

    sink.incr_counter(&["lazy", "key"], 1.0);
    assert_eq!(sink.render().matches("# TYPE lazy_key counter").count(), 1);
}

// =============================================================================
// Counters
// =============================================================================

#[test]
fn counter_accumulates_increments() {
    let sink = bare_sink();
    sink.incr_counter(&["c"], 3.0);
    sink.incr_counter(&["c"], 4.0);
    assert_eq!(sample(&sink.render(), "c"), Some(7.0));
}

#[test]
fn negative_increment_is_dropped() {
    let sink = bare_sink();
    sink.incr_counter(&["c"], 5.0);
    sink.incr_counter(&["c"], -2.0);
    assert_eq!(sample(&sink.render(), "c"), Some(5.0));
}

// =============================================================================
// Summaries
// =============================================================================

#[test]
fn summary_exposes_quantiles_sum_and_count() {
    let sink = bare_sink();
    for v in 1..=10 {
        sink.add_sample(&["api", "latency"], v as f64);
    }

    let text = sink.render();
    assert!(text.contains("# TYPE api_latency summary"));
    assert_eq!(sample(&text, "api_latency{quantile=\"0.5\"}"), Some(5.0));
    assert_eq!(sample(&text, "api_latency{quantile=\"0.99\"}"), Some(10.0));
    assert_eq!(sample(&text, "api_latency_sum"), Some(55.0));
    assert_eq!(sample(&text, "api_latency_count"), Some(10.0));
}

#[test]
fn summary_observations_age_out_of_the_window() {
    let sink = PrometheusSink::new(SinkOptions {
        process_collector: false,
        runtime_collector: false,
        summary_max_age: Duration::from_millis(200),
        summary_age_buckets: 2,
        summary_quantiles: vec![0.5],
    })
    .unwrap();

    sink.add_sample(&["lat"], 5.0);
    let text = sink.render();
    assert_eq!(sample(&text, "lat{quantile=\"0.5\"}"), Some(5.0));

    thread::sleep(Duration::from_millis(300));

    let text = sink.render();
    let median = sample(&text, "lat{quantile=\"0.5\"}").unwrap();
    assert!(median.is_nan(), "expired window should report NaN, got {median}");
    // count and sum still include the expired observation
    assert_eq!(sample(&text, "lat_count"), Some(1.0));
    assert_eq!(sample(&text, "lat_sum"), Some(5.0));
}

// =============================================================================
// emit_key
// =============================================================================

#[test]
fn emit_key_has_no_observable_effect() {
    let sink = bare_sink();
    sink.set_gauge(&["present"], 1.0);
    let before = sink.render();

    sink.emit_key(&["anything"], 42.0);

    let after = sink.render();
    assert_eq!(before, after);
    assert!(!after.contains("anything"));
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn concurrent_increments_sum_exactly() {
    let sink = Arc::new(bare_sink());
    let threads = 8;
    let per_thread = 1000;

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let sink = Arc::clone(&sink);
            thread::spawn(move || {
                let own = format!("worker{i}");
                for _ in 0..per_thread {
                    sink.incr_counter(&["hits"], 1.0);
                    sink.set_gauge(&["gauge", own.as_str()], 1.0);
                    sink.add_sample(&["shared", "latency"], 0.5);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let text = sink.render();
    assert_eq!(sample(&text, "hits"), Some((threads * per_thread) as f64));
    assert_eq!(
        sample(&text, "shared_latency_count"),
        Some((threads * per_thread) as f64)
    );
    for i in 0..threads {
        assert_eq!(sample(&text, &format!("gauge_worker{i}")), Some(1.0));
    }
}

#[test]
fn sink_is_usable_behind_trait_object() {
    let sink: Arc<dyn MetricSink> = Arc::new(bare_sink());
    sink.set_gauge(&["via", "trait"], 9.0);
    sink.incr_counter(&["via", "trait", "total"], 1.0);
    sink.add_sample(&["via", "trait", "latency"], 1.0);
    sink.emit_key(&["via", "trait"], 1.0);
}

// =============================================================================
// Standard collectors
// =============================================================================

#[test]
fn default_sink_exposes_runtime_series() {
    let sink = PrometheusSink::with_defaults().unwrap();
    let text = sink.render();
    assert!(text.contains("promsink_build_info{version="));
    assert!(text.contains("promsink_uptime_seconds"));
}

//! Prometheus metrics for the control plane: SLO gauges, lifecycle latency
//! histograms, replay integrity and signal-baseline counts.

use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Stop SLO target in seconds.
pub const STOP_SLO_SECONDS: f64 = 3.0;
/// Restart SLO target in seconds.
pub const RESTART_SLO_SECONDS: f64 = 5.0;

pub struct Metrics {
    registry: Registry,
    http_requests: CounterVec,
    stop_latency: Histogram,
    restart_latency: Histogram,
    stop_total: Gauge,
    stop_within_slo: Gauge,
    restart_total: Gauge,
    restart_within_slo: Gauge,
    stop_compliance: Gauge,
    restart_compliance: Gauge,
    decisions: CounterVec,
    incidents: prometheus::Counter,
    restarts_blocked: prometheus::Counter,
    replay_verifications: CounterVec,
    baseline_buckets: GaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let metrics = Self {
            http_requests: CounterVec::new(
                Opts::new("flowforge_http_requests_total", "HTTP requests by route and status"),
                &["method", "route", "status"],
            )
            .unwrap_or_else(|e| panic_on_register(e)),
            stop_latency: Histogram::with_opts(
                HistogramOpts::new(
                    "flowforge_stop_latency_seconds",
                    "Observed stop latency",
                )
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 3.0, 5.0, 10.0]),
            )
            .unwrap_or_else(|e| panic_on_register(e)),
            restart_latency: Histogram::with_opts(
                HistogramOpts::new(
                    "flowforge_restart_latency_seconds",
                    "Observed restart latency",
                )
                .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 3.0, 5.0, 8.0, 15.0]),
            )
            .unwrap_or_else(|e| panic_on_register(e)),
            stop_total: gauge("flowforge_stop_operations_total", "Completed stop operations"),
            stop_within_slo: gauge(
                "flowforge_stop_operations_within_slo",
                "Stops completed within the SLO target",
            ),
            restart_total: gauge(
                "flowforge_restart_operations_total",
                "Completed restart operations",
            ),
            restart_within_slo: gauge(
                "flowforge_restart_operations_within_slo",
                "Restarts completed within the SLO target",
            ),
            stop_compliance: gauge(
                "flowforge_stop_slo_compliance_ratio",
                "Share of stops within the SLO target",
            ),
            restart_compliance: gauge(
                "flowforge_restart_slo_compliance_ratio",
                "Share of restarts within the SLO target",
            ),
            decisions: CounterVec::new(
                Opts::new("flowforge_decisions_total", "Decisions recorded by action"),
                &["action"],
            )
            .unwrap_or_else(|e| panic_on_register(e)),
            incidents: prometheus::Counter::with_opts(Opts::new(
                "flowforge_incidents_total",
                "Incidents recorded",
            ))
            .unwrap_or_else(|e| panic_on_register(e)),
            restarts_blocked: prometheus::Counter::with_opts(Opts::new(
                "flowforge_restarts_blocked_total",
                "Restart requests denied by the budget",
            ))
            .unwrap_or_else(|e| panic_on_register(e)),
            replay_verifications: CounterVec::new(
                Opts::new(
                    "flowforge_replay_verifications_total",
                    "Replay digest verifications by verdict",
                ),
                &["verdict"],
            )
            .unwrap_or_else(|e| panic_on_register(e)),
            baseline_buckets: GaugeVec::new(
                Opts::new(
                    "flowforge_signal_baseline_buckets",
                    "Signal-baseline buckets by status",
                ),
                &["status"],
            )
            .unwrap_or_else(|e| panic_on_register(e)),
            registry,
        };

        let slo_targets = [
            (
                gauge(
                    "flowforge_stop_slo_target_seconds",
                    "Target seconds for a bounded stop",
                ),
                STOP_SLO_SECONDS,
            ),
            (
                gauge(
                    "flowforge_restart_slo_target_seconds",
                    "Target seconds for a bounded restart",
                ),
                RESTART_SLO_SECONDS,
            ),
        ];
        for (g, v) in slo_targets {
            g.set(v);
            let _ = metrics.registry.register(Box::new(g));
        }

        for collector in [
            Box::new(metrics.http_requests.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(metrics.stop_latency.clone()),
            Box::new(metrics.restart_latency.clone()),
            Box::new(metrics.stop_total.clone()),
            Box::new(metrics.stop_within_slo.clone()),
            Box::new(metrics.restart_total.clone()),
            Box::new(metrics.restart_within_slo.clone()),
            Box::new(metrics.stop_compliance.clone()),
            Box::new(metrics.restart_compliance.clone()),
            Box::new(metrics.decisions.clone()),
            Box::new(metrics.incidents.clone()),
            Box::new(metrics.restarts_blocked.clone()),
            Box::new(metrics.replay_verifications.clone()),
            Box::new(metrics.baseline_buckets.clone()),
        ] {
            let _ = metrics.registry.register(collector);
        }

        metrics
    }

    pub fn http_request(&self, method: &str, route: &str, status: u16) {
        self.http_requests
            .with_label_values(&[method, route, &status.to_string()])
            .inc();
    }

    pub fn observe_stop(&self, elapsed: Duration) {
        self.stop_latency.observe(elapsed.as_secs_f64());
        self.stop_total.inc();
        if elapsed.as_secs_f64() <= STOP_SLO_SECONDS {
            self.stop_within_slo.inc();
        }
        set_ratio(&self.stop_compliance, &self.stop_within_slo, &self.stop_total);
    }

    pub fn observe_restart(&self, elapsed: Duration) {
        self.restart_latency.observe(elapsed.as_secs_f64());
        self.restart_total.inc();
        if elapsed.as_secs_f64() <= RESTART_SLO_SECONDS {
            self.restart_within_slo.inc();
        }
        set_ratio(
            &self.restart_compliance,
            &self.restart_within_slo,
            &self.restart_total,
        );
    }

    pub fn decision_recorded(&self, action: &str) {
        self.decisions.with_label_values(&[action]).inc();
    }

    pub fn incident_recorded(&self) {
        self.incidents.inc();
    }

    pub fn restart_blocked(&self) {
        self.restarts_blocked.inc();
    }

    pub fn replay_verified(&self, verdict: &str) {
        self.replay_verifications.with_label_values(&[verdict]).inc();
    }

    pub fn baseline_bucket_counts(&self, counts: &[(String, usize)]) {
        for (status, count) in counts {
            self.baseline_buckets
                .with_label_values(&[status])
                .set(*count as f64);
        }
    }

    /// Prometheus text exposition.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if encoder.encode(&self.registry.gather(), &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn gauge(name: &str, help: &str) -> Gauge {
    Gauge::with_opts(Opts::new(name, help)).unwrap_or_else(|e| panic_on_register(e))
}

fn set_ratio(ratio: &Gauge, hits: &Gauge, total: &Gauge) {
    let total = total.get();
    if total > 0.0 {
        ratio.set(hits.get() / total);
    }
}

fn panic_on_register<T>(e: prometheus::Error) -> T {
    // Metric names are static literals; a registration failure is a
    // programming error caught by the metrics tests.
    unreachable!("metric construction failed: {e}")
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;

use crate::snapshot::Snapshot;
use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub hostboard_poll_cycles_total: Counter,
    pub hostboard_renders_total: Counter,
    pub hostboard_fetch_errors_total: CounterVec,
    pub hostboard_stale_snapshots_total: Counter,
    pub hostboard_speedtest_activations_total: CounterVec,
    pub hostboard_last_render_timestamp_seconds: Gauge,
    pub hostboard_remote_cpu_usage_percent: Gauge,
    pub hostboard_remote_memory_used_bytes: Gauge,
    pub hostboard_remote_memory_total_bytes: Gauge,
    pub hostboard_remote_tcp_connections: Gauge,
    pub hostboard_remote_udp_connections: Gauge,
    pub hostboard_remote_speedtest_running: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let hostboard_poll_cycles_total = Counter::with_opts(opts!(
            "hostboard_poll_cycles_total",
            "Poll cycles started"
        ))?;
        let hostboard_renders_total = Counter::with_opts(opts!(
            "hostboard_renders_total",
            "Snapshots applied to the display surface"
        ))?;
        let hostboard_fetch_errors_total = CounterVec::new(
            opts!(
                "hostboard_fetch_errors_total",
                "Failed snapshot fetches by failure kind"
            ),
            &["kind"],
        )?;
        let hostboard_stale_snapshots_total = Counter::with_opts(opts!(
            "hostboard_stale_snapshots_total",
            "Snapshots dropped because a newer cycle had already rendered"
        ))?;
        let hostboard_speedtest_activations_total = CounterVec::new(
            opts!(
                "hostboard_speedtest_activations_total",
                "Speed test trigger activations by outcome"
            ),
            &["outcome"],
        )?;
        let hostboard_last_render_timestamp_seconds = Gauge::with_opts(opts!(
            "hostboard_last_render_timestamp_seconds",
            "Unix timestamp of the last applied snapshot"
        ))?;
        let hostboard_remote_cpu_usage_percent = Gauge::with_opts(opts!(
            "hostboard_remote_cpu_usage_percent",
            "CPU usage reported by the last snapshot"
        ))?;
        let hostboard_remote_memory_used_bytes = Gauge::with_opts(opts!(
            "hostboard_remote_memory_used_bytes",
            "Used memory reported by the last snapshot"
        ))?;
        let hostboard_remote_memory_total_bytes = Gauge::with_opts(opts!(
            "hostboard_remote_memory_total_bytes",
            "Total memory reported by the last snapshot"
        ))?;
        let hostboard_remote_tcp_connections = Gauge::with_opts(opts!(
            "hostboard_remote_tcp_connections",
            "TCP connection count reported by the last snapshot"
        ))?;
        let hostboard_remote_udp_connections = Gauge::with_opts(opts!(
            "hostboard_remote_udp_connections",
            "UDP connection count reported by the last snapshot"
        ))?;
        let hostboard_remote_speedtest_running = Gauge::with_opts(opts!(
            "hostboard_remote_speedtest_running",
            "1 while the producer reports a running speed test"
        ))?;

        register(&registry, &hostboard_poll_cycles_total)?;
        register(&registry, &hostboard_renders_total)?;
        register(&registry, &hostboard_fetch_errors_total)?;
        register(&registry, &hostboard_stale_snapshots_total)?;
        register(&registry, &hostboard_speedtest_activations_total)?;
        register(&registry, &hostboard_last_render_timestamp_seconds)?;
        register(&registry, &hostboard_remote_cpu_usage_percent)?;
        register(&registry, &hostboard_remote_memory_used_bytes)?;
        register(&registry, &hostboard_remote_memory_total_bytes)?;
        register(&registry, &hostboard_remote_tcp_connections)?;
        register(&registry, &hostboard_remote_udp_connections)?;
        register(&registry, &hostboard_remote_speedtest_running)?;

        Ok(Arc::new(Self {
            registry,
            hostboard_poll_cycles_total,
            hostboard_renders_total,
            hostboard_fetch_errors_total,
            hostboard_stale_snapshots_total,
            hostboard_speedtest_activations_total,
            hostboard_last_render_timestamp_seconds,
            hostboard_remote_cpu_usage_percent,
            hostboard_remote_memory_used_bytes,
            hostboard_remote_memory_total_bytes,
            hostboard_remote_tcp_connections,
            hostboard_remote_udp_connections,
            hostboard_remote_speedtest_running,
        }))
    }

    pub fn inc_poll_cycle(&self) {
        self.hostboard_poll_cycles_total.inc();
    }

    pub fn inc_fetch_error(&self, kind: &str) {
        self.hostboard_fetch_errors_total
            .with_label_values(&[kind])
            .inc();
    }

    pub fn inc_stale_snapshot(&self) {
        self.hostboard_stale_snapshots_total.inc();
    }

    pub fn inc_speedtest_activation(&self, outcome: &str) {
        self.hostboard_speedtest_activations_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn observe_render(&self, snapshot: &Snapshot, now_unix: i64) {
        self.hostboard_renders_total.inc();
        self.hostboard_last_render_timestamp_seconds
            .set(now_unix as f64);
        self.hostboard_remote_cpu_usage_percent
            .set(snapshot.cpu.usage);
        self.hostboard_remote_memory_used_bytes
            .set(snapshot.memory.used as f64);
        self.hostboard_remote_memory_total_bytes
            .set(snapshot.memory.total as f64);
        self.hostboard_remote_tcp_connections
            .set(snapshot.network.tcp_count as f64);
        self.hostboard_remote_udp_connections
            .set(snapshot.network.udp_count as f64);
        self.hostboard_remote_speedtest_running
            .set(if snapshot.speedtest.running { 1.0 } else { 0.0 });
    }

    /// Unix time of the last applied snapshot, `None` before the first one.
    pub fn last_render_unix(&self) -> Option<i64> {
        let ts = self.hostboard_last_render_timestamp_seconds.get() as i64;
        (ts > 0).then_some(ts)
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_updates_remote_gauges() {
        let metrics = Metrics::new().expect("metrics init");
        let mut snapshot = Snapshot::default();
        snapshot.cpu.usage = 41.5;
        snapshot.network.tcp_count = 12;
        snapshot.speedtest.running = true;

        assert_eq!(metrics.last_render_unix(), None);
        metrics.observe_render(&snapshot, 1_700_000_000);

        assert_eq!(metrics.last_render_unix(), Some(1_700_000_000));
        let text = String::from_utf8(metrics.encode_metrics().unwrap()).unwrap();
        assert!(text.contains("hostboard_remote_cpu_usage_percent 41.5"));
        assert!(text.contains("hostboard_remote_tcp_connections 12"));
        assert!(text.contains("hostboard_remote_speedtest_running 1"));
        assert!(text.contains("hostboard_renders_total 1"));
    }

    #[test]
    fn fetch_errors_are_labelled_by_kind() {
        let metrics = Metrics::new().expect("metrics init");
        metrics.inc_fetch_error("transport");
        metrics.inc_fetch_error("transport");
        metrics.inc_fetch_error("parse");

        let text = String::from_utf8(metrics.encode_metrics().unwrap()).unwrap();
        assert!(text.contains("hostboard_fetch_errors_total{kind=\"transport\"} 2"));
        assert!(text.contains("hostboard_fetch_errors_total{kind=\"parse\"} 1"));
    }
}

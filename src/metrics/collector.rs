// src/metrics/collector.rs
use crate::check::Outcome;
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Instant;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Check metrics
    pub checks_total: IntCounterVec,
    pub check_duration_seconds: HistogramVec,
    pub check_passing: IntGaugeVec,
    pub checks_configured: IntGauge,

    // History metrics
    pub history_entries: IntGaugeVec,
    pub log_write_failures_total: IntCounter,
    pub log_lines_dropped_total: IntCounter,

    // Status page metrics
    pub status_requests_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let checks_total = IntCounterVec::new(
            Opts::new("dns_checks_total", "Total DNS check evaluations"),
            &["check", "server", "outcome"],
        )?;
        registry.register(Box::new(checks_total.clone()))?;

        let check_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "dns_check_duration_seconds",
                "DNS check evaluation duration in seconds",
            ),
            &["check", "server"],
        )?;
        registry.register(Box::new(check_duration_seconds.clone()))?;

        let check_passing = IntGaugeVec::new(
            Opts::new(
                "dns_check_passing",
                "Latest check result (1=PASS, 0=anything else)",
            ),
            &["check"],
        )?;
        registry.register(Box::new(check_passing.clone()))?;

        let checks_configured =
            IntGauge::new("dns_checks_configured", "Number of configured checks")?;
        registry.register(Box::new(checks_configured.clone()))?;

        let history_entries = IntGaugeVec::new(
            Opts::new(
                "dns_history_entries",
                "Results retained in the in-memory history window",
            ),
            &["check"],
        )?;
        registry.register(Box::new(history_entries.clone()))?;

        let log_write_failures_total = IntCounter::new(
            "dns_log_write_failures_total",
            "Failed writes to per-check history logs",
        )?;
        registry.register(Box::new(log_write_failures_total.clone()))?;

        let log_lines_dropped_total = IntCounter::new(
            "dns_log_lines_dropped_total",
            "History log lines dropped because the write queue was full",
        )?;
        registry.register(Box::new(log_lines_dropped_total.clone()))?;

        let status_requests_total = IntCounterVec::new(
            Opts::new("dns_status_requests_total", "Status page requests"),
            &["code"],
        )?;
        registry.register(Box::new(status_requests_total.clone()))?;

        Ok(Self {
            checks_total,
            check_duration_seconds,
            check_passing,
            checks_configured,
            history_entries,
            log_write_failures_total,
            log_lines_dropped_total,
            status_requests_total,
        })
    }

    pub fn record_check(
        &self,
        check: &str,
        server: &str,
        outcome: Outcome,
        duration: std::time::Duration,
    ) {
        self.checks_total
            .with_label_values(&[check, server, outcome.as_str()])
            .inc();

        self.check_duration_seconds
            .with_label_values(&[check, server])
            .observe(duration.as_secs_f64());
    }

    pub fn update_check_status(&self, check: &str, outcome: Outcome) {
        let value = if outcome == Outcome::Pass { 1 } else { 0 };
        self.check_passing.with_label_values(&[check]).set(value);
    }

    pub fn update_history_size(&self, check: &str, entries: usize) {
        self.history_entries
            .with_label_values(&[check])
            .set(entries as i64);
    }

    pub fn record_log_write_failure(&self) {
        self.log_write_failures_total.inc();
    }

    pub fn record_log_line_dropped(&self) {
        self.log_lines_dropped_total.inc();
    }

    pub fn record_status_request(&self, status_code: u16) {
        self.status_requests_total
            .with_label_values(&[&status_code.to_string()])
            .inc();
    }

    pub fn set_checks_configured(&self, count: usize) {
        self.checks_configured.set(count as i64);
    }
}

// Helper for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

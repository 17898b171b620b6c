//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges the dispatcher, reconciler and front-end
//!   update as jobs move through the system.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{TelemetryError, TelemetryResult};

/// Prometheus-backed metrics registry shared across tasks.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    lookups_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
    jobs_dispatched_total: IntCounter,
    job_outcomes_total: IntCounterVec,
    reconciliations_total: IntCounterVec,
    protocol_violations_total: IntCounter,
    active_workers: IntGauge,
    queued_jobs: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Workers currently running.
    pub active_workers: i64,
    /// Jobs waiting for a worker slot.
    pub queued_jobs: i64,
    /// Total jobs handed to the dispatcher.
    pub jobs_dispatched_total: u64,
    /// Total terminal messages received more than once.
    pub protocol_violations_total: u64,
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> TelemetryResult<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn counter(name: &'static str, help: &str) -> TelemetryResult<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn gauge(name: &'static str, help: &str) -> TelemetryResult<IntGauge> {
    IntGauge::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> TelemetryResult<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> TelemetryResult<Self> {
        let registry = Registry::new();

        let lookups_total = counter_vec(
            "lookups_total",
            "Front-end lookups by result",
            &["result"],
        )?;
        let events_emitted_total = counter_vec(
            "events_emitted_total",
            "Domain events emitted by type",
            &["type"],
        )?;
        let jobs_dispatched_total = counter("jobs_dispatched_total", "Jobs handed to workers")?;
        let job_outcomes_total = counter_vec(
            "job_outcomes_total",
            "Worker terminal outcomes by kind",
            &["outcome"],
        )?;
        let reconciliations_total = counter_vec(
            "reconciliations_total",
            "Storage events processed by the reconciler by result",
            &["result"],
        )?;
        let protocol_violations_total = counter(
            "worker_protocol_violations_total",
            "Extra terminal messages received from workers",
        )?;
        let active_workers = gauge("active_workers", "Workers currently running")?;
        let queued_jobs = gauge("queued_jobs", "Jobs waiting for a worker slot")?;

        register(&registry, "lookups_total", &lookups_total)?;
        register(&registry, "events_emitted_total", &events_emitted_total)?;
        register(&registry, "jobs_dispatched_total", &jobs_dispatched_total)?;
        register(&registry, "job_outcomes_total", &job_outcomes_total)?;
        register(&registry, "reconciliations_total", &reconciliations_total)?;
        register(
            &registry,
            "worker_protocol_violations_total",
            &protocol_violations_total,
        )?;
        register(&registry, "active_workers", &active_workers)?;
        register(&registry, "queued_jobs", &queued_jobs)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                lookups_total,
                events_emitted_total,
                jobs_dispatched_total,
                job_outcomes_total,
                reconciliations_total,
                protocol_violations_total,
                active_workers,
                queued_jobs,
            }),
        })
    }

    /// Increment the lookup counter for the given result label.
    pub fn inc_lookup(&self, result: &str) {
        self.inner.lookups_total.with_label_values(&[result]).inc();
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Count a dispatched job.
    pub fn inc_dispatched(&self) {
        self.inner.jobs_dispatched_total.inc();
    }

    /// Count a terminal job outcome.
    pub fn inc_job_outcome(&self, outcome: &str) {
        self.inner
            .job_outcomes_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Count a processed storage event.
    pub fn inc_reconciliation(&self, result: &str) {
        self.inner
            .reconciliations_total
            .with_label_values(&[result])
            .inc();
    }

    /// Count an extra terminal message.
    pub fn inc_protocol_violation(&self) {
        self.inner.protocol_violations_total.inc();
    }

    /// Adjust the running worker gauge.
    pub fn add_active_workers(&self, delta: i64) {
        self.inner.active_workers.add(delta);
    }

    /// Adjust the queued job gauge.
    pub fn add_queued_jobs(&self, delta: i64) {
        self.inner.queued_jobs.add(delta);
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_workers: self.inner.active_workers.get(),
            queued_jobs: self.inner.queued_jobs.get(),
            jobs_dispatched_total: self.inner.jobs_dispatched_total.get(),
            protocol_violations_total: self.inner.protocol_violations_total.get(),
        }
    }
}

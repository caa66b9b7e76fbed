//! Delivery metrics exported in Prometheus text format

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use trainhub_common::{Error, Result};

/// Counters and timings for the delivery sweeps
#[derive(Clone)]
pub struct DeliveryMetrics {
    registry: Registry,
    emails: IntCounterVec,
    schedules: IntCounterVec,
    simulation_targets: IntCounterVec,
    sweep_duration: HistogramVec,
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("Metrics error: {}", e))
}

impl DeliveryMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("trainhub".to_string()), None)
            .map_err(metrics_error)?;

        let emails = IntCounterVec::new(
            Opts::new("emails_total", "Individual emails by outcome"),
            &["outcome"],
        )
        .map_err(metrics_error)?;
        let schedules = IntCounterVec::new(
            Opts::new("scheduled_emails_total", "Scheduled email dispatches by outcome"),
            &["outcome"],
        )
        .map_err(metrics_error)?;
        let simulation_targets = IntCounterVec::new(
            Opts::new("simulation_targets_total", "Simulation launch targets by outcome"),
            &["outcome"],
        )
        .map_err(metrics_error)?;
        let sweep_duration = HistogramVec::new(
            HistogramOpts::new("sweep_duration_seconds", "Duration of one job run"),
            &["job"],
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(emails.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(schedules.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(simulation_targets.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(sweep_duration.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            emails,
            schedules,
            simulation_targets,
            sweep_duration,
        })
    }

    pub fn record_email(&self, succeeded: bool) {
        let outcome = if succeeded { "sent" } else { "failed" };
        self.emails.with_label_values(&[outcome]).inc();
    }

    /// `outcome` is the resulting schedule status, or "skipped"
    pub fn record_schedule(&self, outcome: &str) {
        self.schedules.with_label_values(&[outcome]).inc();
    }

    pub fn record_simulation_target(&self, succeeded: bool) {
        let outcome = if succeeded { "launched" } else { "failed" };
        self.simulation_targets.with_label_values(&[outcome]).inc();
    }

    pub fn observe_sweep(&self, job: &str, seconds: f64) {
        self.sweep_duration.with_label_values(&[job]).observe(seconds);
    }

    /// Render all metrics in the text exposition format
    pub fn encode(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(e.to_string()))
    }
}

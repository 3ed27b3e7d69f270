use std::time::Duration;

use mald_core::JobMetrics;
use mald_model::JobStatus;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    admissions: IntCounterVec,
    active_jobs: IntGauge,
    jobs_completed: IntCounterVec,
    job_duration: Histogram,
    results_expired: IntCounter,
}

impl PrometheusMetrics {
    /// Register all collectors in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Register all collectors in `registry`.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let admissions = IntCounterVec::new(
            Opts::new("mald_admissions_total", "Admission decisions for large-file jobs"),
            &["decision"],
        )?;
        let active_jobs = IntGauge::new("mald_active_jobs", "Admission slots currently held")?;
        let jobs_completed = IntCounterVec::new(
            Opts::new("mald_jobs_completed_total", "Finished classification jobs by status"),
            &["status"],
        )?;
        let job_duration = Histogram::with_opts(
            HistogramOpts::new(
                "mald_job_duration_seconds",
                "Time from job start to admission slot release",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        )?;
        let results_expired = IntCounter::new(
            "mald_results_expired_total",
            "Results removed by the retention sweeper",
        )?;

        registry.register(Box::new(admissions.clone()))?;
        registry.register(Box::new(active_jobs.clone()))?;
        registry.register(Box::new(jobs_completed.clone()))?;
        registry.register(Box::new(job_duration.clone()))?;
        registry.register(Box::new(results_expired.clone()))?;

        Ok(Self {
            registry,
            admissions,
            active_jobs,
            jobs_completed,
            job_duration,
            results_expired,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition format, ready to serve.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl JobMetrics for PrometheusMetrics {
    fn record_admission(&self, accepted: bool) {
        let decision = if accepted { "accepted" } else { "rejected" };
        self.admissions.with_label_values(&[decision]).inc();
    }

    fn slot_acquired(&self) {
        self.active_jobs.inc();
    }

    fn slot_released(&self) {
        self.active_jobs.dec();
    }

    fn record_job_finished(&self, status: &JobStatus, elapsed: Duration) {
        self.jobs_completed.with_label_values(&[status.label()]).inc();
        self.job_duration.observe(elapsed.as_secs_f64());
    }

    fn record_results_expired(&self, count: usize) {
        self.results_expired.inc_by(count as u64);
    }
}

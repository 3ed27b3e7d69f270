use std::{sync::Arc, time::Duration};

use mald_model::JobStatus;

/// Sink for job subsystem metrics.
///
/// Implementations must be cheap; calls happen on the submission path.
pub trait JobMetrics: Send + Sync + 'static {
    fn record_admission(&self, accepted: bool);
    /// One admission slot was taken. Paired with [`slot_released`](Self::slot_released).
    fn slot_acquired(&self);
    fn slot_released(&self);
    fn record_job_finished(&self, status: &JobStatus, elapsed: Duration);
    fn record_results_expired(&self, count: usize);
}

pub type MetricsHandle = Arc<dyn JobMetrics>;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl JobMetrics for NoopMetrics {
    fn record_admission(&self, _accepted: bool) {}
    fn slot_acquired(&self) {}
    fn slot_released(&self) {}
    fn record_job_finished(&self, _status: &JobStatus, _elapsed: Duration) {}
    fn record_results_expired(&self, _count: usize) {}
}

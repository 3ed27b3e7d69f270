//! Prometheus backend for the job subsystem metrics.
//!
//! [`PrometheusMetrics`] implements [`mald_core::JobMetrics`]; hand it to
//! `JobService::new` and the sweeper, then expose [`PrometheusMetrics::encode`]
//! from whatever HTTP framework serves `/metrics`.
//!
//! ## Metrics
//! - `mald_admissions_total{decision}` - Counter (`accepted` | `rejected`)
//! - `mald_active_jobs` - Gauge, held admission slots
//! - `mald_jobs_completed_total{status}` - Counter (`stored` | `classification_failed` | `store_failed`)
//! - `mald_job_duration_seconds` - Histogram, runner start to slot release
//! - `mald_results_expired_total` - Counter, entries removed by the retention sweeper

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};

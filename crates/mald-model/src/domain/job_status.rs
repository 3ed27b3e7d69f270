use std::time::Duration;

use crate::JobId;

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Classification succeeded and the outcome was persisted.
    Stored,
    /// The classifier failed, timed out or panicked; nothing was persisted.
    ClassificationFailed { reason: String },
    /// Classification succeeded but the outcome could not be persisted.
    StoreFailed { reason: String },
}

impl JobStatus {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Stored => "stored",
            JobStatus::ClassificationFailed { .. } => "classification_failed",
            JobStatus::StoreFailed { .. } => "store_failed",
        }
    }

    #[inline]
    pub fn is_stored(&self) -> bool {
        matches!(self, JobStatus::Stored)
    }
}

/// Summary a finished job runner resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Whether the uploaded artifact was deleted successfully.
    pub artifact_released: bool,
    /// Wall time from runner start to slot release.
    pub elapsed: Duration,
}

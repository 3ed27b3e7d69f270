use async_trait::async_trait;
use mald_model::{JobId, Outcome};

use crate::{error::ApiError, upload::Upload};

/// Backend of the classification API.
///
/// Use the provided [`ServiceAdapter`](crate::ServiceAdapter), or implement
/// it to put extra logic (auth, quotas) in front of the job service.
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Classify a small file synchronously.
    async fn classify_file(&self, upload: Upload) -> Result<Outcome, ApiError>;

    /// Queue a large file for background classification under `result_id`.
    async fn submit_large_file(&self, result_id: JobId, upload: Upload) -> Result<JobId, ApiError>;

    /// Stored outcome of a background job.
    async fn search_result(&self, result_id: &JobId) -> Result<Outcome, ApiError>;
}

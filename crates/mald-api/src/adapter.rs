use std::sync::Arc;

use async_trait::async_trait;
use mald_core::JobService;
use mald_model::{JobId, Outcome};

use crate::{error::ApiError, handler::ApiHandler, upload::Upload};

/// Adapter that bridges `JobService` to `ApiHandler`.
pub struct ServiceAdapter {
    service: Arc<JobService>,
}

impl ServiceAdapter {
    pub fn new(service: Arc<JobService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ApiHandler for ServiceAdapter {
    async fn classify_file(&self, upload: Upload) -> Result<Outcome, ApiError> {
        Ok(self
            .service
            .classify_now(&upload.unique_key, upload.data)
            .await?)
    }

    async fn submit_large_file(&self, result_id: JobId, upload: Upload) -> Result<JobId, ApiError> {
        let ticket = self
            .service
            .submit_upload(result_id, &upload.unique_key, upload.data)
            .await?;
        Ok(ticket.into_job_id())
    }

    async fn search_result(&self, result_id: &JobId) -> Result<Outcome, ApiError> {
        self.service
            .result(result_id)
            .await?
            .ok_or_else(|| ApiError::ResultNotFound(result_id.to_string()))
    }
}

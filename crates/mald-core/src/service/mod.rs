use std::sync::Arc;

use mald_model::{JobId, Outcome};
use tracing::{error, info, instrument, warn};

use crate::{
    admission::AdmissionController,
    error::ServiceError,
    external::{BlobStore, Classifier},
    metrics::MetricsHandle,
    runner::JobRunner,
    scheduler::{JobScheduler, JobTicket, SchedulerConfig, SubmissionResult},
    store::ResultStore,
};

/// Entry point used by transports: upload, submit, classify inline, poll.
pub struct JobService {
    scheduler: JobScheduler,
    store: ResultStore,
    classifier: Arc<dyn Classifier>,
    blobs: Arc<dyn BlobStore>,
}

impl JobService {
    pub fn new(
        config: SchedulerConfig,
        store: ResultStore,
        classifier: Arc<dyn Classifier>,
        blobs: Arc<dyn BlobStore>,
        metrics: MetricsHandle,
    ) -> Self {
        let admission = AdmissionController::new(config.max_concurrent_jobs)
            .with_metrics(Arc::clone(&metrics));
        let runner = JobRunner::new(Arc::clone(&classifier), Arc::clone(&blobs), store.clone())
            .with_classify_timeout(config.classify_timeout)
            .with_metrics(Arc::clone(&metrics));
        let scheduler =
            JobScheduler::new(Arc::new(admission), Arc::new(runner)).with_metrics(metrics);

        info!(
            max_concurrent_jobs = config.max_concurrent_jobs,
            classify_timeout = ?config.classify_timeout,
            retention_secs = store.retention().as_secs(),
            "job service ready"
        );
        Self {
            scheduler,
            store,
            classifier,
            blobs,
        }
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Upload `data` and hand it to the background scheduler.
    ///
    /// When admission is refused the freshly uploaded blob is deleted before
    /// [`ServiceError::Busy`] is returned.
    #[instrument(level = "debug", skip_all, fields(job_id = %job_id, key = %key, size = data.len()))]
    pub async fn submit_upload(
        &self,
        job_id: JobId,
        key: &str,
        data: Vec<u8>,
    ) -> Result<JobTicket, ServiceError> {
        let artifact = self.blobs.upload(key, data).await.map_err(ServiceError::Upload)?;

        match self.scheduler.submit(job_id, artifact.clone()) {
            SubmissionResult::Accepted(ticket) => Ok(ticket),
            SubmissionResult::Rejected(reason) => {
                if let Err(e) = self.blobs.delete(&artifact).await {
                    warn!(key = %artifact.key, error = %e, "failed to delete artifact of rejected job");
                }
                warn!(%reason, "large file rejected");
                Err(ServiceError::Busy)
            }
        }
    }

    /// Small-file path: upload, classify inline, always delete the blob.
    #[instrument(level = "debug", skip_all, fields(key = %key, size = data.len()))]
    pub async fn classify_now(&self, key: &str, data: Vec<u8>) -> Result<Outcome, ServiceError> {
        let artifact = self.blobs.upload(key, data).await.map_err(ServiceError::Upload)?;

        let result = self.classifier.classify(&artifact).await;
        if let Err(e) = self.blobs.delete(&artifact).await {
            warn!(key = %artifact.key, error = %e, "failed to delete uploaded artifact");
        }

        result.map_err(|e| {
            error!(error = %e, "inline classification failed");
            ServiceError::Classification(e)
        })
    }

    /// Stored outcome, if any. Pending, failed, expired and unknown jobs
    /// all read as `None`.
    pub async fn result(&self, job_id: &JobId) -> Result<Option<Outcome>, ServiceError> {
        Ok(self.store.read(job_id).await?)
    }

    /// Wait for every accepted job to settle.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use mald_model::{ArtifactHandle, JobId, JobReport, JobStatus, Outcome};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    admission::AdmissionPermit,
    external::{BlobStore, ClassifyError, Classifier},
    metrics::{MetricsHandle, NoopMetrics},
    store::ResultStore,
};

/// One admitted classification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub artifact: ArtifactHandle,
}

impl Job {
    pub fn new(id: JobId, artifact: ArtifactHandle) -> Self {
        Self { id, artifact }
    }
}

/// Executes admitted jobs: classify, persist, delete the artifact, free the slot.
///
/// Every step after classification runs whatever happened before it, and the
/// admission slot is the last thing released.
pub struct JobRunner {
    classifier: Arc<dyn Classifier>,
    blobs: Arc<dyn BlobStore>,
    store: ResultStore,
    metrics: MetricsHandle,
    classify_timeout: Option<Duration>,
}

impl JobRunner {
    pub fn new(classifier: Arc<dyn Classifier>, blobs: Arc<dyn BlobStore>, store: ResultStore) -> Self {
        Self {
            classifier,
            blobs,
            store,
            metrics: Arc::new(NoopMetrics),
            classify_timeout: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Bound the classifier call. `None` waits forever.
    pub fn with_classify_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.classify_timeout = timeout;
        self
    }

    #[instrument(level = "info", skip_all, fields(job_id = %job.id))]
    pub async fn run(&self, job: Job, permit: AdmissionPermit) -> JobReport {
        let started = Instant::now();
        debug!(key = %job.artifact.key, "job started");

        let status = match self.classify(&job.artifact).await {
            Ok(outcome) => self.persist(&job.id, outcome).await,
            Err(e) => {
                error!(error = %e, "classification failed; no result will be stored");
                JobStatus::ClassificationFailed {
                    reason: e.to_string(),
                }
            }
        };

        let artifact_released = self.release_artifact(&job.artifact).await;
        let elapsed = started.elapsed();
        self.metrics.record_job_finished(&status, elapsed);
        info!(
            status = status.label(),
            artifact_released,
            elapsed_ms = elapsed.as_millis() as u64,
            "job finished"
        );

        drop(permit);

        JobReport {
            job_id: job.id,
            status,
            artifact_released,
            elapsed,
        }
    }

    /// Run the classifier on its own task so a panic inside it is contained
    /// and reported as a failure of this job only.
    async fn classify(&self, artifact: &ArtifactHandle) -> Result<Outcome, ClassifyError> {
        let classifier = Arc::clone(&self.classifier);
        let artifact = artifact.clone();
        let mut call = tokio::spawn(async move { classifier.classify(&artifact).await });

        let joined = match self.classify_timeout {
            None => (&mut call).await,
            Some(limit) => match tokio::time::timeout(limit, &mut call).await {
                Ok(joined) => joined,
                Err(_) => {
                    call.abort();
                    return Err(ClassifyError::Timeout(limit));
                }
            },
        };

        joined.map_err(|e| ClassifyError::Aborted(e.to_string()))?
    }

    async fn persist(&self, job_id: &JobId, outcome: Outcome) -> JobStatus {
        match self.store.write(job_id, outcome).await {
            Ok(_) => JobStatus::Stored,
            Err(e) => {
                error!(error = %e, "failed to persist classification result");
                JobStatus::StoreFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn release_artifact(&self, artifact: &ArtifactHandle) -> bool {
        match self.blobs.delete(artifact).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %artifact.key, error = %e, "failed to delete uploaded artifact");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::AdmissionController;
    use crate::testkit::{FailingBackend, RecordingBlobStore, ScriptedClassifier, artifact, id, outcome};
    use serde_json::json;

    const WINDOW: Duration = Duration::from_secs(1800);

    struct Fixture {
        admission: Arc<AdmissionController>,
        classifier: Arc<ScriptedClassifier>,
        blobs: Arc<RecordingBlobStore>,
        store: ResultStore,
    }

    impl Fixture {
        fn new(classifier: ScriptedClassifier) -> Self {
            Self {
                admission: Arc::new(AdmissionController::new(1)),
                classifier: Arc::new(classifier),
                blobs: Arc::new(RecordingBlobStore::new()),
                store: ResultStore::in_memory(WINDOW),
            }
        }

        fn runner(&self) -> JobRunner {
            JobRunner::new(self.classifier.clone(), self.blobs.clone(), self.store.clone())
        }

        fn permit(&self) -> AdmissionPermit {
            self.admission.try_acquire_permit().expect("slot should be free")
        }
    }

    #[tokio::test]
    async fn success_stores_outcome_and_cleans_up() {
        let expected = outcome(json!({"verdict": "malicious", "score": 0.97}));
        let fx = Fixture::new(ScriptedClassifier::succeed(expected.clone()));

        let report = fx.runner().run(Job::new(id("C"), artifact("C")), fx.permit()).await;

        assert_eq!(report.status, JobStatus::Stored);
        assert!(report.artifact_released);
        assert_eq!(fx.store.read(&id("C")).await.unwrap(), Some(expected));
        assert_eq!(fx.blobs.deleted(), vec!["C".to_string()]);
        assert_eq!(fx.admission.active(), 0);
    }

    #[tokio::test]
    async fn classifier_failure_stores_nothing_but_cleans_up() {
        let fx = Fixture::new(ScriptedClassifier::fail("remote error"));

        let report = fx.runner().run(Job::new(id("F"), artifact("F")), fx.permit()).await;

        assert!(matches!(report.status, JobStatus::ClassificationFailed { .. }));
        assert_eq!(fx.store.read(&id("F")).await.unwrap(), None);
        assert_eq!(fx.blobs.deleted(), vec!["F".to_string()]);
        assert_eq!(fx.admission.active(), 0);
    }

    #[tokio::test]
    async fn classifier_panic_is_contained() {
        let fx = Fixture::new(ScriptedClassifier::panic());

        let report = fx.runner().run(Job::new(id("P"), artifact("P")), fx.permit()).await;

        assert!(matches!(
            report.status,
            JobStatus::ClassificationFailed { ref reason } if reason.contains("aborted")
        ));
        assert_eq!(fx.blobs.deleted(), vec!["P".to_string()]);
        assert_eq!(fx.admission.active(), 0);
    }

    #[tokio::test]
    async fn store_failure_still_releases_everything() {
        let fx = Fixture::new(ScriptedClassifier::succeed(outcome(json!({"v": 1}))));
        let failing = ResultStore::new(Arc::new(FailingBackend), WINDOW);
        let runner = JobRunner::new(fx.classifier.clone(), fx.blobs.clone(), failing);

        let report = runner.run(Job::new(id("S"), artifact("S")), fx.permit()).await;

        assert!(matches!(report.status, JobStatus::StoreFailed { .. }));
        assert_eq!(fx.blobs.deleted(), vec!["S".to_string()]);
        assert_eq!(fx.admission.active(), 0);
    }

    #[tokio::test]
    async fn delete_failure_is_reported_not_fatal() {
        let expected = outcome(json!({"v": 1}));
        let mut fx = Fixture::new(ScriptedClassifier::succeed(expected.clone()));
        fx.blobs = Arc::new(RecordingBlobStore::failing_deletes());

        let report = fx.runner().run(Job::new(id("D"), artifact("D")), fx.permit()).await;

        assert_eq!(report.status, JobStatus::Stored);
        assert!(!report.artifact_released);
        assert_eq!(fx.blobs.delete_attempts(), 1);
        assert_eq!(fx.store.read(&id("D")).await.unwrap(), Some(expected));
        assert_eq!(fx.admission.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_turns_hung_classifier_into_failure() {
        let fx = Fixture::new(
            ScriptedClassifier::succeed(outcome(json!({}))).with_delay(Duration::from_secs(3600)),
        );
        let runner = fx.runner().with_classify_timeout(Some(Duration::from_secs(30)));

        let report = runner.run(Job::new(id("T"), artifact("T")), fx.permit()).await;

        assert_eq!(
            report.status,
            JobStatus::ClassificationFailed {
                reason: ClassifyError::Timeout(Duration::from_secs(30)).to_string()
            }
        );
        assert_eq!(fx.store.read(&id("T")).await.unwrap(), None);
        assert_eq!(fx.blobs.deleted(), vec!["T".to_string()]);
        assert_eq!(fx.admission.active(), 0);
    }

    #[tokio::test]
    async fn slot_is_held_until_cleanup_finishes() {
        let fx = Fixture::new(ScriptedClassifier::succeed(outcome(json!({}))));
        let admission = Arc::clone(&fx.admission);
        fx.blobs.on_delete(move || admission.active());

        fx.runner().run(Job::new(id("O"), artifact("O")), fx.permit()).await;

        assert_eq!(fx.blobs.active_seen_on_delete(), Some(1));
        assert_eq!(fx.admission.active(), 0);
    }
}

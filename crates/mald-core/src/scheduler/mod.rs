use std::{fmt, sync::Arc, time::Duration};

use mald_model::{ArtifactHandle, DEFAULT_MAX_CONCURRENT_JOBS, JobId, JobReport};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use crate::{
    admission::AdmissionController,
    metrics::{MetricsHandle, NoopMetrics},
    runner::{Job, JobRunner},
};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Admission ceiling (`MAX_CONCURRENT_JOBS`).
    pub max_concurrent_jobs: usize,
    /// Upper bound on a single classifier call; `None` disables it.
    pub classify_timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            classify_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Every admission slot is taken.
    Busy,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Busy => f.write_str("busy"),
        }
    }
}

/// Handle to an accepted job.
///
/// Dropping it detaches the job; it keeps running in the background.
#[derive(Debug)]
pub struct JobTicket {
    job_id: JobId,
    handle: JoinHandle<JobReport>,
}

impl JobTicket {
    #[inline]
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the runner to settle.
    pub async fn join(self) -> Result<JobReport, JoinError> {
        self.handle.await
    }

    pub fn into_job_id(self) -> JobId {
        self.job_id
    }
}

#[derive(Debug)]
pub enum SubmissionResult {
    Accepted(JobTicket),
    Rejected(RejectReason),
}

impl SubmissionResult {
    #[inline]
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionResult::Accepted(_))
    }
}

/// Admits jobs and launches their runners without waiting for them.
pub struct JobScheduler {
    admission: Arc<AdmissionController>,
    runner: Arc<JobRunner>,
    tracker: TaskTracker,
    metrics: MetricsHandle,
}

impl JobScheduler {
    pub fn new(admission: Arc<AdmissionController>, runner: Arc<JobRunner>) -> Self {
        Self {
            admission,
            runner,
            tracker: TaskTracker::new(),
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Admit and launch a job, or refuse it when the system is at capacity.
    ///
    /// Never blocks on the job itself. On rejection nothing is launched and
    /// the artifact stays the caller's to clean up. Must be called from
    /// within a tokio runtime.
    #[instrument(level = "debug", skip_all, fields(job_id = %job_id))]
    pub fn submit(&self, job_id: JobId, artifact: ArtifactHandle) -> SubmissionResult {
        let Some(permit) = self.admission.try_acquire_permit() else {
            self.metrics.record_admission(false);
            warn!(
                capacity = self.admission.capacity(),
                "submission rejected: all admission slots busy"
            );
            return SubmissionResult::Rejected(RejectReason::Busy);
        };
        self.metrics.record_admission(true);

        let runner = Arc::clone(&self.runner);
        let job = Job::new(job_id.clone(), artifact);
        let handle = self
            .tracker
            .spawn(async move { runner.run(job, permit).await });

        debug!(active = self.admission.active(), "job accepted");
        SubmissionResult::Accepted(JobTicket { job_id, handle })
    }

    #[inline]
    pub fn active_jobs(&self) -> usize {
        self.admission.active()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.admission.capacity()
    }

    /// Number of runners that have not settled yet.
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every in-flight job to settle. Running jobs are not cancelled.
    pub async fn shutdown(&self) {
        self.tracker.close();
        info!(in_flight = self.tracker.len(), "waiting for in-flight jobs");
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ResultStore;
    use crate::testkit::{FailingBackend, RecordingBlobStore, ScriptedClassifier, artifact, id, outcome};
    use mald_model::JobStatus;
    use serde_json::json;

    const WINDOW: Duration = Duration::from_secs(1800);

    fn scheduler(
        capacity: usize,
        classifier: Arc<ScriptedClassifier>,
        blobs: Arc<RecordingBlobStore>,
        store: ResultStore,
    ) -> JobScheduler {
        let runner = JobRunner::new(classifier, blobs, store);
        JobScheduler::new(Arc::new(AdmissionController::new(capacity)), Arc::new(runner))
    }

    fn accepted(result: SubmissionResult) -> JobTicket {
        match result {
            SubmissionResult::Accepted(ticket) => ticket,
            SubmissionResult::Rejected(reason) => panic!("expected acceptance, got {reason}"),
        }
    }

    #[tokio::test]
    async fn second_job_rejected_while_first_runs() {
        let classifier = Arc::new(
            ScriptedClassifier::succeed(outcome(json!({"verdict": "benign"})))
                .with_delay(Duration::from_millis(100)),
        );
        let blobs = Arc::new(RecordingBlobStore::new());
        let store = ResultStore::in_memory(WINDOW);
        let sched = scheduler(1, classifier.clone(), blobs.clone(), store.clone());

        let a = accepted(sched.submit(id("A"), artifact("A")));
        assert_eq!(a.job_id(), &id("A"));

        let b = sched.submit(id("B"), artifact("B"));
        assert!(matches!(b, SubmissionResult::Rejected(RejectReason::Busy)));

        let report = a.join().await.unwrap();
        assert_eq!(report.status, JobStatus::Stored);
        assert_eq!(sched.active_jobs(), 0);

        let b = accepted(sched.submit(id("B"), artifact("B")));
        b.join().await.unwrap();

        assert_eq!(classifier.calls(), 2);
        assert_eq!(blobs.deleted(), vec!["A".to_string(), "B".to_string()]);
    }

    #[tokio::test]
    async fn rejected_submission_has_no_side_effects() {
        let classifier = Arc::new(
            ScriptedClassifier::succeed(outcome(json!({}))).with_delay(Duration::from_millis(50)),
        );
        let blobs = Arc::new(RecordingBlobStore::new());
        let store = ResultStore::in_memory(WINDOW);
        let sched = scheduler(1, classifier.clone(), blobs.clone(), store.clone());

        let a = accepted(sched.submit(id("A"), artifact("A")));
        for n in 0..5 {
            let rejected = sched.submit(id(&format!("X{n}")), artifact("X"));
            assert!(!rejected.is_accepted());
        }
        a.join().await.unwrap();

        assert_eq!(classifier.calls(), 1);
        assert_eq!(blobs.deleted(), vec!["A".to_string()]);
        for n in 0..5 {
            assert_eq!(store.read(&id(&format!("X{n}"))).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn result_is_pollable_after_job_settles() {
        let expected = outcome(json!({"verdict": "malicious", "score": 0.97}));
        let classifier = Arc::new(ScriptedClassifier::succeed(expected.clone()));
        let store = ResultStore::in_memory(WINDOW);
        let sched = scheduler(5, classifier, Arc::new(RecordingBlobStore::new()), store.clone());

        let ticket = accepted(sched.submit(id("C"), artifact("C")));
        ticket.join().await.unwrap();

        assert_eq!(store.read(&id("C")).await.unwrap(), Some(expected));
        assert_eq!(store.read(&id("Z")).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn ceiling_respected_under_burst() {
        let classifier = Arc::new(
            ScriptedClassifier::succeed(outcome(json!({}))).with_delay(Duration::from_millis(20)),
        );
        let blobs = Arc::new(RecordingBlobStore::new());
        let sched = Arc::new(scheduler(
            3,
            classifier.clone(),
            blobs.clone(),
            ResultStore::in_memory(WINDOW),
        ));

        let mut tickets = Vec::new();
        let mut rejected = 0;
        for round in 0..10 {
            for n in 0..5 {
                match sched.submit(id(&format!("j{round}-{n}")), artifact("k")) {
                    SubmissionResult::Accepted(t) => tickets.push(t),
                    SubmissionResult::Rejected(_) => rejected += 1,
                }
                assert!(sched.active_jobs() <= 3);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let accepted_count = tickets.len();
        for t in tickets {
            t.join().await.unwrap();
        }

        assert!(rejected > 0);
        assert_eq!(accepted_count + rejected, 50);
        assert_eq!(classifier.calls(), accepted_count);
        assert!(classifier.max_in_flight() <= 3);
        assert_eq!(blobs.deleted().len(), accepted_count);
        assert_eq!(sched.active_jobs(), 0);
    }

    #[tokio::test]
    async fn slots_return_on_every_exit_path() {
        let blobs = Arc::new(RecordingBlobStore::new());

        let failing = scheduler(
            1,
            Arc::new(ScriptedClassifier::fail("boom")),
            blobs.clone(),
            ResultStore::in_memory(WINDOW),
        );
        let report = accepted(failing.submit(id("F"), artifact("F"))).join().await.unwrap();
        assert!(matches!(report.status, JobStatus::ClassificationFailed { .. }));
        assert_eq!(failing.active_jobs(), 0);

        let panicking = scheduler(
            1,
            Arc::new(ScriptedClassifier::panic()),
            blobs.clone(),
            ResultStore::in_memory(WINDOW),
        );
        accepted(panicking.submit(id("P"), artifact("P"))).join().await.unwrap();
        assert_eq!(panicking.active_jobs(), 0);

        let unwritable = scheduler(
            1,
            Arc::new(ScriptedClassifier::succeed(outcome(json!({})))),
            blobs.clone(),
            ResultStore::new(Arc::new(FailingBackend), WINDOW),
        );
        let report = accepted(unwritable.submit(id("S"), artifact("S"))).join().await.unwrap();
        assert!(matches!(report.status, JobStatus::StoreFailed { .. }));
        assert_eq!(unwritable.active_jobs(), 0);

        assert_eq!(blobs.deleted(), vec!["F".to_string(), "P".to_string(), "S".to_string()]);
    }

    #[tokio::test]
    async fn shutdown_drains_detached_jobs() {
        let classifier = Arc::new(
            ScriptedClassifier::succeed(outcome(json!({"v": 1}))).with_delay(Duration::from_millis(30)),
        );
        let store = ResultStore::in_memory(WINDOW);
        let sched = scheduler(2, classifier, Arc::new(RecordingBlobStore::new()), store.clone());

        let a = accepted(sched.submit(id("A"), artifact("A"))).into_job_id();
        let b = accepted(sched.submit(id("B"), artifact("B"))).into_job_id();
        assert_eq!(sched.in_flight(), 2);

        sched.shutdown().await;

        assert_eq!(sched.in_flight(), 0);
        assert!(store.read(&a).await.unwrap().is_some());
        assert!(store.read(&b).await.unwrap().is_some());
    }
}

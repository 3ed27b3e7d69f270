//! Scripted collaborators shared by the unit tests.

use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use mald_model::{ArtifactHandle, JobId, Outcome, ResultEntry};

use crate::{
    error::StoreError,
    external::{BlobError, BlobStore, ClassifyError, Classifier},
    store::ResultBackend,
};

pub fn id(raw: &str) -> JobId {
    JobId::parse(raw).unwrap()
}

pub fn outcome(v: serde_json::Value) -> Outcome {
    Outcome::try_from(v).unwrap()
}

pub fn artifact(key: &str) -> ArtifactHandle {
    ArtifactHandle::new(key, format!("mem://{key}"))
}

enum Script {
    Succeed(Outcome),
    Fail(String),
    Panic,
}

pub struct ScriptedClassifier {
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClassifier {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn succeed(outcome: Outcome) -> Self {
        Self::with_script(Script::Succeed(outcome))
    }

    pub fn fail(reason: &str) -> Self {
        Self::with_script(Script::Fail(reason.to_string()))
    }

    pub fn panic() -> Self {
        Self::with_script(Script::Panic)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, _artifact: &ArtifactHandle) -> Result<Outcome, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.script {
            Script::Succeed(outcome) => Ok(outcome.clone()),
            Script::Fail(reason) => Err(ClassifyError::Rejected(reason.clone())),
            Script::Panic => panic!("classifier exploded"),
        }
    }
}

type DeleteProbe = Box<dyn Fn() -> usize + Send + Sync>;

#[derive(Default)]
pub struct RecordingBlobStore {
    uploads: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    delete_attempts: AtomicUsize,
    fail_deletes: bool,
    probe: Mutex<Option<DeleteProbe>>,
    probe_seen: Mutex<Option<usize>>,
}

impl RecordingBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    /// Sample `probe` when a delete arrives.
    pub fn on_delete(&self, probe: impl Fn() -> usize + Send + Sync + 'static) {
        *self.probe.lock().unwrap() = Some(Box::new(probe));
    }

    pub fn active_seen_on_delete(&self) -> Option<usize> {
        *self.probe_seen.lock().unwrap()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn delete_attempts(&self) -> usize {
        self.delete_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for RecordingBlobStore {
    async fn upload(&self, key: &str, _data: Vec<u8>) -> Result<ArtifactHandle, BlobError> {
        self.uploads.lock().unwrap().push(key.to_string());
        Ok(artifact(key))
    }

    async fn delete(&self, artifact: &ArtifactHandle) -> Result<(), BlobError> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(probe) = self.probe.lock().unwrap().as_ref() {
            *self.probe_seen.lock().unwrap() = Some(probe());
        }
        if self.fail_deletes {
            return Err(BlobError::Transport("connection reset".into()));
        }
        self.deleted.lock().unwrap().push(artifact.key.clone());
        Ok(())
    }
}

/// Backend whose writes always fail.
pub struct FailingBackend;

#[async_trait]
impl ResultBackend for FailingBackend {
    async fn put(&self, entry: &ResultEntry) -> Result<(), StoreError> {
        Err(StoreError::io(
            format!("/readonly/{}.json", entry.job_id),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        ))
    }

    async fn get(&self, _job_id: &JobId) -> Result<Option<ResultEntry>, StoreError> {
        Ok(None)
    }

    async fn remove(&self, _job_id: &JobId) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn purge(&self, _cutoff: SystemTime) -> Result<Vec<JobId>, StoreError> {
        Ok(Vec::new())
    }
}

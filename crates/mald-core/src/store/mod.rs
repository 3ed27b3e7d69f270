mod file;
pub use file::FileBackend;

mod memory;
pub use memory::MemoryBackend;

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use mald_model::{JobId, Outcome, ResultEntry};
use tracing::{debug, instrument};

use crate::{
    clock::{Clock, SystemClock},
    error::StoreError,
};

/// Physical storage for result entries.
///
/// Writes to different keys must be independent; operations on the same key
/// must be linearizable (last completed wins).
#[async_trait]
pub trait ResultBackend: Send + Sync + 'static {
    /// Insert or overwrite the entry for `entry.job_id`.
    async fn put(&self, entry: &ResultEntry) -> Result<(), StoreError>;

    async fn get(&self, job_id: &JobId) -> Result<Option<ResultEntry>, StoreError>;

    /// Remove the entry. Returns `false` if nothing was stored.
    async fn remove(&self, job_id: &JobId) -> Result<bool, StoreError>;

    /// Remove every entry created at or before `cutoff`; returns the removed ids.
    async fn purge(&self, cutoff: SystemTime) -> Result<Vec<JobId>, StoreError>;
}

/// Time-bounded, write-once-per-job result storage shared by every worker.
#[derive(Clone)]
pub struct ResultStore {
    backend: Arc<dyn ResultBackend>,
    clock: Arc<dyn Clock>,
    retention: Duration,
}

impl ResultStore {
    pub fn new(backend: Arc<dyn ResultBackend>, retention: Duration) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            retention,
        }
    }

    /// Store backed by a process-local map.
    pub fn in_memory(retention: Duration) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), retention)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[inline]
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Persist `outcome` stamped with the current time, replacing any
    /// previous entry for the same job.
    #[instrument(level = "debug", skip_all, fields(job_id = %job_id))]
    pub async fn write(&self, job_id: &JobId, outcome: Outcome) -> Result<ResultEntry, StoreError> {
        let entry = ResultEntry::new(job_id.clone(), outcome, self.clock.now());
        self.backend.put(&entry).await?;
        debug!("result stored");
        Ok(entry)
    }

    /// Outcome for `job_id`, or `None` when it was never written, failed,
    /// or has outlived the retention window.
    pub async fn read(&self, job_id: &JobId) -> Result<Option<Outcome>, StoreError> {
        Ok(self.read_entry(job_id).await?.map(|entry| entry.outcome))
    }

    /// Like [`read`](Self::read) but keeps the timestamp.
    ///
    /// Expired entries are hidden even if the sweeper has not removed them yet.
    pub async fn read_entry(&self, job_id: &JobId) -> Result<Option<ResultEntry>, StoreError> {
        let now = self.clock.now();
        Ok(self
            .backend
            .get(job_id)
            .await?
            .filter(|entry| !entry.is_expired(now, self.retention)))
    }

    /// Remove the entry. Idempotent.
    pub async fn expire(&self, job_id: &JobId) -> Result<(), StoreError> {
        if self.backend.remove(job_id).await? {
            debug!(%job_id, "result expired");
        }
        Ok(())
    }

    /// Remove every entry whose age has reached the retention window.
    pub async fn purge_expired(&self) -> Result<usize, StoreError> {
        let Some(cutoff) = self.clock.now().checked_sub(self.retention) else {
            return Ok(0);
        };
        let removed = self.backend.purge(cutoff).await?;
        for job_id in &removed {
            debug!(%job_id, "result expired");
        }
        Ok(removed.len())
    }
}

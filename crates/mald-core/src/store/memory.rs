use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::SystemTime,
};

use async_trait::async_trait;
use mald_model::{JobId, ResultEntry};

use crate::{error::StoreError, store::ResultBackend};

/// In-memory result backend. Shared across workers through `Arc`.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<JobId, ResultEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, ResultEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, ResultEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ResultBackend for MemoryBackend {
    async fn put(&self, entry: &ResultEntry) -> Result<(), StoreError> {
        self.write().insert(entry.job_id.clone(), entry.clone());
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> Result<Option<ResultEntry>, StoreError> {
        Ok(self.read().get(job_id).cloned())
    }

    async fn remove(&self, job_id: &JobId) -> Result<bool, StoreError> {
        Ok(self.write().remove(job_id).is_some())
    }

    async fn purge(&self, cutoff: SystemTime) -> Result<Vec<JobId>, StoreError> {
        let mut entries = self.write();
        let mut removed = Vec::new();
        entries.retain(|id, entry| {
            let keep = entry.created_at > cutoff;
            if !keep {
                removed.push(id.clone());
            }
            keep
        });
        Ok(removed)
    }
}

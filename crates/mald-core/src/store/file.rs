use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    time::SystemTime,
};

use async_trait::async_trait;
use mald_model::{JobId, ResultEntry};
use tokio::fs;
use tracing::{debug, warn};

use crate::{error::StoreError, store::ResultBackend};

const EXT: &str = "json";
const TMP_EXT: &str = "tmp";

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// One JSON file per job under a results directory.
///
/// Records are written to a temporary sibling and renamed into place, so a
/// concurrent reader sees either the previous record or the new one.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// The directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, job_id: &JobId) -> PathBuf {
        self.dir.join(format!("{job_id}.{EXT}"))
    }

    fn tmp_path_for(&self, job_id: &JobId) -> PathBuf {
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(".{job_id}.{seq}.{TMP_EXT}"))
    }

    /// Move an expired record aside and delete it only if the moved copy is
    /// still expired. A record rewritten since the scan is put back, unless an
    /// even newer one has landed in the meantime.
    async fn retire(&self, job_id: &JobId, path: &Path, cutoff: SystemTime) -> Result<bool, StoreError> {
        let aside = self.tmp_path_for(job_id);
        match fs::rename(path, &aside).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StoreError::io(path, e)),
        }

        let expired = match Self::load(&aside).await {
            Ok(Some(entry)) => entry.created_at <= cutoff,
            Ok(None) => return Ok(false),
            Err(_) => false,
        };
        if expired {
            return Self::unlink(&aside).await;
        }

        match fs::hard_link(&aside, path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(StoreError::io(path, e)),
        }
        Self::unlink(&aside).await?;
        Ok(false)
    }

    /// Drop a temporary file left behind by an interrupted write or purge.
    async fn sweep_scratch(path: &Path, cutoff: SystemTime) {
        let modified = match fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return,
        };
        if modified > cutoff {
            return;
        }
        match Self::unlink(path).await {
            Ok(true) => debug!(path = %path.display(), "removed stale temporary record"),
            Ok(false) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale temporary record"),
        }
    }

    async fn load(path: &Path) -> Result<Option<ResultEntry>, StoreError> {
        match fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn unlink(path: &Path) -> Result<bool, StoreError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

fn is_scratch(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == TMP_EXT)
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.'))
}

/// Job id encoded in a record file name, if it is one.
fn record_id(path: &Path) -> Option<JobId> {
    if path.extension()? != EXT {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    JobId::parse(stem).ok()
}

#[async_trait]
impl ResultBackend for FileBackend {
    async fn put(&self, entry: &ResultEntry) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;

        let bytes = serde_json::to_vec(entry).map_err(StoreError::Encode)?;
        let tmp = self.tmp_path_for(&entry.job_id);
        if let Err(e) = fs::write(&tmp, &bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::io(tmp, e));
        }

        let path = self.path_for(&entry.job_id);
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::io(path, e));
        }
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> Result<Option<ResultEntry>, StoreError> {
        Self::load(&self.path_for(job_id)).await
    }

    async fn remove(&self, job_id: &JobId) -> Result<bool, StoreError> {
        Self::unlink(&self.path_for(job_id)).await
    }

    async fn purge(&self, cutoff: SystemTime) -> Result<Vec<JobId>, StoreError> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };

        let mut removed = Vec::new();
        while let Some(dirent) = dir
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let path = dirent.path();
            if is_scratch(&path) {
                Self::sweep_scratch(&path, cutoff).await;
                continue;
            }
            let Some(job_id) = record_id(&path) else {
                continue;
            };

            let entry = match Self::load(&path).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable result record");
                    continue;
                }
            };

            if entry.created_at <= cutoff && self.retire(&job_id, &path, cutoff).await? {
                removed.push(job_id);
            }
        }
        Ok(removed)
    }
}

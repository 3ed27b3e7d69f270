//! Collaborators the job subsystem talks to but does not own.

use std::time::Duration;

use async_trait::async_trait;
use mald_model::{ArtifactHandle, Outcome};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("classifier unreachable: {0}")]
    Transport(String),
    #[error("classifier rejected the artifact: {0}")]
    Rejected(String),
    #[error("invalid classifier response: {0}")]
    InvalidResponse(String),
    #[error("classification timed out after {0:?}")]
    Timeout(Duration),
    #[error("classifier task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlobError {
    #[error("blob store unreachable: {0}")]
    Transport(String),
    #[error("blob store rejected the request: {0}")]
    Rejected(String),
    #[error("blob io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BlobError {
    fn from(e: std::io::Error) -> Self {
        BlobError::Io(e.to_string())
    }
}

/// Remote malware classifier.
///
/// Latency is unbounded and there is no retry contract.
#[async_trait]
pub trait Classifier: Send + Sync + 'static {
    async fn classify(&self, artifact: &ArtifactHandle) -> Result<Outcome, ClassifyError>;
}

/// Object storage holding uploaded executables.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<ArtifactHandle, BlobError>;

    /// Deleting a blob that is already gone must succeed.
    async fn delete(&self, artifact: &ArtifactHandle) -> Result<(), BlobError>;
}

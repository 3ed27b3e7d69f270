use std::path::PathBuf;

use thiserror::Error;

use crate::external::{BlobError, ClassifyError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt result record {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode result: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("server is busy, retry later")]
    Busy,

    #[error("artifact upload failed: {0}")]
    Upload(#[source] BlobError),

    #[error("classification failed: {0}")]
    Classification(#[source] ClassifyError),

    #[error("result store error: {0}")]
    Store(#[from] StoreError),
}

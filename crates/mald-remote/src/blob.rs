use std::{
    fmt::Write as _,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use mald_core::{BlobError, BlobStore};
use mald_model::ArtifactHandle;
use reqwest::{StatusCode, Url};
use tokio::fs;
use tracing::debug;

use crate::errors::{RemoteError, parse_endpoint};

/// Object storage speaking plain HTTP: `PUT`/`DELETE {endpoint}/{key}`.
///
/// The object URL doubles as the access URL handed to the classifier.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpBlobStore {
    pub fn new(endpoint: &str) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Self::with_client(client, endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: &str) -> Result<Self, RemoteError> {
        Ok(Self {
            client,
            endpoint: parse_endpoint(endpoint)?,
        })
    }

    fn object_url(&self, key: &str) -> Result<Url, BlobError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| BlobError::Rejected(format!("endpoint {} cannot carry a key", self.endpoint)))?
            .pop_if_empty()
            .push(key);
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<ArtifactHandle, BlobError> {
        let url = self.object_url(key)?;
        let size = data.len();

        let response = self
            .client
            .put(url.clone())
            .body(data)
            .send()
            .await
            .map_err(|e| BlobError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BlobError::Rejected(format!("upload of '{key}' returned {status}")));
        }

        debug!(key, size, "artifact uploaded");
        Ok(ArtifactHandle::new(key, url.to_string()))
    }

    async fn delete(&self, artifact: &ArtifactHandle) -> Result<(), BlobError> {
        let url = self.object_url(&artifact.key)?;

        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| BlobError::Transport(e.to_string()))?;
        match response.status() {
            status if status.is_success() => {
                debug!(key = %artifact.key, "artifact deleted");
                Ok(())
            }
            StatusCode::NOT_FOUND => Ok(()),
            status => Err(BlobError::Rejected(format!(
                "delete of '{}' returned {status}",
                artifact.key
            ))),
        }
    }
}

/// Blob store on the local filesystem, for single-host deployments.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name_for(key))
    }
}

/// Map a client key onto a single safe path component.
///
/// Bytes outside `[A-Za-z0-9._-]`, `%` and a leading `.` are written as `%XX`,
/// so distinct keys always get distinct files.
fn file_name_for(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for (i, b) in key.bytes().enumerate() {
        let keep = b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_') || (b == b'.' && i > 0);
        if keep {
            name.push(char::from(b));
        } else {
            let _ = write!(name, "%{b:02X}");
        }
    }
    if name.is_empty() {
        name.push('%');
    }
    name
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<ArtifactHandle, BlobError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        fs::write(&path, &data).await?;

        let absolute = fs::canonicalize(&path).await?;
        debug!(key, path = %absolute.display(), size = data.len(), "artifact stored locally");
        Ok(ArtifactHandle::new(key, format!("file://{}", absolute.display())))
    }

    async fn delete(&self, artifact: &ArtifactHandle) -> Result<(), BlobError> {
        match fs::remove_file(self.path_for(&artifact.key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

use std::time::Duration;

use async_trait::async_trait;
use mald_core::{ClassifyError, Classifier};
use mald_model::{ArtifactHandle, Outcome};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::errors::{RemoteError, parse_endpoint};

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    url: &'a str,
}

/// Classifier reached over HTTP.
///
/// `POST {endpoint}` with `{"url": "<access url>"}`; the response body must
/// be a JSON object, which becomes the job outcome verbatim.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl HttpClassifier {
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
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, artifact: &ArtifactHandle) -> Result<Outcome, ClassifyError> {
        debug!(key = %artifact.key, endpoint = %self.endpoint, "sending artifact to classifier");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&ClassifyRequest {
                url: &artifact.access_url,
            })
            .send()
            .await
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Rejected(format!("{status}: {body}")));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ClassifyError::InvalidResponse(e.to_string()))?;
        trace!(key = %artifact.key, "classifier responded");

        Outcome::try_from(value).map_err(|e| ClassifyError::InvalidResponse(e.to_string()))
    }
}

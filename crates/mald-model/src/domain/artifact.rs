use serde::{Deserialize, Serialize};

/// Reference to an uploaded blob.
///
/// The blob itself is owned by the blob store; the job subsystem only asks
/// for its deletion once classification is over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactHandle {
    /// Key the blob was uploaded under.
    pub key: String,
    /// Location the classifier fetches the blob from.
    pub access_url: String,
}

impl ArtifactHandle {
    pub fn new(key: impl Into<String>, access_url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            access_url: access_url.into(),
        }
    }
}

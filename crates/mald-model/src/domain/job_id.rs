use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Identifier of one classification request.
///
/// Ids are supplied by the client or generated by the server. Uniqueness is the
/// caller's contract; construction only checks that the id is safe to use as a
/// storage key (it doubles as a file name in the file-backed result store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Maximum id length in bytes.
    pub const MAX_LEN: usize = 128;

    /// Validate and wrap a client supplied id.
    pub fn parse(raw: impl Into<String>) -> Result<Self, ModelError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ModelError::EmptyJobId);
        }
        if raw.len() > Self::MAX_LEN {
            return Err(ModelError::JobIdTooLong {
                len: raw.len(),
                max: Self::MAX_LEN,
            });
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(ModelError::InvalidJobIdChar(c));
        }
        if raw == "." || raw == ".." {
            return Err(ModelError::ReservedJobId(raw));
        }
        Ok(Self(raw))
    }

    /// Generate a fresh server-side id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

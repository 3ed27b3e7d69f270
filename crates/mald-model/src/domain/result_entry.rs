use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

use crate::{JobId, Outcome};

/// A persisted classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub job_id: JobId,
    pub outcome: Outcome,
    /// Write time; retention is measured from here.
    #[serde(with = "time_serde")]
    pub created_at: SystemTime,
}

impl ResultEntry {
    pub fn new(job_id: JobId, outcome: Outcome, created_at: SystemTime) -> Self {
        Self {
            job_id,
            outcome,
            created_at,
        }
    }

    /// Age of the entry at `now`. Clock skew backwards counts as zero.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.created_at).unwrap_or_default()
    }

    /// Returns `true` once the entry has lived for at least `retention`.
    pub fn is_expired(&self, now: SystemTime, retention: Duration) -> bool {
        self.age(now) >= retention
    }
}

mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        u64::try_from(since_epoch.as_millis())
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

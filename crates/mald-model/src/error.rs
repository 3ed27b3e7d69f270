use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("job id cannot be empty")]
    EmptyJobId,
    #[error("job id is too long: {len} bytes (max {max})")]
    JobIdTooLong { len: usize, max: usize },
    #[error("job id contains invalid character {0:?} (allowed: A-Z a-z 0-9 - _ .)")]
    InvalidJobIdChar(char),
    #[error("job id cannot be a relative path component: {0}")]
    ReservedJobId(String),
    #[error("classifier output is not a JSON object")]
    OutcomeNotObject,
}

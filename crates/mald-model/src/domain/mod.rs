mod job_id;
pub use job_id::JobId;

mod outcome;
pub use outcome::Outcome;

mod artifact;
pub use artifact::ArtifactHandle;

mod result_entry;
pub use result_entry::ResultEntry;

mod job_status;
pub use job_status::{JobReport, JobStatus};

/// Default admission ceiling (`MAX_CONCURRENT_JOBS`).
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 5;

/// Default lifetime of a stored result (`RETENTION_WINDOW`), in seconds.
pub const DEFAULT_RETENTION_SECS: u64 = 30 * 60;

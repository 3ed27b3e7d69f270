pub mod admission;
pub use admission::{AdmissionController, AdmissionPermit};

pub mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

pub mod error;
pub use error::{ServiceError, StoreError};

pub mod external;
pub use external::{BlobError, BlobStore, ClassifyError, Classifier};

pub mod metrics;
pub use metrics::{JobMetrics, MetricsHandle, NoopMetrics};

pub mod runner;
pub use runner::{Job, JobRunner};

pub mod scheduler;
pub use scheduler::{JobScheduler, JobTicket, RejectReason, SchedulerConfig, SubmissionResult};

pub mod service;
pub use service::JobService;

pub mod store;
pub use store::{FileBackend, MemoryBackend, ResultBackend, ResultStore};

pub mod sweeper;
pub use sweeper::{RetentionSweeper, SweeperConfig, SweeperHandle};

#[cfg(test)]
pub(crate) mod testkit;

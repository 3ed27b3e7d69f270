use thiserror::Error;

/// Errors raised while building or installing the log subscriber.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoggerError {
    #[error("unknown log format '{0}', expected text, json or journald")]
    InvalidFormat(String),
    #[error("journald output needs linux and the `journald` feature")]
    JournaldNotSupported,
    #[error("a global log subscriber is already installed")]
    AlreadyInitialized,
    #[error("log subscriber setup failed: {0}")]
    InitializationFailed(String),
    #[error("invalid log filter '{0}'")]
    InvalidLevel(String),
}

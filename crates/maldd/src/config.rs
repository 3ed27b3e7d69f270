use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use mald_core::{SchedulerConfig, SweeperConfig};
use mald_model::{DEFAULT_MAX_CONCURRENT_JOBS, DEFAULT_RETENTION_SECS};
use mald_observe::{LoggerConfig, LoggerError, LoggerFormat, LoggerLevel};
use thiserror::Error;

const DEFAULT_LISTEN_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8000);
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_RESULTS_DIR: &str = "app/results";
const DEFAULT_BLOB_DIR: &str = "app/blobs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Logger(#[from] LoggerError),
}

/// Where uploaded executables are kept while they are classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobBackend {
    Http(String),
    Local(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub scheduler: SchedulerConfig,
    pub retention: Duration,
    pub sweeper: SweeperConfig,
    pub results_dir: PathBuf,
    pub classifier_url: String,
    pub blobs: BlobBackend,
    pub logger: LoggerConfig,
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read the configuration through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let listen_addr = parse_or("LISTEN_ADDR", get("LISTEN_ADDR"), DEFAULT_LISTEN_ADDR)?;
        let max_concurrent_jobs = parse_or("MAX_WORKERS", get("MAX_WORKERS"), DEFAULT_MAX_CONCURRENT_JOBS)?;
        let retention_secs =
            parse_or("RESULT_RETENTION_SECS", get("RESULT_RETENTION_SECS"), DEFAULT_RETENTION_SECS)?;
        let sweep_secs = parse_or(
            "SWEEP_INTERVAL_SECS",
            get("SWEEP_INTERVAL_SECS"),
            DEFAULT_SWEEP_INTERVAL_SECS,
        )?;
        let classify_timeout = get("CLASSIFY_TIMEOUT_SECS")
            .map(|raw| parse("CLASSIFY_TIMEOUT_SECS", raw).map(Duration::from_secs))
            .transpose()?;

        let classifier_url = get("CLASSIFIER_URL").ok_or(ConfigError::Missing("CLASSIFIER_URL"))?;
        let blobs = match get("BLOB_STORE_URL") {
            Some(url) => BlobBackend::Http(url),
            None => BlobBackend::Local(
                get("BLOB_DIR")
                    .unwrap_or_else(|| DEFAULT_BLOB_DIR.to_string())
                    .into(),
            ),
        };
        let results_dir = get("RESULTS_DIR")
            .unwrap_or_else(|| DEFAULT_RESULTS_DIR.to_string())
            .into();

        let mut logger = LoggerConfig::default();
        if let Some(level) = get("LOG_LEVEL") {
            logger = logger.with_level(LoggerLevel::new(&level)?);
        }
        if let Some(format) = get("LOG_FORMAT") {
            logger = logger.with_format(format.parse::<LoggerFormat>()?);
        }

        let config = Self {
            listen_addr,
            scheduler: SchedulerConfig {
                max_concurrent_jobs,
                classify_timeout,
            },
            retention: Duration::from_secs(retention_secs),
            sweeper: SweeperConfig {
                interval: Duration::from_secs(sweep_secs),
            },
            results_dir,
            classifier_url,
            blobs,
            logger,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.max_concurrent_jobs == 0 {
            return Err(invalid("MAX_WORKERS", "0", "must be greater than zero"));
        }
        if self.retention.is_zero() {
            return Err(invalid("RESULT_RETENTION_SECS", "0", "must be greater than zero"));
        }
        if self.sweeper.interval.is_zero() {
            return Err(invalid("SWEEP_INTERVAL_SECS", "0", "must be greater than zero"));
        }
        if self.scheduler.classify_timeout.is_some_and(|t| t.is_zero()) {
            return Err(invalid("CLASSIFY_TIMEOUT_SECS", "0", "must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(var: &'static str, value: impl Into<String>, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.into(),
        reason: reason.to_string(),
    }
}

fn parse<T>(var: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    raw.parse::<T>().map_err(|e| invalid(var, raw.clone(), e))
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    raw.map_or(Ok(default), |raw| parse(var, raw))
}

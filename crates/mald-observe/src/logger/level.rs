use std::{fmt, str::FromStr};

use tracing_subscriber::EnvFilter;

use crate::logger::error::LoggerError;

/// A validated `EnvFilter` directive string, e.g. `info` or
/// `info,mald_core=debug`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerLevel(String);

impl LoggerLevel {
    pub fn new(directives: &str) -> Result<Self, LoggerError> {
        let directives = directives.trim();
        if directives.is_empty() {
            return Err(LoggerError::InvalidLevel(directives.to_string()));
        }
        EnvFilter::try_new(directives)
            .map_err(|_| LoggerError::InvalidLevel(directives.to_string()))?;
        Ok(Self(directives.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn filter(&self) -> Result<EnvFilter, LoggerError> {
        EnvFilter::try_new(&self.0).map_err(|_| LoggerError::InvalidLevel(self.0.clone()))
    }
}

impl Default for LoggerLevel {
    fn default() -> Self {
        Self("info".to_string())
    }
}

impl FromStr for LoggerLevel {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for LoggerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_directives() {
        assert_eq!(LoggerLevel::new("debug").unwrap().as_str(), "debug");
        assert_eq!(
            LoggerLevel::new(" info,mald_core=trace ").unwrap().as_str(),
            "info,mald_core=trace"
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(LoggerLevel::new("").is_err());
        assert!(LoggerLevel::new("info,mald_core=loud").is_err());
    }
}

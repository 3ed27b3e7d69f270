use std::{fmt, str::FromStr};

use crate::logger::error::LoggerError;

/// Whether this build can write to the systemd journal.
pub(crate) const JOURNALD_AVAILABLE: bool = cfg!(all(target_os = "linux", feature = "journald"));

/// Output encoding of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggerFormat {
    /// Human-readable lines, colored on a terminal.
    #[default]
    Text,
    /// One JSON object per line, including the current span.
    Json,
    Journald,
}

impl LoggerFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LoggerFormat::Text => "text",
            LoggerFormat::Json => "json",
            LoggerFormat::Journald => "journald",
        }
    }

    /// Colors only make sense for the text format.
    pub fn supports_color(self) -> bool {
        self == LoggerFormat::Text
    }
}

impl FromStr for LoggerFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => LoggerFormat::Text,
            "json" => LoggerFormat::Json,
            "journald" | "journal" => LoggerFormat::Journald,
            _ => return Err(LoggerError::InvalidFormat(s.to_string())),
        };
        if format == LoggerFormat::Journald && !JOURNALD_AVAILABLE {
            return Err(LoggerError::JournaldNotSupported);
        }
        Ok(format)
    }
}

impl fmt::Display for LoggerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

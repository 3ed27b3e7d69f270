use crate::logger::{format::LoggerFormat, level::LoggerLevel};

/// How the daemon writes its logs.
///
/// Colors default to on only when stdout is a terminal.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    pub level: LoggerLevel,
    pub with_targets: bool,
    pub use_color: bool,
}

impl LoggerConfig {
    pub fn with_format(mut self, format: LoggerFormat) -> Self {
        self.use_color &= format.supports_color();
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LoggerLevel) -> Self {
        self.level = level;
        self
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: LoggerLevel::default(),
            with_targets: true,
            use_color: atty::is(atty::Stream::Stdout),
        }
    }
}

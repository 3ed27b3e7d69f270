use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing::Subscriber;
use tracing_subscriber::{
    Layer, fmt, fmt::time::OffsetTime, layer::SubscriberExt, registry::LookupSpan,
    util::{SubscriberInitExt, TryInitError},
};

use crate::logger::{config::LoggerConfig, error::LoggerError, format::LoggerFormat};

/// Build the subscriber for `cfg` and make it the global default.
pub(crate) fn install(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let registry = tracing_subscriber::registry().with(cfg.level.filter()?);

    let installed = match cfg.format {
        LoggerFormat::Text => registry.with(text_layer(cfg)).try_init(),
        LoggerFormat::Json => registry.with(json_layer(cfg)).try_init(),
        LoggerFormat::Journald => registry.with(journald_layer()?).try_init(),
    };
    installed.map_err(init_error)
}

fn text_layer<S>(cfg: &LoggerConfig) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_ansi(cfg.use_color)
        .with_target(cfg.with_targets)
        .with_timer(local_rfc3339())
}

fn json_layer<S>(cfg: &LoggerConfig) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_target(cfg.with_targets)
        .with_timer(local_rfc3339())
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald_layer() -> Result<tracing_journald::Layer, LoggerError> {
    tracing_journald::layer()
        .map(|layer| layer.with_syslog_identifier("maldd".to_string()))
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald_layer() -> Result<tracing_subscriber::layer::Identity, LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}

/// Timestamps in the host's offset, falling back to UTC when it is unknown.
fn local_rfc3339() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn init_error(e: TryInitError) -> LoggerError {
    let msg = e.to_string();
    if msg.contains("already") {
        LoggerError::AlreadyInitialized
    } else {
        LoggerError::InitializationFailed(msg)
    }
}

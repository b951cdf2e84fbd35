//! Structured logging with JSON or pretty output.
//!
//! Logs always go to stderr: stdout carries the resolved document.

use crate::{LogFormat, TelemetryConfig, TelemetryError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the logging subsystem.
///
/// Sets up tracing-subscriber with either JSON or pretty format,
/// respecting the configured log level.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    // Build the env filter from config or RUST_LOG
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => init_json_logging(filter),
        LogFormat::Pretty => init_pretty_logging(filter),
    }
}

fn init_json_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    let json_layer = fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_file(false)
        .with_line_number(false)
        .flatten_event(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

fn init_pretty_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    let pretty_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(pretty_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

/// Standard log event names.
pub mod events {
    /// A top-level resolution call has started walking a document.
    pub const RESOLUTION_STARTED: &str = "resolution_started";

    /// A remote document was fetched and deserialized.
    pub const DOCUMENT_FETCHED: &str = "document_fetched";

    /// A remote document could not be fetched or deserialized.
    pub const FETCH_FAILED: &str = "fetch_failed";

    /// A reference could not be substituted.
    pub const REFERENCE_UNRESOLVED: &str = "reference_unresolved";

    /// A remote model was merged into the shared namespace.
    pub const MODEL_IMPORTED: &str = "model_imported";

    /// A top-level resolution call has settled.
    pub const RESOLUTION_COMPLETED: &str = "resolution_completed";
}

/// Helper macros for structured logging with standard fields.
///
/// These wrap the tracing macros to ensure consistent field naming.
#[macro_export]
macro_rules! log_resolution_started {
    ($($field:tt)*) => {
        tracing::debug!(
            event = $crate::logging::events::RESOLUTION_STARTED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_document_fetched {
    ($($field:tt)*) => {
        tracing::debug!(
            event = $crate::logging::events::DOCUMENT_FETCHED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_fetch_failed {
    ($($field:tt)*) => {
        tracing::warn!(
            event = $crate::logging::events::FETCH_FAILED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_reference_unresolved {
    ($($field:tt)*) => {
        tracing::warn!(
            event = $crate::logging::events::REFERENCE_UNRESOLVED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_model_imported {
    ($($field:tt)*) => {
        tracing::debug!(
            event = $crate::logging::events::MODEL_IMPORTED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_resolution_completed {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::RESOLUTION_COMPLETED,
            $($field)*
        )
    };
}

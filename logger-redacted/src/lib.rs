//! HIPAA-minded logging for CareSense
//!
//! Clinical free text must never appear in logs. This crate provides the
//! subscriber set-up used by CareSense binaries and the [`PiiRedactor`]
//! used by the engine to fingerprint symptom descriptions and medical
//! history before they are attached to log events.
//!
//! # Example
//!
//! ```rust,no_run
//! use logger_redacted::{init_tracing, LoggerConfig, PiiRedactor};
//! use tracing::info;
//!
//! init_tracing(&LoggerConfig::from_env())?;
//!
//! let redactor = PiiRedactor::default();
//! info!(symptoms = %redactor.fingerprint("fever and cough"), "Inference requested");
//! # Ok::<(), logger_redacted::LoggerError>(())
//! ```

pub mod redactor;
pub mod config;

pub use redactor::*;
pub use config::*;

use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Tracing subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set. Events
/// go to stderr so stdout stays free for command output.
pub fn init_tracing(config: &LoggerConfig) -> Result<(), LoggerError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.filter_directives())
            .map_err(|e| LoggerError::Filter(e.to_string()))?,
    };

    let installed = match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_level(true),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .try_init(),
    };

    installed.map_err(|e| LoggerError::AlreadyInstalled(e.to_string()))
}

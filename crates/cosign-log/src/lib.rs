//! Logging utilities and abstractions for the cosign multisig engine.
//!
//! Library crates log through the re-exported `tracing` macros; binaries call
//! one of the `init_*` functions once at startup.

use std::str::FromStr;

pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};
pub use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Error returned when subscriber setup fails
pub type InitError = Box<dyn std::error::Error + Send + Sync>;

/// Initialize the global tracing subscriber with structured JSON output
///
/// The filter is taken from `RUST_LOG` and falls back to `info`.
pub fn init_tracing() -> Result<(), InitError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .json(),
        )
        .try_init()?;

    Ok(())
}

/// Initialize tracing with a specific level filter
pub fn init_tracing_with_level(level: &str) -> Result<(), InitError> {
    let level = parse_level(level)?;

    tracing_subscriber::registry()
        .with(EnvFilter::new(level.as_str().to_ascii_lowercase()))
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .json(),
        )
        .try_init()?;

    Ok(())
}

/// Initialize human-readable output for interactive command line use
pub fn init_tracing_compact(level: &str) -> Result<(), InitError> {
    let level = parse_level(level)?;

    tracing_subscriber::registry()
        .with(EnvFilter::new(level.as_str().to_ascii_lowercase()))
        .with(fmt::layer().with_target(false).compact())
        .try_init()?;

    Ok(())
}

/// Initialize tracing for testing with simplified output
pub fn init_tracing_test() -> Result<(), InitError> {
    tracing_subscriber::registry()
        .with(EnvFilter::new("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init()?;

    Ok(())
}

/// Parse a configured log level ("trace" .. "error", or "off")
pub fn parse_level(level: &str) -> Result<log::LevelFilter, InitError> {
    log::LevelFilter::from_str(level.trim())
        .map_err(|_| format!("invalid log level: {level}").into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_macros() {
        info!("Test info message");
        debug!("Test debug message");
        warn!("Test warning message");
        error!("Test error message");
    }

    #[test]
    #[tracing::instrument]
    fn test_instrument_attribute() {
        info!("This function is instrumented");
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug").unwrap(), log::LevelFilter::Debug);
        assert_eq!(parse_level(" WARN ").unwrap(), log::LevelFilter::Warn);
        assert_eq!(parse_level("off").unwrap(), log::LevelFilter::Off);
        assert!(parse_level("loud").is_err());
    }
}

//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] pricemux_telemetry::TelemetryError),

    #[error("Aggregator error: {0}")]
    Agg(#[from] pricemux_agg::AggError),
}

pub type AppResult<T> = Result<T, AppError>;

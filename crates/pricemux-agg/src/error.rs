//! Aggregator error types.

use pricemux_core::ExchangeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggError {
    #[error("Unknown exchange: {0}")]
    UnknownExchange(ExchangeId),

    #[error("Feed manager already stopped")]
    Stopped,
}

pub type AggResult<T> = Result<T, AggError>;

//! Core domain types for the pricemux aggregation engine.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - `ExchangeId`: canonical identifier for a market-data venue
//! - `PriceUpdate`: the single normalized tick event all wire formats map to
//! - Symbol normalization helpers (`BTC-USDT` / `BTC_USDT` -> `BTCUSDT`)

pub mod error;
pub mod exchange;
pub mod symbol;
pub mod update;

pub use error::{CoreError, Result};
pub use exchange::ExchangeId;
pub use symbol::normalize_symbol;
pub use update::PriceUpdate;

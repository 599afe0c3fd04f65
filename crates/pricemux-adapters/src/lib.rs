//! Exchange protocol adapters.
//!
//! One adapter per venue translates between the exchange's wire format and
//! the canonical `PriceUpdate`. Adapters are pure: they build endpoints and
//! handshake payloads, parse inbound text frames, and map symbols between
//! canonical and wire form. They hold no connection state.

pub mod adapter;
pub mod binance;
pub mod error;
pub mod gate;
pub mod okx;

pub use adapter::{adapter_for, Probe, ProtocolAdapter};
pub use binance::BinanceAdapter;
pub use error::{AdapterError, AdapterResult};
pub use gate::GateAdapter;
pub use okx::OkxAdapter;

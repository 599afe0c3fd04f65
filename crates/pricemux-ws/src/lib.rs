//! Exchange connection lifecycle for pricemux.
//!
//! Provides the per-exchange WebSocket machinery:
//! - Explicit connection state machine with a single `handle_event` entry point
//! - Automatic reconnection with capped exponential backoff
//! - Heartbeat monitoring (probe cadence + silent-socket stall detection)
//! - Cancellation-aware shutdown

pub mod connection;
pub mod error;
pub mod fsm;
pub mod heartbeat;
pub mod policy;

pub use connection::{ConnCommand, ConnectionConfig, ConnectionHandle, ConnectionStats, ExchangeConnection};
pub use error::{WsError, WsResult};
pub use fsm::{ConnAction, ConnEvent, ConnectionFsm, ConnectionState};
pub use heartbeat::{HeartbeatConfig, HeartbeatMonitor};
pub use policy::{PolicyDecision, ReconnectPolicy};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

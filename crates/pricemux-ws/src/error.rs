//! Connection error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Heartbeat stall: no traffic for {silent_ms}ms")]
    Stalled { silent_ms: u64 },

    #[error("Reconnection attempts exhausted after {attempts}")]
    GiveUp { attempts: u32 },

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type WsResult<T> = Result<T, WsError>;

//! Application configuration.

use crate::error::AppResult;
use pricemux_agg::FeedManagerConfig;
use pricemux_core::ExchangeId;
use pricemux_ws::{ConnectionConfig, HeartbeatConfig, ReconnectPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One exchange to stream, with its initial symbols.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeEntry {
    pub id: ExchangeId,
    #[serde(default)]
    pub symbols: Vec<String>,
}

/// Feed manager tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    /// Connection -> aggregator channel capacity.
    #[serde(default = "default_update_buffer")]
    pub update_buffer: usize,
    /// Per-consumer queue capacity.
    #[serde(default = "default_consumer_buffer")]
    pub consumer_buffer: usize,
    /// Bound on waiting for connection tasks during shutdown (ms).
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    /// Dial timeout per connect attempt (ms).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Cadence of the status report log (ms).
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,
}

fn default_update_buffer() -> usize {
    1024
}

fn default_consumer_buffer() -> usize {
    256
}

fn default_stop_timeout_ms() -> u64 {
    5_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_status_interval_ms() -> u64 {
    30_000
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            update_buffer: default_update_buffer(),
            consumer_buffer: default_consumer_buffer(),
            stop_timeout_ms: default_stop_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            status_interval_ms: default_status_interval_ms(),
        }
    }
}

/// Reconnection backoff tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffSettings {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Open time after which the attempt counter resets (ms).
    #[serde(default = "default_stable_open_ms")]
    pub stable_open_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    5_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_stable_open_ms() -> u64 {
    10_000
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            stable_open_ms: default_stable_open_ms(),
        }
    }
}

/// Heartbeat tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatSettings {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub interval_ms: u64,
    /// Silence threshold as a multiple of the interval.
    #[serde(default = "default_stall_factor")]
    pub stall_factor: u32,
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_stall_factor() -> u32 {
    2
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval_ms(),
            stall_factor: default_stall_factor(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub backoff: BackoffSettings,
    #[serde(default)]
    pub heartbeat: HeartbeatSettings,
    #[serde(default)]
    pub exchanges: Vec<ExchangeEntry>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Translate into the feed manager's runtime configuration.
    pub fn manager_config(&self) -> FeedManagerConfig {
        FeedManagerConfig {
            connection: ConnectionConfig {
                connect_timeout: Duration::from_millis(self.feed.connect_timeout_ms),
                policy: ReconnectPolicy {
                    base_delay: Duration::from_millis(self.backoff.base_delay_ms),
                    max_delay: Duration::from_millis(self.backoff.max_delay_ms),
                    max_attempts: self.backoff.max_attempts,
                },
                heartbeat: HeartbeatConfig {
                    interval: Duration::from_millis(self.heartbeat.interval_ms),
                    stall_factor: self.heartbeat.stall_factor,
                },
                stable_open: Duration::from_millis(self.backoff.stable_open_ms),
            },
            update_buffer: self.feed.update_buffer,
            consumer_buffer: self.feed.consumer_buffer,
            stop_timeout: Duration::from_millis(self.feed.stop_timeout_ms),
        }
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.feed.status_interval_ms)
    }
}

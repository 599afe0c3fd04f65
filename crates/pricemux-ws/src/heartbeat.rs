//! Heartbeat monitoring.
//!
//! While a connection is open, a liveness probe is sent at a fixed cadence
//! and the time since the last inbound frame of any kind is tracked. A
//! socket that goes silent past a multiple of the probe interval is
//! declared stalled and treated exactly like a socket error - this catches
//! connections that die without ever signalling a close.

use parking_lot::RwLock;
use std::time::{Duration, Instant};

/// Heartbeat tuning.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    /// Probe cadence.
    pub interval: Duration,
    /// Silence threshold as a multiple of `interval`.
    pub stall_factor: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            stall_factor: 2,
        }
    }
}

/// Tracks inbound traffic and decides when a connection has stalled.
pub struct HeartbeatMonitor {
    interval: Duration,
    stall_after: Duration,
    last_frame: RwLock<Instant>,
}

impl HeartbeatMonitor {
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            interval: config.interval,
            stall_after: config.interval * config.stall_factor,
            last_frame: RwLock::new(Instant::now()),
        }
    }

    /// Reset the traffic clock (called on entering Open).
    pub fn reset(&self) {
        *self.last_frame.write() = Instant::now();
    }

    /// Record an inbound frame of any kind (data, control, probe response).
    pub fn record_frame(&self) {
        *self.last_frame.write() = Instant::now();
    }

    /// Whether the socket has been silent past the stall threshold.
    pub fn is_stalled(&self) -> bool {
        self.is_stalled_at(Instant::now())
    }

    /// Stall check against an explicit clock, for tests.
    pub fn is_stalled_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(*self.last_frame.read()) > self.stall_after
    }

    /// Milliseconds since the last inbound frame.
    pub fn silent_ms(&self) -> u64 {
        self.last_frame.read().elapsed().as_millis() as u64
    }

    /// Wait until the next probe is due.
    pub async fn tick(&self) {
        tokio::time::sleep(self.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(interval_ms: u64, factor: u32) -> HeartbeatMonitor {
        HeartbeatMonitor::new(HeartbeatConfig {
            interval: Duration::from_millis(interval_ms),
            stall_factor: factor,
        })
    }

    #[test]
    fn test_fresh_monitor_not_stalled() {
        let hb = monitor(30_000, 2);
        assert!(!hb.is_stalled());
    }

    #[test]
    fn test_stall_after_silence_threshold() {
        let hb = monitor(30_000, 2);
        let now = Instant::now();

        // 59s of silence: under the 60s threshold.
        assert!(!hb.is_stalled_at(now + Duration::from_secs(59)));
        // 61s of silence: stalled.
        assert!(hb.is_stalled_at(now + Duration::from_secs(61)));
    }

    #[test]
    fn test_frame_resets_silence() {
        let hb = monitor(30_000, 2);
        let start = Instant::now();

        hb.record_frame();
        assert!(!hb.is_stalled_at(start + Duration::from_secs(30)));
    }
}

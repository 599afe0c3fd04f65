//! Connection state machine.
//!
//! All lifecycle transitions are centralized in a single synchronous
//! `handle_event` entry point. The async driver in `connection.rs` feeds
//! socket/timer events in and executes the returned actions; the machine
//! itself performs no I/O and takes the clock as a parameter, so every
//! transition is unit-testable.

use crate::policy::ReconnectPolicy;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Lifecycle state of one exchange connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Created but never asked to connect, or explicitly stopped.
    Idle,
    /// Dialing the socket.
    Connecting,
    /// Socket established, streaming.
    Open,
    /// Explicit shutdown or forced reconnect in progress.
    Closing,
    /// Socket lost, waiting on the retry timer.
    Closed,
    /// Retry budget exhausted; only an external reconnect recovers.
    Abandoned,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Open => write!(f, "OPEN"),
            Self::Closing => write!(f, "CLOSING"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Abandoned => write!(f, "ABANDONED"),
        }
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnEvent {
    /// First connect, issued by the feed manager.
    ConnectRequested,
    /// Socket handshake completed.
    SocketOpened,
    /// Remote close or stream end.
    SocketClosed,
    /// Dial failure, connect timeout, or read error.
    SocketError,
    /// Heartbeat silence threshold exceeded.
    Stalled,
    /// Backoff delay elapsed.
    RetryTimerFired,
    /// The connection has stayed open past the stability grace period.
    OpenGraceElapsed,
    /// Graceful shutdown.
    StopRequested,
    /// External reconnect or forced resubscribe cycle.
    ReconnectRequested {
        /// True for operator-driven reconnects (resets the backoff budget);
        /// false for internal cycles such as a symbol-set change on a
        /// venue without incremental subscribe.
        reset_attempts: bool,
    },
}

/// Side effect the driver must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnAction {
    /// Open the socket.
    Dial,
    /// Send the adapter's post-connect handshake messages.
    SendHandshake,
    /// Start the heartbeat monitor.
    StartHeartbeat,
    /// Stop the heartbeat monitor.
    StopHeartbeat,
    /// Send a close frame and tear the socket down.
    CloseSocket,
    /// Sleep the given delay, then feed `RetryTimerFired`.
    ScheduleRetry(Duration),
    /// Surface the abandoned state to the feed manager.
    ReportAbandoned,
}

/// Per-connection state machine.
///
/// Owns the reconnect attempt counter; the policy itself stays pure. The
/// counter resets only after a connection stays open past the stability
/// grace period, so a socket that flaps right after opening keeps
/// escalating its backoff instead of hot-looping.
pub struct ConnectionFsm {
    state: ConnectionState,
    attempts: u32,
    policy: ReconnectPolicy,
    stable_open: Duration,
    opened_at: Option<Instant>,
    pending_reconnect: bool,
}

impl ConnectionFsm {
    pub fn new(policy: ReconnectPolicy, stable_open: Duration) -> Self {
        Self {
            state: ConnectionState::Idle,
            attempts: 0,
            policy,
            stable_open,
            opened_at: None,
            pending_reconnect: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Apply one event at the given clock reading.
    pub fn handle_event(&mut self, event: ConnEvent, now: Instant) -> Vec<ConnAction> {
        use ConnectionState::*;

        let actions = match (self.state, event) {
            (Idle, ConnEvent::ConnectRequested) => {
                self.state = Connecting;
                vec![ConnAction::Dial]
            }

            (Connecting, ConnEvent::SocketOpened) => {
                self.state = Open;
                self.opened_at = Some(now);
                vec![ConnAction::SendHandshake, ConnAction::StartHeartbeat]
            }

            (Connecting, ConnEvent::SocketError | ConnEvent::SocketClosed) => {
                self.on_disconnect(now, false)
            }

            (Open, ConnEvent::SocketClosed | ConnEvent::SocketError | ConnEvent::Stalled) => {
                self.on_disconnect(now, true)
            }

            (Open, ConnEvent::OpenGraceElapsed) => {
                self.attempts = 0;
                Vec::new()
            }

            (Open, ConnEvent::StopRequested) => {
                self.state = Closing;
                self.pending_reconnect = false;
                vec![ConnAction::StopHeartbeat, ConnAction::CloseSocket]
            }

            (Open, ConnEvent::ReconnectRequested { reset_attempts }) => {
                if reset_attempts {
                    self.attempts = 0;
                }
                self.state = Closing;
                self.pending_reconnect = true;
                vec![ConnAction::StopHeartbeat, ConnAction::CloseSocket]
            }

            (Closing, ConnEvent::SocketClosed | ConnEvent::SocketError) => {
                if self.pending_reconnect {
                    self.pending_reconnect = false;
                    self.state = Connecting;
                    vec![ConnAction::Dial]
                } else {
                    self.state = Idle;
                    Vec::new()
                }
            }

            (Closing, ConnEvent::StopRequested) => {
                // Shutdown during a forced reconnect wins.
                self.pending_reconnect = false;
                Vec::new()
            }

            (Closed, ConnEvent::RetryTimerFired) => {
                self.state = Connecting;
                vec![ConnAction::Dial]
            }

            (Closed, ConnEvent::ReconnectRequested { reset_attempts }) => {
                if reset_attempts {
                    self.attempts = 0;
                }
                self.state = Connecting;
                vec![ConnAction::Dial]
            }

            (Abandoned, ConnEvent::ReconnectRequested { reset_attempts }) => {
                if reset_attempts {
                    self.attempts = 0;
                }
                self.state = Connecting;
                vec![ConnAction::Dial]
            }

            (Connecting, ConnEvent::ReconnectRequested { reset_attempts }) => {
                // Already dialing; just honor the counter reset.
                if reset_attempts {
                    self.attempts = 0;
                }
                Vec::new()
            }

            (Connecting | Closed | Abandoned | Idle, ConnEvent::StopRequested) => {
                // Pending retry timers are cancelled by the driver; no
                // further connect attempt may happen after this.
                self.state = Idle;
                self.pending_reconnect = false;
                Vec::new()
            }

            (state, event) => {
                debug!(?state, ?event, "Ignoring event in current state");
                Vec::new()
            }
        };

        actions
    }

    /// Shared disconnect path for Connecting and Open.
    ///
    /// Increments the attempt counter (after a stability-grace reset when
    /// applicable - the elapsed-time check here backstops the
    /// `OpenGraceElapsed` timer when the close races it) and consults the
    /// policy: schedule a retry or abandon.
    fn on_disconnect(&mut self, now: Instant, was_open: bool) -> Vec<ConnAction> {
        let mut actions = Vec::new();

        if was_open {
            actions.push(ConnAction::StopHeartbeat);

            let stable = self
                .opened_at
                .map(|t| now.saturating_duration_since(t) >= self.stable_open)
                .unwrap_or(false);
            if stable {
                self.attempts = 0;
            }
        }
        self.opened_at = None;

        self.attempts += 1;
        let decision = self.policy.decide(self.attempts);

        if decision.give_up {
            self.state = ConnectionState::Abandoned;
            actions.push(ConnAction::ReportAbandoned);
        } else {
            self.state = ConnectionState::Closed;
            actions.push(ConnAction::ScheduleRetry(decision.delay));
        }

        actions
    }
}

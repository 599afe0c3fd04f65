//! Exchange connection driver.
//!
//! One `ExchangeConnection` owns one socket's lifecycle: it dials, sends
//! the adapter's handshake, pumps inbound frames through the adapter, and
//! reacts to disconnects via the state machine in `fsm.rs`. The driver
//! performs the I/O; every transition decision lives in the machine.
//!
//! Parsed updates are handed to the aggregator through a bounded,
//! non-blocking channel. When the aggregator side lags, updates are
//! dropped and counted rather than buffered without bound - price feeds
//! are latest-value-wins.

use crate::error::WsError;
use crate::fsm::{ConnAction, ConnEvent, ConnectionFsm, ConnectionState};
use crate::heartbeat::{HeartbeatConfig, HeartbeatMonitor};
use crate::policy::ReconnectPolicy;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use pricemux_adapters::{Probe, ProtocolAdapter};
use pricemux_core::{ExchangeId, PriceUpdate};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Connection tuning.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    /// Timeout for one dial attempt, independent of the retry timer.
    pub connect_timeout: Duration,
    /// Reconnection backoff policy.
    pub policy: ReconnectPolicy,
    /// Heartbeat cadence and stall threshold.
    pub heartbeat: HeartbeatConfig,
    /// How long a connection must stay open before the attempt counter
    /// resets.
    pub stable_open: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            policy: ReconnectPolicy::default(),
            heartbeat: HeartbeatConfig::default(),
            stable_open: Duration::from_secs(10),
        }
    }
}

/// Command sent to a live connection task.
#[derive(Debug)]
pub enum ConnCommand {
    /// Replace the desired symbol set. Applied incrementally when the
    /// venue supports it, otherwise via one reconnect cycle.
    SetSymbols(Vec<String>),
    /// Operator-driven reconnect; resets the backoff budget and fires
    /// regardless of any pending retry timer.
    Reconnect,
}

/// Counters shared with the feed manager for status reporting.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    updates_forwarded: AtomicU64,
    updates_dropped: AtomicU64,
    parse_errors: AtomicU64,
    reconnects: AtomicU64,
    attempts: AtomicU32,
}

impl ConnectionStats {
    pub fn updates_forwarded(&self) -> u64 {
        self.updates_forwarded.load(Ordering::Relaxed)
    }

    pub fn updates_dropped(&self) -> u64 {
        self.updates_dropped.load(Ordering::Relaxed)
    }

    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    fn record_forwarded(&self) {
        self.updates_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped(&self) {
        self.updates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    fn set_attempts(&self, attempts: u32) {
        self.attempts.store(attempts, Ordering::Relaxed);
    }
}

/// Handle held by the feed manager for one spawned connection.
pub struct ConnectionHandle {
    exchange: ExchangeId,
    state: Arc<RwLock<ConnectionState>>,
    stats: Arc<ConnectionStats>,
    cmd_tx: mpsc::Sender<ConnCommand>,
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl ConnectionHandle {
    pub fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    /// Point-in-time connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Clone of the command sender, so callers can drop any lock guarding
    /// this handle before awaiting a send.
    pub fn commands(&self) -> mpsc::Sender<ConnCommand> {
        self.cmd_tx.clone()
    }

    /// Push the new desired symbol set to the connection task.
    pub async fn set_symbols(&self, symbols: Vec<String>) {
        if self.cmd_tx.send(ConnCommand::SetSymbols(symbols)).await.is_err() {
            debug!(exchange = %self.exchange, "Connection task gone, symbol update dropped");
        }
    }

    /// Request an operator-driven reconnect.
    pub async fn reconnect(&self) {
        if self.cmd_tx.send(ConnCommand::Reconnect).await.is_err() {
            debug!(exchange = %self.exchange, "Connection task gone, reconnect dropped");
        }
    }

    /// Stop the connection and wait up to `wait` for the task to finish.
    ///
    /// Returns false when the task had to be aborted (unresponsive socket).
    pub async fn stop(mut self, wait: Duration) -> bool {
        self.token.cancel();
        match tokio::time::timeout(wait, &mut self.join).await {
            Ok(_) => true,
            Err(_) => {
                warn!(exchange = %self.exchange, "Connection task unresponsive, aborting");
                self.join.abort();
                false
            }
        }
    }
}

/// Driver for one exchange connection.
pub struct ExchangeConnection {
    adapter: Arc<dyn ProtocolAdapter>,
    config: ConnectionConfig,
    symbols: Vec<String>,
    fsm: ConnectionFsm,
    shared_state: Arc<RwLock<ConnectionState>>,
    stats: Arc<ConnectionStats>,
    update_tx: mpsc::Sender<PriceUpdate>,
    cmd_rx: mpsc::Receiver<ConnCommand>,
    token: CancellationToken,
    heartbeat: HeartbeatMonitor,
    retry_delay: Duration,
}

impl ExchangeConnection {
    /// Spawn the connection task and return its handle.
    pub fn spawn(
        adapter: Arc<dyn ProtocolAdapter>,
        config: ConnectionConfig,
        initial_symbols: Vec<String>,
        update_tx: mpsc::Sender<PriceUpdate>,
        parent: &CancellationToken,
    ) -> ConnectionHandle {
        let exchange = adapter.exchange();
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let token = parent.child_token();
        let shared_state = Arc::new(RwLock::new(ConnectionState::Idle));
        let stats = Arc::new(ConnectionStats::default());

        let connection = Self {
            fsm: ConnectionFsm::new(config.policy, config.stable_open),
            heartbeat: HeartbeatMonitor::new(config.heartbeat),
            adapter,
            config,
            symbols: initial_symbols,
            shared_state: shared_state.clone(),
            stats: stats.clone(),
            update_tx,
            cmd_rx,
            token: token.clone(),
            retry_delay: Duration::ZERO,
        };
        let join = tokio::spawn(connection.run());

        ConnectionHandle {
            exchange,
            state: shared_state,
            stats,
            cmd_tx,
            token,
            join,
        }
    }

    async fn run(mut self) {
        let exchange = self.adapter.exchange();
        info!(%exchange, "Connection task started");
        self.dispatch(ConnEvent::ConnectRequested);

        loop {
            match self.fsm.state() {
                ConnectionState::Idle => break,
                ConnectionState::Connecting => self.run_session().await,
                ConnectionState::Closed => self.run_backoff().await,
                ConnectionState::Abandoned => self.run_parked().await,
                state @ (ConnectionState::Open | ConnectionState::Closing) => {
                    // These states live entirely inside run_session.
                    error!(%exchange, %state, "Driver loop reached in-session state");
                    break;
                }
            }
        }

        info!(%exchange, "Connection task stopped");
    }

    /// Feed one event into the state machine and absorb its actions.
    ///
    /// Socket-bound actions (handshake, close) are handled by the caller,
    /// which owns the socket halves.
    fn dispatch(&mut self, event: ConnEvent) -> Vec<ConnAction> {
        let actions = self.fsm.handle_event(event, Instant::now());

        for action in &actions {
            match action {
                ConnAction::ScheduleRetry(delay) => {
                    self.retry_delay = *delay;
                    self.stats.record_reconnect();
                }
                ConnAction::ReportAbandoned => {
                    let err = WsError::GiveUp {
                        attempts: self.fsm.attempts(),
                    };
                    error!(
                        exchange = %self.adapter.exchange(),
                        error = %err,
                        "Connection abandoned"
                    );
                }
                _ => {}
            }
        }

        self.stats.set_attempts(self.fsm.attempts());
        *self.shared_state.write() = self.fsm.state();
        actions
    }

    /// One dial attempt plus, on success, the full Open session.
    async fn run_session(&mut self) {
        let url = self.adapter.endpoint(&self.symbols);
        debug!(exchange = %self.adapter.exchange(), %url, "Dialing");

        let dial = tokio::time::timeout(self.config.connect_timeout, connect_async(&url));
        let dialed = tokio::select! {
            () = self.token.cancelled() => {
                self.dispatch(ConnEvent::StopRequested);
                return;
            }
            result = dial => result,
        };

        let ws_stream = match dialed {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                let err = WsError::from(e);
                warn!(exchange = %self.adapter.exchange(), error = %err, "Connect failed");
                self.dispatch(ConnEvent::SocketError);
                return;
            }
            Err(_) => {
                let err = WsError::ConnectFailed(format!(
                    "timed out after {}ms",
                    self.config.connect_timeout.as_millis()
                ));
                warn!(exchange = %self.adapter.exchange(), error = %err, "Connect failed");
                self.dispatch(ConnEvent::SocketError);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();
        let actions = self.dispatch(ConnEvent::SocketOpened);

        if actions.contains(&ConnAction::SendHandshake) {
            for msg in self.adapter.handshake(&self.symbols) {
                if let Err(e) = write.send(Message::Text(msg)).await {
                    error!(exchange = %self.adapter.exchange(), error = %e, "Handshake send failed");
                    self.dispatch(ConnEvent::SocketError);
                    return;
                }
            }
        }
        if actions.contains(&ConnAction::StartHeartbeat) {
            self.heartbeat.reset();
        }
        info!(exchange = %self.adapter.exchange(), "Connected");

        let end_event = self.message_loop(&mut write, &mut read).await;
        let actions = self.dispatch(end_event);

        if actions.contains(&ConnAction::CloseSocket) {
            // Best-effort close frame; the Closing state completes on our
            // side without waiting for the server.
            let _ = write.send(Message::Close(None)).await;
            self.dispatch(ConnEvent::SocketClosed);
        }
    }

    /// Pump the socket until something ends the session.
    async fn message_loop(&mut self, write: &mut WsSink, read: &mut WsSource) -> ConnEvent {
        // One-shot stability timer; once it fires the backoff counter resets.
        let grace = tokio::time::sleep(self.config.stable_open);
        tokio::pin!(grace);
        let mut grace_fired = false;

        loop {
            tokio::select! {
                () = self.token.cancelled() => {
                    return ConnEvent::StopRequested;
                }

                () = &mut grace, if !grace_fired => {
                    grace_fired = true;
                    self.dispatch(ConnEvent::OpenGraceElapsed);
                }

                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ConnCommand::SetSymbols(next)) => {
                        if let Some(event) = self.apply_symbols(write, next).await {
                            return event;
                        }
                    }
                    Some(ConnCommand::Reconnect) => {
                        return ConnEvent::ReconnectRequested { reset_attempts: true };
                    }
                    None => return ConnEvent::StopRequested,
                },

                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        self.heartbeat.record_frame();
                        self.handle_frame(&text);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        self.heartbeat.record_frame();
                        if write.send(Message::Pong(data)).await.is_err() {
                            return ConnEvent::SocketError;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        self.heartbeat.record_frame();
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (f.code.into(), f.reason.to_string()))
                            .unwrap_or((1000u16, "Normal close".to_string()));
                        let err = WsError::ConnectionClosed { code, reason };
                        warn!(
                            exchange = %self.adapter.exchange(),
                            error = %err,
                            "Socket closed by server"
                        );
                        return ConnEvent::SocketClosed;
                    }
                    Some(Err(e)) => {
                        error!(exchange = %self.adapter.exchange(), error = %e, "Socket read error");
                        return ConnEvent::SocketError;
                    }
                    None => {
                        warn!(exchange = %self.adapter.exchange(), "Socket stream ended");
                        return ConnEvent::SocketClosed;
                    }
                    _ => {}
                },

                _ = self.heartbeat.tick() => {
                    if self.heartbeat.is_stalled() {
                        let err = WsError::Stalled {
                            silent_ms: self.heartbeat.silent_ms(),
                        };
                        error!(exchange = %self.adapter.exchange(), error = %err, "Heartbeat stall");
                        return ConnEvent::Stalled;
                    }

                    let probed = match self.adapter.probe() {
                        Probe::Frame => write.send(Message::Ping(Vec::new())).await,
                        Probe::Text(text) => write.send(Message::Text(text)).await,
                    };
                    if probed.is_err() {
                        return ConnEvent::SocketError;
                    }
                }
            }
        }
    }

    /// Diff the desired symbol set against the live one and resubscribe.
    ///
    /// Returns an event when the change requires ending the session.
    async fn apply_symbols(&mut self, write: &mut WsSink, next: Vec<String>) -> Option<ConnEvent> {
        let current: HashSet<&str> = self.symbols.iter().map(String::as_str).collect();
        let desired: HashSet<&str> = next.iter().map(String::as_str).collect();
        if current == desired {
            return None;
        }

        if !self.adapter.supports_incremental() {
            info!(
                exchange = %self.adapter.exchange(),
                "Symbol set changed, venue requires a reconnect cycle"
            );
            self.symbols = next;
            return Some(ConnEvent::ReconnectRequested {
                reset_attempts: false,
            });
        }

        let removed: Vec<String> = current
            .difference(&desired)
            .map(|s| s.to_string())
            .collect();
        let added: Vec<String> = desired
            .difference(&current)
            .map(|s| s.to_string())
            .collect();

        for msg in self
            .adapter
            .unsubscribe_messages(&removed)
            .into_iter()
            .chain(self.adapter.subscribe_messages(&added))
        {
            if let Err(e) = write.send(Message::Text(msg)).await {
                error!(exchange = %self.adapter.exchange(), error = %e, "Resubscribe send failed");
                self.symbols = next;
                return Some(ConnEvent::SocketError);
            }
        }

        debug!(
            exchange = %self.adapter.exchange(),
            added = added.len(),
            removed = removed.len(),
            "Applied incremental subscription change"
        );
        self.symbols = next;
        None
    }

    /// Parse one inbound frame and forward its updates.
    ///
    /// A malformed frame is logged and counted; it never ends the session.
    fn handle_frame(&self, text: &str) {
        match self.adapter.parse(text) {
            Ok(updates) => {
                for update in updates {
                    match self.update_tx.try_send(update) {
                        Ok(()) => self.stats.record_forwarded(),
                        Err(TrySendError::Full(_)) => {
                            self.stats.record_dropped();
                            debug!(
                                exchange = %self.adapter.exchange(),
                                "Aggregator lagging, update dropped"
                            );
                        }
                        Err(TrySendError::Closed(_)) => {
                            self.stats.record_dropped();
                            debug!(
                                exchange = %self.adapter.exchange(),
                                "Aggregator gone, update dropped"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                self.stats.record_parse_error();
                warn!(
                    exchange = %self.adapter.exchange(),
                    error = %e,
                    "Discarding malformed frame"
                );
            }
        }
    }

    /// Wait out the backoff delay, cancellation- and command-aware.
    async fn run_backoff(&mut self) {
        let delay = self.retry_delay + jitter();
        warn!(
            exchange = %self.adapter.exchange(),
            attempt = self.fsm.attempts(),
            delay_ms = delay.as_millis(),
            "Reconnecting after backoff"
        );

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = self.token.cancelled() => {
                    self.dispatch(ConnEvent::StopRequested);
                    return;
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ConnCommand::SetSymbols(next)) => {
                        // Applied on the next dial.
                        self.symbols = next;
                    }
                    Some(ConnCommand::Reconnect) => {
                        self.dispatch(ConnEvent::ReconnectRequested { reset_attempts: true });
                        return;
                    }
                    None => {
                        self.dispatch(ConnEvent::StopRequested);
                        return;
                    }
                },
                () = &mut sleep => {
                    self.dispatch(ConnEvent::RetryTimerFired);
                    return;
                }
            }
        }
    }

    /// Park in Abandoned until an explicit reconnect or shutdown.
    async fn run_parked(&mut self) {
        info!(
            exchange = %self.adapter.exchange(),
            "Connection abandoned, awaiting explicit reconnect"
        );

        loop {
            tokio::select! {
                () = self.token.cancelled() => {
                    self.dispatch(ConnEvent::StopRequested);
                    return;
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ConnCommand::SetSymbols(next)) => {
                        self.symbols = next;
                    }
                    Some(ConnCommand::Reconnect) => {
                        self.dispatch(ConnEvent::ReconnectRequested { reset_attempts: true });
                        return;
                    }
                    None => {
                        self.dispatch(ConnEvent::StopRequested);
                        return;
                    }
                },
            }
        }
    }
}

/// Random jitter (0-1000ms) smeared over backoff delays so a fleet of
/// connections does not thunder back in lockstep.
fn jitter() -> Duration {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    Duration::from_millis((nanos % 1000) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.policy.max_attempts, 5);
        assert_eq!(config.stable_open, Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_bounded() {
        for _ in 0..100 {
            assert!(jitter() < Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_stats_counters() {
        let stats = ConnectionStats::default();
        stats.record_forwarded();
        stats.record_dropped();
        stats.record_parse_error();
        stats.record_reconnect();
        stats.set_attempts(3);

        assert_eq!(stats.updates_forwarded(), 1);
        assert_eq!(stats.updates_dropped(), 1);
        assert_eq!(stats.parse_errors(), 1);
        assert_eq!(stats.reconnects(), 1);
        assert_eq!(stats.attempts(), 3);
    }
}

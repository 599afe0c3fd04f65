//! Feed manager.
//!
//! One `FeedManager` value owns every exchange connection, the pump task
//! that feeds the fan-out and the latest-price cache, and the root
//! cancellation token. Callers construct and own it directly - there is no
//! global instance - so tests can run several isolated managers.
//!
//! Locking discipline: the connection map and consumer registry are held
//! only for the duration of a map mutation or read, never across socket
//! I/O or an await.

use crate::cache::LatestPrices;
use crate::error::{AggError, AggResult};
use crate::fanout::{ConsumerId, FanOut};
use crate::registry::SubscriptionRegistry;
use crate::requests::{ReconnectRequest, SubscriptionAction, SubscriptionRequest};
use crate::status::{ExchangeStatus, StatusReport};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use pricemux_adapters::{adapter_for, ProtocolAdapter};
use pricemux_core::{ExchangeId, PriceUpdate};
use pricemux_ws::{ConnCommand, ConnectionConfig, ConnectionHandle, ConnectionState, ExchangeConnection};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Feed manager tuning.
#[derive(Debug, Clone, Copy)]
pub struct FeedManagerConfig {
    /// Per-connection lifecycle settings.
    pub connection: ConnectionConfig,
    /// Capacity of the shared connection -> pump channel.
    pub update_buffer: usize,
    /// Capacity of each consumer's queue.
    pub consumer_buffer: usize,
    /// Bound on waiting for a connection task during stop/remove.
    pub stop_timeout: Duration,
}

impl Default for FeedManagerConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            update_buffer: 1024,
            consumer_buffer: 256,
            stop_timeout: Duration::from_secs(5),
        }
    }
}

/// Owns the exchange connections and fans updates out to consumers.
pub struct FeedManager {
    config: FeedManagerConfig,
    registry: Arc<SubscriptionRegistry>,
    fanout: Arc<FanOut>,
    cache: Arc<LatestPrices>,
    connections: RwLock<HashMap<ExchangeId, ConnectionHandle>>,
    update_tx: mpsc::Sender<PriceUpdate>,
    token: CancellationToken,
    pump: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl FeedManager {
    /// Create a manager and start its pump task.
    pub fn new(config: FeedManagerConfig) -> Self {
        let (update_tx, update_rx) = mpsc::channel(config.update_buffer);
        let fanout = Arc::new(FanOut::new(config.consumer_buffer));
        let cache = Arc::new(LatestPrices::new());
        let token = CancellationToken::new();

        let pump = spawn_pump(update_rx, fanout.clone(), cache.clone(), token.clone());

        Self {
            config,
            registry: Arc::new(SubscriptionRegistry::new()),
            fanout,
            cache,
            connections: RwLock::new(HashMap::new()),
            update_tx,
            token,
            pump: Mutex::new(Some(pump)),
            stopped: AtomicBool::new(false),
        }
    }

    /// Start (or update) connections for the given exchanges.
    ///
    /// Idempotent: exchanges that already have a live connection get their
    /// symbol set updated instead of a duplicate connection.
    pub async fn start(
        &self,
        exchanges: &[ExchangeId],
        initial_symbols: &[String],
    ) -> AggResult<()> {
        for &exchange in exchanges {
            self.register(adapter_for(exchange), initial_symbols).await?;
        }
        Ok(())
    }

    /// Start (or update) one connection with an explicit adapter.
    ///
    /// This is the seam tests use to point adapters at local servers.
    pub async fn register(
        &self,
        adapter: Arc<dyn ProtocolAdapter>,
        symbols: &[String],
    ) -> AggResult<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(AggError::Stopped);
        }

        let exchange = adapter.exchange();
        self.registry.add_symbols(exchange, symbols);
        let desired = self.registry.current_sorted(exchange);

        let existing = {
            let connections = self.connections.read();
            connections.get(&exchange).map(|handle| handle.commands())
        };

        match existing {
            Some(commands) => {
                debug!(%exchange, "Already connected, updating symbol set");
                if commands.send(ConnCommand::SetSymbols(desired)).await.is_err() {
                    warn!(%exchange, "Connection task gone, symbol update dropped");
                }
            }
            None => {
                info!(%exchange, symbols = desired.len(), "Starting connection");
                let handle = ExchangeConnection::spawn(
                    adapter,
                    self.config.connection,
                    desired,
                    self.update_tx.clone(),
                    &self.token,
                );
                self.connections.write().insert(exchange, handle);
            }
        }
        Ok(())
    }

    /// Stop every connection and the pump task.
    ///
    /// Completes even when sockets are unresponsive: each task gets a
    /// bounded wait, then is aborted.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Stopping feed manager");
        self.token.cancel();

        let handles: Vec<ConnectionHandle> = {
            let mut connections = self.connections.write();
            connections.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            let exchange = handle.exchange();
            if !handle.stop(self.config.stop_timeout).await {
                warn!(%exchange, "Connection force-abandoned during stop");
            }
        }

        let pump = self.pump.lock().take();
        if let Some(pump) = pump {
            if tokio::time::timeout(self.config.stop_timeout, pump).await.is_err() {
                warn!("Pump task unresponsive during stop");
            }
        }
        info!("Feed manager stopped");
    }

    /// Stop and remove one exchange entirely.
    pub async fn remove(&self, exchange: ExchangeId) -> AggResult<()> {
        let handle = self
            .connections
            .write()
            .remove(&exchange)
            .ok_or(AggError::UnknownExchange(exchange))?;
        handle.stop(self.config.stop_timeout).await;
        self.registry.remove_exchange(exchange);
        Ok(())
    }

    /// Register a stream consumer.
    pub fn subscribe(&self) -> (ConsumerId, mpsc::Receiver<PriceUpdate>) {
        self.fanout.subscribe()
    }

    /// Remove a stream consumer.
    pub fn unsubscribe(&self, id: ConsumerId) -> bool {
        self.fanout.unsubscribe(id)
    }

    /// Point-in-time connection states, safe from any caller.
    pub fn status(&self) -> HashMap<ExchangeId, ConnectionState> {
        self.connections
            .read()
            .iter()
            .map(|(&exchange, handle)| (exchange, handle.state()))
            .collect()
    }

    /// Structured status report for an ops surface.
    pub fn status_report(&self) -> StatusReport {
        let exchanges = {
            let connections = self.connections.read();
            connections
                .iter()
                .map(|(&exchange, handle)| {
                    let stats = handle.stats();
                    ExchangeStatus {
                        exchange,
                        state: handle.state(),
                        attempts: stats.attempts(),
                        updates_forwarded: stats.updates_forwarded(),
                        updates_dropped: stats.updates_dropped(),
                        parse_errors: stats.parse_errors(),
                        reconnects: stats.reconnects(),
                        symbols: self.registry.current_sorted(exchange),
                    }
                })
                .collect()
        };

        StatusReport {
            generated_at: Utc::now(),
            consumers: self.fanout.consumer_count(),
            exchanges,
        }
    }

    /// Force a reconnect, resetting the backoff budget, regardless of any
    /// pending retry timer.
    pub async fn reconnect(&self, exchange: ExchangeId) -> AggResult<()> {
        let commands = {
            let connections = self.connections.read();
            connections
                .get(&exchange)
                .map(|handle| handle.commands())
                .ok_or(AggError::UnknownExchange(exchange))?
        };
        info!(%exchange, "External reconnect requested");
        if commands.send(ConnCommand::Reconnect).await.is_err() {
            warn!(%exchange, "Connection task gone, reconnect dropped");
        }
        Ok(())
    }

    /// Apply a boundary reconnect request.
    pub async fn apply_reconnect(&self, request: ReconnectRequest) -> AggResult<()> {
        self.reconnect(request.exchange).await
    }

    /// Apply a boundary subscription request.
    ///
    /// Mutates the registry and, when the exchange has a live connection,
    /// pushes the new symbol set to it. An exchange with no connection yet
    /// just gets its registry entry updated.
    pub async fn apply(&self, request: SubscriptionRequest) -> AggResult<()> {
        let changed = match request.action {
            SubscriptionAction::Add => self
                .registry
                .add_symbols(request.exchange, &request.symbols),
            SubscriptionAction::Remove => self
                .registry
                .remove_symbols(request.exchange, &request.symbols),
        };
        if !changed {
            return Ok(());
        }

        let commands = {
            let connections = self.connections.read();
            connections.get(&request.exchange).map(|handle| handle.commands())
        };
        if let Some(commands) = commands {
            let desired = self.registry.current_sorted(request.exchange);
            if commands.send(ConnCommand::SetSymbols(desired)).await.is_err() {
                warn!(exchange = %request.exchange, "Connection task gone, symbol update dropped");
            }
        }
        Ok(())
    }

    /// The in-memory latest-price view.
    pub fn cache(&self) -> Arc<LatestPrices> {
        self.cache.clone()
    }

    /// Latest update for one instrument, if any has arrived.
    pub fn latest(&self, exchange: ExchangeId, symbol: &str) -> Option<PriceUpdate> {
        self.cache.get(exchange, symbol)
    }

    /// The symbol registry (shared with the API boundary).
    pub fn registry(&self) -> Arc<SubscriptionRegistry> {
        self.registry.clone()
    }
}

/// Single pump task: preserves per-connection frame order into the
/// fan-out and keeps the cache fresh even with zero consumers.
fn spawn_pump(
    mut update_rx: mpsc::Receiver<PriceUpdate>,
    fanout: Arc<FanOut>,
    cache: Arc<LatestPrices>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                maybe = update_rx.recv() => match maybe {
                    Some(update) => {
                        cache.record(&update);
                        fanout.publish(&update);
                    }
                    None => break,
                },
            }
        }
        debug!("Pump task stopped");
    })
}

//! Consumer fan-out.
//!
//! An explicit consumer registry replaces event-emitter style callbacks:
//! each consumer gets its own bounded queue and a slow consumer loses
//! updates instead of stalling ingestion. Delivery is at-most-once per
//! update per consumer; per-connection ordering is preserved because a
//! single pump task publishes sequentially.

use parking_lot::RwLock;
use pricemux_core::PriceUpdate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// Opaque consumer registration id.
pub type ConsumerId = u64;

/// Registry of update consumers.
#[derive(Debug)]
pub struct FanOut {
    consumers: RwLock<HashMap<ConsumerId, mpsc::Sender<PriceUpdate>>>,
    next_id: AtomicU64,
    buffer: usize,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl FanOut {
    /// Create a fan-out with the given per-consumer queue capacity.
    pub fn new(buffer: usize) -> Self {
        Self {
            consumers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer,
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a consumer; returns its id and the receiving end of its
    /// bounded queue.
    pub fn subscribe(&self) -> (ConsumerId, mpsc::Receiver<PriceUpdate>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);
        self.consumers.write().insert(id, tx);
        debug!(consumer = id, "Consumer registered");
        (id, rx)
    }

    /// Remove a consumer. Returns false when the id was unknown.
    pub fn unsubscribe(&self, id: ConsumerId) -> bool {
        let removed = self.consumers.write().remove(&id).is_some();
        if removed {
            debug!(consumer = id, "Consumer removed");
        }
        removed
    }

    /// Deliver one update to every live consumer, never blocking.
    ///
    /// Consumers whose queue is full lose this update; consumers whose
    /// receiver is gone are pruned.
    pub fn publish(&self, update: &PriceUpdate) {
        let mut dead = Vec::new();
        {
            let consumers = self.consumers.read();
            for (&id, tx) in consumers.iter() {
                match tx.try_send(update.clone()) {
                    Ok(()) => {
                        self.delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(TrySendError::Closed(_)) => {
                        dead.push(id);
                    }
                }
            }
        }
        if !dead.is_empty() {
            let mut consumers = self.consumers.write();
            for id in dead {
                consumers.remove(&id);
                debug!(consumer = id, "Consumer receiver dropped, pruned");
            }
        }
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.read().len()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

//! Application wiring.
//!
//! Builds the feed manager from configuration, attaches a logging
//! consumer, refreshes metrics from the status report on a fixed cadence,
//! and shuts everything down on ctrl-c.

use crate::config::AppConfig;
use crate::error::AppResult;
use pricemux_agg::{FeedManager, StatusReport};
use pricemux_telemetry::metrics;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Application {
    config: AppConfig,
    manager: Arc<FeedManager>,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        let manager = Arc::new(FeedManager::new(config.manager_config()));
        Self { config, manager }
    }

    /// The feed manager, for embedding callers.
    pub fn manager(&self) -> Arc<FeedManager> {
        self.manager.clone()
    }

    /// Run until ctrl-c, then stop every connection.
    pub async fn run(&self) -> AppResult<()> {
        for entry in &self.config.exchanges {
            self.manager.start(&[entry.id], &entry.symbols).await?;
        }
        info!(exchanges = self.config.exchanges.len(), "Feed manager started");

        // Tick consumer: keeps a trace of the live stream. The latest-price
        // cache is refreshed by the manager's pump independently of this.
        let (_consumer_id, mut updates) = self.manager.subscribe();
        let consumer = tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                debug!(
                    exchange = %update.exchange,
                    symbol = %update.symbol,
                    price = %update.price,
                    "Tick"
                );
            }
        });

        let status_interval = self.config.status_interval();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
                () = tokio::time::sleep(status_interval) => {
                    let report = self.manager.status_report();
                    publish_metrics(&report);
                    for exchange in &report.exchanges {
                        info!(
                            exchange = %exchange.exchange,
                            state = %exchange.state,
                            attempts = exchange.attempts,
                            updates = exchange.updates_forwarded,
                            dropped = exchange.updates_dropped,
                            parse_errors = exchange.parse_errors,
                            "Status"
                        );
                    }
                }
            }
        }

        self.manager.stop().await;
        consumer.abort();
        Ok(())
    }
}

/// Mirror the status report into the Prometheus registry.
fn publish_metrics(report: &StatusReport) {
    for exchange in &report.exchanges {
        let name = exchange.exchange.as_str();
        metrics::set_connection_state(name, &exchange.state.to_string().to_lowercase());
        metrics::RECONNECT_ATTEMPTS
            .with_label_values(&[name])
            .set(i64::from(exchange.attempts));
        metrics::RECONNECTS_TOTAL
            .with_label_values(&[name])
            .set(exchange.reconnects as i64);
        metrics::UPDATES_TOTAL
            .with_label_values(&[name])
            .set(exchange.updates_forwarded as i64);
        metrics::UPDATES_DROPPED_TOTAL
            .with_label_values(&[name])
            .set(exchange.updates_dropped as i64);
        metrics::PARSE_ERRORS_TOTAL
            .with_label_values(&[name])
            .set(exchange.parse_errors as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pricemux_agg::ExchangeStatus;
    use pricemux_core::ExchangeId;
    use pricemux_ws::ConnectionState;

    #[tokio::test]
    async fn test_application_builds_from_default_config() {
        let app = Application::new(AppConfig::default());
        assert!(app.manager().status().is_empty());
    }

    #[test]
    fn test_publish_metrics_reflects_report() {
        let report = StatusReport {
            generated_at: Utc::now(),
            consumers: 1,
            exchanges: vec![ExchangeStatus {
                exchange: ExchangeId::Gate,
                state: ConnectionState::Abandoned,
                attempts: 5,
                updates_forwarded: 42,
                updates_dropped: 1,
                parse_errors: 2,
                reconnects: 5,
                symbols: vec![],
            }],
        };

        publish_metrics(&report);
        assert_eq!(
            metrics::UPDATES_TOTAL.with_label_values(&["gate"]).get(),
            42
        );
        assert_eq!(
            metrics::CONNECTION_STATE
                .with_label_values(&["gate", "abandoned"])
                .get(),
            1.0
        );
    }
}

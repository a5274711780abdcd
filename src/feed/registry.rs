//! Feed registry
//!
//! Owns every live market-data feed, keyed by symbol. Callers subscribe and
//! look up feeds through an explicit registry value instead of module-level
//! globals, so independent registries never share connections.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::config::Config;
use crate::feed::orderbook::OrderbookFeed;
use crate::feed::trades::TradeFeed;
use crate::ws::ReconnectPolicy;

pub struct FeedRegistry {
    gomarket_host: String,
    policy: ReconnectPolicy,
    max_levels: usize,
    max_trades: usize,
    orderbooks: RwLock<HashMap<String, Arc<OrderbookFeed>>>,
    tapes: RwLock<HashMap<String, Arc<TradeFeed>>>,
}

impl FeedRegistry {
    pub fn new(config: &Config) -> Self {
        Self::with_policy(config, ReconnectPolicy::default())
    }

    pub fn with_policy(config: &Config, policy: ReconnectPolicy) -> Self {
        Self {
            gomarket_host: config.gomarket_ws_url.clone(),
            policy,
            max_levels: config.max_levels,
            max_trades: config.max_trades,
            orderbooks: RwLock::new(HashMap::new()),
            tapes: RwLock::new(HashMap::new()),
        }
    }

    /// Open an orderbook feed for `symbol`. Subscribing a symbol that is
    /// already live tears down the old feed and opens a fresh one.
    pub async fn subscribe_orderbook(&self, symbol: &str) -> Arc<OrderbookFeed> {
        let mut books = self.orderbooks.write().await;
        if let Some(old) = books.remove(symbol) {
            info!(symbol = %symbol, "Replacing existing orderbook feed");
            old.shutdown().await;
        }

        let feed = Arc::new(OrderbookFeed::subscribe(
            &self.gomarket_host,
            symbol,
            self.max_levels,
            self.policy,
        ));
        books.insert(symbol.to_string(), Arc::clone(&feed));
        feed
    }

    pub async fn orderbook(&self, symbol: &str) -> Option<Arc<OrderbookFeed>> {
        self.orderbooks.read().await.get(symbol).cloned()
    }

    /// Tear down the orderbook feed for `symbol`. Returns false when none
    /// was live.
    pub async fn unsubscribe_orderbook(&self, symbol: &str) -> bool {
        let removed = self.orderbooks.write().await.remove(symbol);
        match removed {
            Some(feed) => {
                feed.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Open a trade feed for `symbol`, replacing any live one.
    pub async fn subscribe_trades(&self, symbol: &str) -> Arc<TradeFeed> {
        let mut tapes = self.tapes.write().await;
        if let Some(old) = tapes.remove(symbol) {
            info!(symbol = %symbol, "Replacing existing trade feed");
            old.shutdown().await;
        }

        let feed = Arc::new(TradeFeed::subscribe(
            &self.gomarket_host,
            symbol,
            self.max_trades,
            self.policy,
        ));
        tapes.insert(symbol.to_string(), Arc::clone(&feed));
        feed
    }

    pub async fn trades(&self, symbol: &str) -> Option<Arc<TradeFeed>> {
        self.tapes.read().await.get(symbol).cloned()
    }

    pub async fn unsubscribe_trades(&self, symbol: &str) -> bool {
        let removed = self.tapes.write().await.remove(symbol);
        match removed {
            Some(feed) => {
                feed.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Tear down every feed.
    pub async fn shutdown_all(&self) {
        let books: Vec<_> = self.orderbooks.write().await.drain().collect();
        for (_, feed) in books {
            feed.shutdown().await;
        }
        let tapes: Vec<_> = self.tapes.write().await.drain().collect();
        for (_, feed) in tapes {
            feed.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            // Discard port; connects fail fast and the registry bookkeeping
            // is what these tests exercise.
            gomarket_ws_url: "ws://127.0.0.1:9".to_string(),
            ..Config::default()
        }
    }

    fn test_policy() -> ReconnectPolicy {
        ReconnectPolicy::new(Duration::from_millis(10), Duration::from_millis(20), 1)
    }

    #[tokio::test]
    async fn test_subscribe_and_lookup() {
        let registry = FeedRegistry::with_policy(&test_config(), test_policy());
        assert!(registry.orderbook("BTC-USDT-PERP").await.is_none());

        let feed = registry.subscribe_orderbook("BTC-USDT-PERP").await;
        assert_eq!(feed.symbol(), "BTC-USDT-PERP");

        let found = registry.orderbook("BTC-USDT-PERP").await.unwrap();
        assert!(Arc::ptr_eq(&feed, &found));

        registry.shutdown_all().await;
        assert!(registry.orderbook("BTC-USDT-PERP").await.is_none());
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_feed() {
        let registry = FeedRegistry::with_policy(&test_config(), test_policy());

        let first = registry.subscribe_trades("ETH-USDT-PERP").await;
        let second = registry.subscribe_trades("ETH-USDT-PERP").await;
        assert!(!Arc::ptr_eq(&first, &second));

        let found = registry.trades("ETH-USDT-PERP").await.unwrap();
        assert!(Arc::ptr_eq(&second, &found));

        registry.shutdown_all().await;
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let registry = FeedRegistry::with_policy(&test_config(), test_policy());

        registry.subscribe_orderbook("BTC-USDT-PERP").await;
        assert!(registry.unsubscribe_orderbook("BTC-USDT-PERP").await);
        assert!(!registry.unsubscribe_orderbook("BTC-USDT-PERP").await);
        assert!(!registry.unsubscribe_trades("BTC-USDT-PERP").await);
    }
}

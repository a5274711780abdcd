//! L2 orderbook feed
//!
//! Subscribes to the GoMarket l2-orderbook channel for one symbol and keeps
//! the latest aggregated view. Every inbound message is a full snapshot that
//! replaces the book; a snapshot that fails to parse is dropped whole and the
//! previous view stays visible alongside the error.

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{FeedError, FeedResult};
use crate::gomarket::{self, Channel, DepthSnapshot};
use crate::ws::{ReconnectPolicy, StreamClient, StreamEvent};

/// One price level with the running depth total for its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookLevel {
    pub price: Decimal,
    pub size: Decimal,
    /// Sum of sizes from the top of this side through this level
    pub cumulative: Decimal,
}

/// Aggregated book. Bids are ordered best (highest) first, asks best
/// (lowest) first, exactly as the upstream snapshot delivers them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderbookView {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderbookView {
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }
}

/// Aggregate a full snapshot into a view.
///
/// Each side is truncated to `max_levels` before anything is parsed; levels
/// beyond the cut are ignored entirely. Any unparseable price or size within
/// the kept window rejects the whole snapshot, as does a cumulative total
/// past `Decimal` range.
pub fn aggregate(snapshot: &DepthSnapshot, max_levels: usize) -> FeedResult<OrderbookView> {
    Ok(OrderbookView {
        bids: aggregate_side(&snapshot.bids, max_levels, "bid")?,
        asks: aggregate_side(&snapshot.asks, max_levels, "ask")?,
    })
}

fn aggregate_side(
    levels: &[[String; 2]],
    max_levels: usize,
    side: &str,
) -> FeedResult<Vec<BookLevel>> {
    let mut out = Vec::with_capacity(levels.len().min(max_levels));
    let mut total = Decimal::ZERO;

    for [price_str, size_str] in levels.iter().take(max_levels) {
        let price = Decimal::from_str(price_str).map_err(|e| {
            FeedError::BadLevel(format!("invalid {} price {:?}: {}", side, price_str, e))
        })?;
        let size = Decimal::from_str(size_str).map_err(|e| {
            FeedError::BadLevel(format!("invalid {} size {:?}: {}", side, size_str, e))
        })?;
        total = total
            .checked_add(size)
            .ok_or_else(|| FeedError::BadLevel(format!("{} cumulative size overflowed", side)))?;
        out.push(BookLevel {
            price,
            size,
            cumulative: total,
        });
    }

    Ok(out)
}

#[derive(Default)]
struct FeedState {
    view: Arc<OrderbookView>,
    last_error: Option<String>,
}

/// Live orderbook feed for one symbol.
///
/// Owns the stream client and a task that applies snapshots as they arrive.
/// Readers take cheap `Arc` clones of the current view.
pub struct OrderbookFeed {
    symbol: String,
    client: StreamClient,
    state: Arc<RwLock<FeedState>>,
    apply_task: JoinHandle<()>,
}

impl OrderbookFeed {
    /// Open the feed and start applying snapshots.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(
        gomarket_host: &str,
        symbol: impl Into<String>,
        max_levels: usize,
        policy: ReconnectPolicy,
    ) -> Self {
        let symbol = symbol.into();
        let url = gomarket::ws_url(gomarket_host, Channel::L2Orderbook, &symbol);
        let (client, events) = StreamClient::new(url, policy);
        let state = Arc::new(RwLock::new(FeedState::default()));
        let apply_task = tokio::spawn(run_apply(
            events,
            Arc::clone(&state),
            max_levels,
            symbol.clone(),
        ));
        client.connect();

        Self {
            symbol,
            client,
            state,
            apply_task,
        }
    }

    /// Latest aggregated view. Stale data survives transport and parse
    /// failures; check [`last_error`](Self::last_error) for staleness.
    pub async fn view(&self) -> Arc<OrderbookView> {
        Arc::clone(&self.state.read().await.view)
    }

    /// Most recent feed error, cleared on the next good snapshot.
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Close the transport, stop applying updates, and drop state.
    pub async fn shutdown(&self) {
        self.client.disconnect();
        self.apply_task.abort();
        let mut guard = self.state.write().await;
        *guard = FeedState::default();
    }
}

impl Drop for OrderbookFeed {
    fn drop(&mut self) {
        self.client.disconnect();
        self.apply_task.abort();
    }
}

async fn run_apply(
    mut events: mpsc::UnboundedReceiver<StreamEvent>,
    state: Arc<RwLock<FeedState>>,
    max_levels: usize,
    symbol: String,
) {
    while let Some(event) = events.recv().await {
        match event {
            StreamEvent::Message(value) => {
                let result = serde_json::from_value::<DepthSnapshot>(value)
                    .map_err(FeedError::from)
                    .and_then(|snapshot| aggregate(&snapshot, max_levels));

                let mut guard = state.write().await;
                match result {
                    Ok(view) => {
                        guard.view = Arc::new(view);
                        guard.last_error = None;
                    }
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "Dropping orderbook update");
                        guard.last_error = Some(e.to_string());
                    }
                }
            }
            StreamEvent::Open => {
                debug!(symbol = %symbol, "Orderbook feed connected");
                state.write().await.last_error = None;
            }
            StreamEvent::Error(msg) => {
                warn!(symbol = %symbol, error = %msg, "Orderbook feed transport error");
                state.write().await.last_error = Some(FeedError::Transport(msg).to_string());
            }
            StreamEvent::Closed => {
                debug!(symbol = %symbol, "Orderbook feed disconnected");
                let mut guard = state.write().await;
                if guard.last_error.is_none() {
                    guard.last_error = Some(FeedError::Closed.to_string());
                }
            }
        }
    }
}

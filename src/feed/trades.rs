//! Last-trades feed
//!
//! Subscribes to the GoMarket last-trades channel for one symbol and keeps a
//! bounded tape of recent prints, newest first. Upstream may replay a trade
//! id; the tape records every message it is handed and never deduplicates.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{FeedError, FeedResult};
use crate::gomarket::{self, Channel, TradeMsg};
use crate::ws::{ReconnectPolicy, StreamClient, StreamEvent};

/// Taker side of a print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Classify by the maker flag: when the buyer was the resting order the
    /// taker sold, otherwise the taker bought.
    pub fn from_buyer_maker(buyer_maker: bool) -> Self {
        if buyer_maker {
            Side::Sell
        } else {
            Side::Buy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeEvent {
    pub trade_id: u64,
    pub price: Decimal,
    pub amount: Decimal,
    pub time: DateTime<Utc>,
    pub side: Side,
}

/// Bounded newest-first tape.
#[derive(Debug, Clone)]
pub struct TradeTape {
    trades: VecDeque<TradeEvent>,
    max_trades: usize,
}

impl TradeTape {
    pub fn new(max_trades: usize) -> Self {
        Self {
            trades: VecDeque::with_capacity(max_trades),
            max_trades,
        }
    }

    /// Parse one wire message and insert it at the head, evicting the oldest
    /// print once the tape is full. Returns the parsed event.
    pub fn push(&mut self, msg: &TradeMsg) -> FeedResult<TradeEvent> {
        let price = Decimal::from_str(&msg.price).map_err(|e| {
            FeedError::BadTrade(format!("invalid price {:?}: {}", msg.price, e))
        })?;
        let amount = Decimal::from_str(&msg.quantity).map_err(|e| {
            FeedError::BadTrade(format!("invalid quantity {:?}: {}", msg.quantity, e))
        })?;
        let time = Utc
            .timestamp_millis_opt(msg.timestamp)
            .single()
            .ok_or_else(|| FeedError::BadTrade(format!("invalid timestamp {}", msg.timestamp)))?;

        let event = TradeEvent {
            trade_id: msg.trade_id,
            price,
            amount,
            time,
            side: Side::from_buyer_maker(msg.buyer_maker),
        };

        self.trades.push_front(event);
        self.trades.truncate(self.max_trades);
        Ok(event)
    }

    /// Prints, newest first.
    pub fn trades(&self) -> impl Iterator<Item = &TradeEvent> {
        self.trades.iter()
    }

    pub fn latest(&self) -> Option<&TradeEvent> {
        self.trades.front()
    }

    pub fn snapshot(&self) -> Vec<TradeEvent> {
        self.trades.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn clear(&mut self) {
        self.trades.clear();
    }
}

struct TapeState {
    tape: TradeTape,
    last_error: Option<String>,
}

/// Live trade feed for one symbol.
pub struct TradeFeed {
    symbol: String,
    client: StreamClient,
    state: Arc<RwLock<TapeState>>,
    apply_task: JoinHandle<()>,
}

impl TradeFeed {
    /// Open the feed and start collecting prints.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(
        gomarket_host: &str,
        symbol: impl Into<String>,
        max_trades: usize,
        policy: ReconnectPolicy,
    ) -> Self {
        let symbol = symbol.into();
        let url = gomarket::ws_url(gomarket_host, Channel::LastTrades, &symbol);
        let (client, events) = StreamClient::new(url, policy);
        let state = Arc::new(RwLock::new(TapeState {
            tape: TradeTape::new(max_trades),
            last_error: None,
        }));
        let apply_task = tokio::spawn(run_apply(events, Arc::clone(&state), symbol.clone()));
        client.connect();

        Self {
            symbol,
            client,
            state,
            apply_task,
        }
    }

    /// Recent prints, newest first.
    pub async fn trades(&self) -> Vec<TradeEvent> {
        self.state.read().await.tape.snapshot()
    }

    pub async fn latest(&self) -> Option<TradeEvent> {
        self.state.read().await.tape.latest().copied()
    }

    /// Most recent feed error, cleared on the next good print.
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Close the transport, stop collecting, and drop the tape.
    pub async fn shutdown(&self) {
        self.client.disconnect();
        self.apply_task.abort();
        let mut guard = self.state.write().await;
        guard.tape.clear();
        guard.last_error = None;
    }
}

impl Drop for TradeFeed {
    fn drop(&mut self) {
        self.client.disconnect();
        self.apply_task.abort();
    }
}

async fn run_apply(
    mut events: mpsc::UnboundedReceiver<StreamEvent>,
    state: Arc<RwLock<TapeState>>,
    symbol: String,
) {
    while let Some(event) = events.recv().await {
        match event {
            StreamEvent::Message(value) => {
                let msg = match serde_json::from_value::<TradeMsg>(value) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "Dropping trade update");
                        state.write().await.last_error =
                            Some(FeedError::from(e).to_string());
                        continue;
                    }
                };

                let mut guard = state.write().await;
                match guard.tape.push(&msg) {
                    Ok(_) => guard.last_error = None,
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "Dropping trade update");
                        guard.last_error = Some(e.to_string());
                    }
                }
            }
            StreamEvent::Open => {
                debug!(symbol = %symbol, "Trade feed connected");
                state.write().await.last_error = None;
            }
            StreamEvent::Error(msg) => {
                warn!(symbol = %symbol, error = %msg, "Trade feed transport error");
                state.write().await.last_error = Some(FeedError::Transport(msg).to_string());
            }
            StreamEvent::Closed => {
                debug!(symbol = %symbol, "Trade feed disconnected");
                let mut guard = state.write().await;
                if guard.last_error.is_none() {
                    guard.last_error = Some(FeedError::Closed.to_string());
                }
            }
        }
    }
}

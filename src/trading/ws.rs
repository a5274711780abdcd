//! Private trading WebSocket
//!
//! Authenticated stream for account-scoped channels (orders, positions,
//! fills). Subscriptions are announced with `{action, channel}` frames and
//! tracked in the handle, so every reconnect re-announces the full set
//! before any message is missed for long.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ws::{ReconnectPolicy, StreamClient, StreamEvent};

/// One message from a private channel.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelMessage {
    pub channel: String,
    pub data: serde_json::Value,
    pub timestamp: String,
}

/// Handle to the private trading stream.
pub struct TradingSocket {
    client: StreamClient,
    subscriptions: Arc<Mutex<BTreeSet<String>>>,
    pump_task: JoinHandle<()>,
}

impl TradingSocket {
    /// Open the stream and return the handle plus the channel-message
    /// receiver.
    ///
    /// The handshake token rides on the URL query string; an account with no
    /// token sends it empty and only public channels will deliver.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(
        ws_url: &str,
        handshake_token: &str,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelMessage>) {
        let url = socket_url(ws_url, handshake_token);
        let (client, events) = StreamClient::new(url, policy);
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let subscriptions = Arc::new(Mutex::new(BTreeSet::new()));

        let pump_task = tokio::spawn(run_pump(
            client.clone(),
            events,
            msg_tx,
            Arc::clone(&subscriptions),
        ));
        client.connect();

        let socket = Self {
            client,
            subscriptions,
            pump_task,
        };
        (socket, msg_rx)
    }

    /// Subscribe to a channel. Takes effect immediately on a live
    /// connection and is replayed after every reconnect.
    pub async fn subscribe(&self, channel: impl Into<String>) {
        let channel = channel.into();
        self.subscriptions.lock().await.insert(channel.clone());

        if self.client.is_connected() {
            let frame = json!({ "action": "subscribe", "channel": channel }).to_string();
            if !self.client.send_text(frame) {
                warn!(channel = %channel, "Failed to send subscribe frame");
            }
        } else {
            debug!(channel = %channel, "Subscription queued until connect");
        }
    }

    /// Unsubscribe from a channel and stop replaying it.
    pub async fn unsubscribe(&self, channel: &str) {
        self.subscriptions.lock().await.remove(channel);

        if self.client.is_connected() {
            let frame = json!({ "action": "unsubscribe", "channel": channel }).to_string();
            if !self.client.send_text(frame) {
                warn!(channel = %channel, "Failed to send unsubscribe frame");
            }
        }
    }

    /// Channels currently tracked for replay.
    pub async fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().await.iter().cloned().collect()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Close the stream permanently.
    pub fn disconnect(&self) {
        self.client.disconnect();
    }
}

impl Drop for TradingSocket {
    fn drop(&mut self) {
        self.client.disconnect();
        self.pump_task.abort();
    }
}

fn socket_url(ws_url: &str, handshake_token: &str) -> String {
    format!("{}?handshake_token={}", ws_url, handshake_token)
}

async fn run_pump(
    client: StreamClient,
    mut events: mpsc::UnboundedReceiver<StreamEvent>,
    messages: mpsc::UnboundedSender<ChannelMessage>,
    subscriptions: Arc<Mutex<BTreeSet<String>>>,
) {
    while let Some(event) = events.recv().await {
        match event {
            StreamEvent::Open => {
                let channels = subscriptions.lock().await;
                for channel in channels.iter() {
                    let frame = json!({ "action": "subscribe", "channel": channel }).to_string();
                    if !client.send_text(frame) {
                        warn!(channel = %channel, "Failed to replay subscription");
                    }
                }
                info!(channels = channels.len(), "Trading stream connected");
            }
            StreamEvent::Message(value) => {
                match serde_json::from_value::<ChannelMessage>(value) {
                    Ok(msg) => {
                        if messages.send(msg).is_err() {
                            debug!("Channel message receiver dropped, stopping pump");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Dropping malformed channel message");
                    }
                }
            }
            StreamEvent::Error(msg) => {
                warn!(error = %msg, "Trading stream error");
            }
            StreamEvent::Closed => {
                debug!("Trading stream disconnected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_socket_url() {
        assert_eq!(
            socket_url("wss://godark.goquant.io/ws/testnet", "tok-123"),
            "wss://godark.goquant.io/ws/testnet?handshake_token=tok-123"
        );
        // Token always rides the query string, even when empty
        assert_eq!(
            socket_url("wss://godark.goquant.io/ws/testnet", ""),
            "wss://godark.goquant.io/ws/testnet?handshake_token="
        );
    }

    #[test]
    fn test_parse_channel_message() {
        let json = r#"{
            "channel": "positions",
            "data": {"symbol": "BTC-USDT-PERP", "size": "1.5"},
            "timestamp": "2025-01-15T10:30:00Z"
        }"#;

        let msg: ChannelMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.channel, "positions");
        assert_eq!(msg.data["symbol"], "BTC-USDT-PERP");
        assert_eq!(msg.timestamp, "2025-01-15T10:30:00Z");
    }

    #[tokio::test]
    async fn test_subscriptions_tracked_while_offline() {
        let policy = ReconnectPolicy::new(Duration::from_millis(10), Duration::from_millis(20), 1);
        let (socket, _messages) = TradingSocket::connect("ws://127.0.0.1:9", "", policy);

        socket.subscribe("orders").await;
        socket.subscribe("positions").await;
        socket.subscribe("orders").await;

        let subs = socket.subscriptions().await;
        assert_eq!(subs, vec!["orders".to_string(), "positions".to_string()]);

        socket.unsubscribe("orders").await;
        assert_eq!(socket.subscriptions().await, vec!["positions".to_string()]);

        socket.disconnect();
    }
}

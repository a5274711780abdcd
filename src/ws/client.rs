//! Reconnecting WebSocket stream client
//!
//! One client owns one transport to one URL. A spawned driver task services
//! the connection and delivers parsed JSON payloads over an unbounded channel.
//! Dropped connections reconnect with exponential backoff until the attempt
//! budget is exhausted or the client is closed.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ws::backoff::ReconnectPolicy;

/// Lifecycle and payload events delivered to the consumer.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Transport opened; fires on every successful (re)connect
    Open,
    /// Parsed JSON payload from one frame
    Message(serde_json::Value),
    /// Transport-level error; the close that follows drives reconnection
    Error(String),
    /// Transport closed
    Closed,
}

struct Shared {
    url: String,
    policy: ReconnectPolicy,
    connected: AtomicBool,
    attempts: AtomicU32,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<StreamEvent>,
    outbound: Mutex<mpsc::UnboundedReceiver<String>>,
}

/// Handle to one reconnecting WebSocket connection.
///
/// Clones share the same underlying connection. Dropping every handle does
/// not close the transport by itself; the driver stops once `disconnect()`
/// is called or the event receiver is dropped.
#[derive(Clone)]
pub struct StreamClient {
    shared: Arc<Shared>,
    outbound_tx: mpsc::UnboundedSender<String>,
    driver: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl StreamClient {
    /// Create a client for `url`.
    ///
    /// Returns the handle and the receiver for stream events. Nothing
    /// connects until [`connect`](Self::connect) is called.
    pub fn new(
        url: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            url: url.into(),
            policy,
            connected: AtomicBool::new(false),
            attempts: AtomicU32::new(0),
            cancel: CancellationToken::new(),
            events: events_tx,
            outbound: Mutex::new(outbound_rx),
        });

        let client = Self {
            shared,
            outbound_tx,
            driver: Arc::new(Mutex::new(None)),
        };

        (client, events_rx)
    }

    /// Start the connection driver. Idempotent: a no-op while a driver is
    /// already running, and permanently refused after [`disconnect`](Self::disconnect).
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        if self.shared.cancel.is_cancelled() {
            warn!(url = %self.shared.url, "Client closed, ignoring connect");
            return;
        }

        // try_lock failing means another connect is mid-spawn; that driver
        // covers this call too.
        let Ok(mut driver) = self.driver.try_lock() else {
            return;
        };
        if let Some(handle) = driver.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }
        *driver = Some(tokio::spawn(run_driver(Arc::clone(&self.shared))));
    }

    /// Close the connection and halt all future reconnects.
    ///
    /// Idempotent and permanent: after this returns no further open attempt
    /// will occur, including attempts already waiting on a backoff timer.
    pub fn disconnect(&self) {
        if !self.shared.cancel.is_cancelled() {
            info!(url = %self.shared.url, "Closing WebSocket client");
        }
        self.shared.cancel.cancel();
    }

    /// Whether the transport is currently open. Tracks the actual socket
    /// state, not the intent to be connected.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Queue a text frame on the live connection.
    ///
    /// Returns false when the socket is not open; the frame is not queued in
    /// that case.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.outbound_tx.send(text.into()).is_ok()
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }
}

async fn run_driver(shared: Arc<Shared>) {
    // Held for the driver's lifetime; connect() never spawns a second driver
    // while this one is alive.
    let mut outbound = shared.outbound.lock().await;

    loop {
        if shared.cancel.is_cancelled() || shared.events.is_closed() {
            break;
        }

        info!(url = %shared.url, "Connecting WebSocket");
        match connect_async(shared.url.as_str()).await {
            Ok((ws_stream, _)) => {
                shared.attempts.store(0, Ordering::SeqCst);
                shared.connected.store(true, Ordering::SeqCst);
                info!(url = %shared.url, "WebSocket connected");
                let _ = shared.events.send(StreamEvent::Open);

                run_connection(&shared, ws_stream, &mut outbound).await;

                shared.connected.store(false, Ordering::SeqCst);
                let _ = shared.events.send(StreamEvent::Closed);
            }
            Err(e) => {
                warn!(url = %shared.url, error = %e, "WebSocket connect failed");
                let _ = shared.events.send(StreamEvent::Error(e.to_string()));
                let _ = shared.events.send(StreamEvent::Closed);
            }
        }

        if shared.cancel.is_cancelled() {
            debug!(url = %shared.url, "Client closed, not reconnecting");
            break;
        }

        let attempt = shared.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let Some(delay) = shared.policy.delay(attempt) else {
            warn!(
                url = %shared.url,
                attempts = attempt - 1,
                "Reconnect attempts exhausted, giving up"
            );
            break;
        };

        warn!(
            url = %shared.url,
            attempt,
            max_attempts = shared.policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "WebSocket dropped, scheduling reconnect"
        );

        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = sleep(delay) => {}
        }
    }
}

/// Service one live connection until it drops, the client is closed, or the
/// consumer goes away.
async fn run_connection(
    shared: &Shared,
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    outbound: &mut mpsc::UnboundedReceiver<String>,
) {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            frame = outbound.recv() => {
                let Some(text) = frame else { break };
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    warn!(url = %shared.url, error = %e, "Failed to send WebSocket frame");
                    break;
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !forward_json(shared, &text) {
                            debug!(url = %shared.url, "Event receiver dropped, closing WebSocket");
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        match String::from_utf8(data.to_vec()) {
                            Ok(text) => {
                                if !forward_json(shared, &text) {
                                    break;
                                }
                            }
                            Err(_) => {
                                warn!(url = %shared.url, "Dropping non-UTF-8 binary frame");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if write.send(Message::Pong(data)).await.is_err() {
                            warn!(url = %shared.url, "Failed to send pong");
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        info!(url = %shared.url, frame = ?frame, "WebSocket close frame received");
                        break;
                    }
                    Some(Ok(Message::Frame(_))) => {
                        // Raw frames are handled inside tungstenite
                    }
                    Some(Err(e)) => {
                        warn!(url = %shared.url, error = %e, "WebSocket error");
                        let _ = shared.events.send(StreamEvent::Error(e.to_string()));
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}

/// Parse one frame as JSON and forward it. Unparseable frames are logged and
/// dropped. Returns false once the event receiver is gone.
fn forward_json(shared: &Shared, raw: &str) -> bool {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => shared.events.send(StreamEvent::Message(value)).is_ok(),
        Err(e) => {
            warn!(url = %shared.url, error = %e, "Dropping unparseable WebSocket message");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client_is_disconnected() {
        let (client, _events) = StreamClient::new("ws://127.0.0.1:9", ReconnectPolicy::default());
        assert!(!client.is_connected());
        assert_eq!(client.url(), "ws://127.0.0.1:9");
    }

    #[test]
    fn test_send_refused_while_disconnected() {
        let (client, _events) = StreamClient::new("ws://127.0.0.1:9", ReconnectPolicy::default());
        assert!(!client.send_text("{\"action\":\"subscribe\"}"));
    }

    #[test]
    fn test_connect_refused_after_disconnect() {
        let (client, _events) = StreamClient::new("ws://127.0.0.1:9", ReconnectPolicy::default());
        client.disconnect();
        // No runtime is needed because a closed client never spawns a driver.
        client.connect();
        assert!(!client.is_connected());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (client, _events) = StreamClient::new("ws://127.0.0.1:9", ReconnectPolicy::default());
        client.disconnect();
        client.disconnect();
        assert!(!client.is_connected());
    }
}

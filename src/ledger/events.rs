//! Request event listener for the insurance ledger.
//!
//! Holds a persistent WebSocket subscription to the ledger's
//! `request_raised` stream and fans observed requests into a broadcast
//! channel. The subscription is restartable from a block position: on
//! stream errors the listener reconnects with capped doubling backoff and
//! resubscribes from the last processed block, so requests are never
//! skipped (duplicates after reconnect are acceptable and tolerated by
//! consumers).

use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

use super::error::LedgerError;
use super::types::OracleRequest;

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub ws_url: String,
    /// Block to begin the subscription at. Default 0: replay from genesis.
    pub from_block: u64,
    pub reconnect_delay_secs: u64,
    pub max_reconnect_delay_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://127.0.0.1:26657/websocket".to_string(),
            from_block: 0,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 60,
        }
    }
}

pub struct RequestListener {
    config: ListenerConfig,
    event_sender: broadcast::Sender<OracleRequest>,
    state: Arc<RwLock<ListenerState>>,
    shutdown: Arc<RwLock<bool>>,
}

#[derive(Debug, Clone, Default)]
struct ListenerState {
    connected: bool,
    next_block: u64,
    last_event_time: Option<DateTime<Utc>>,
    events_received: u64,
}

impl RequestListener {
    pub fn new(config: ListenerConfig) -> Self {
        let (event_sender, _) = broadcast::channel(256);
        let state = ListenerState {
            next_block: config.from_block,
            ..ListenerState::default()
        };

        Self {
            config,
            event_sender,
            state: Arc::new(RwLock::new(state)),
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OracleRequest> {
        self.event_sender.subscribe()
    }

    /// Run the subscription until [`stop`](Self::stop) is called.
    pub async fn start(&self) -> Result<(), LedgerError> {
        info!("Starting request listener: {}", self.config.ws_url);

        let base = Duration::from_secs(self.config.reconnect_delay_secs.max(1));
        let cap = Duration::from_secs(
            self.config
                .max_reconnect_delay_secs
                .max(self.config.reconnect_delay_secs),
        );
        let mut delay = base;

        loop {
            if *self.shutdown.read().await {
                info!("Shutdown signal received, stopping request listener");
                break;
            }

            let healthy = match self.connect_and_listen().await {
                Ok(()) => {
                    info!("Ledger event stream closed");
                    true
                }
                Err(e) => {
                    error!("Ledger event stream error: {}", e);
                    false
                }
            };
            delay = next_delay(delay, base, cap, healthy);

            if *self.shutdown.read().await {
                break;
            }

            let from_block = self.state.read().await.next_block;
            info!(
                "Resubscribing from block {} in {}s",
                from_block,
                delay.as_secs()
            );
            tokio::time::sleep(delay).await;
        }

        Ok(())
    }

    pub async fn stop(&self) {
        let mut shutdown = self.shutdown.write().await;
        *shutdown = true;
        info!("Request listener stop requested");
    }

    async fn connect_and_listen(&self) -> Result<(), LedgerError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(self.config.ws_url.as_str())
            .await
            .map_err(|e| LedgerError::Stream(format!("connect: {e}")))?;

        info!("Connected to ledger event stream");

        let mut state = self.state.write().await;
        state.connected = true;
        let from_block = state.next_block;
        drop(state);

        let (mut write, mut read) = ws_stream.split();

        let subscribe_msg = serde_json::json!({
            "method": "subscribe",
            "params": {
                "stream": "request_raised",
                "from_block": from_block,
            },
            "id": 1,
        });

        write
            .send(Message::Text(subscribe_msg.to_string().into()))
            .await
            .map_err(|e| LedgerError::Stream(format!("subscribe: {e}")))?;

        let result = loop {
            let Some(msg) = read.next().await else {
                break Ok(());
            };

            if *self.shutdown.read().await {
                break Ok(());
            }

            match msg {
                Ok(Message::Text(text)) => {
                    if let Err(e) = self.handle_message(&text).await {
                        warn!("Discarding unparseable stream message: {}", e);
                    }
                }
                Ok(Message::Ping(data)) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Ok(Message::Close(_)) => {
                    info!("Ledger event stream close frame received");
                    break Ok(());
                }
                Err(e) => {
                    break Err(LedgerError::Stream(e.to_string()));
                }
                _ => {}
            }
        };

        let mut state = self.state.write().await;
        state.connected = false;

        result
    }

    async fn handle_message(&self, text: &str) -> Result<(), LedgerError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| LedgerError::Stream(format!("malformed event: {e}")))?;

        // Subscription acks and unrelated stream chatter parse to None.
        let Some(request) = Self::parse_request(&value) else {
            return Ok(());
        };

        let mut state = self.state.write().await;
        state.next_block = state.next_block.max(request.block + 1);
        state.events_received += 1;
        state.last_event_time = Some(Utc::now());
        drop(state);

        info!(
            "Status request observed: {} / {} @ {} (block {})",
            request.airline, request.flight, request.timestamp, request.block
        );

        let _ = self.event_sender.send(request);

        Ok(())
    }

    fn parse_request(value: &serde_json::Value) -> Option<OracleRequest> {
        if value.get("event").and_then(|e| e.as_str()) != Some("request_raised") {
            return None;
        }

        let block = value.get("block").and_then(|b| b.as_u64())?;
        let data = value.get("data")?;

        Some(OracleRequest {
            airline: data.get("airline").and_then(|v| v.as_str())?.to_string(),
            flight: data.get("flight").and_then(|v| v.as_str())?.to_string(),
            timestamp: data.get("timestamp").and_then(|v| v.as_u64())?,
            block,
        })
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.connected
    }

    pub async fn events_received(&self) -> u64 {
        self.state.read().await.events_received
    }

    /// Block the next (re)subscription will start from.
    pub async fn next_block(&self) -> u64 {
        self.state.read().await.next_block
    }

    pub async fn last_event_time(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_event_time
    }
}

/// Reconnect pacing: reset to the base delay after a healthy connection,
/// double up to the cap after a failed one.
fn next_delay(current: Duration, base: Duration, cap: Duration, healthy: bool) -> Duration {
    if healthy {
        base
    } else {
        cap.min(current * 2)
    }
}

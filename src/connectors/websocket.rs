// src/connectors/websocket.rs
use crate::config::SessionConfig;
use crate::connectors::traits::{PriceFeed, RawMessage};
use crate::error::{Result, SessionError};
use crate::types::ConnectionState;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{interval_at, timeout, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Wake {
    Frame(Option<std::result::Result<Message, tungstenite::Error>>),
    KeepAlive,
}

/// Market data feed over a single websocket connection.
///
/// Server pings are answered before the next data frame is handed out. With a
/// keep-alive interval set, the feed also pings the server and treats a ping
/// that is still unanswered one interval later as a dead connection.
pub struct WebSocketFeed {
    url: String,
    handshake_timeout: Duration,
    keepalive_interval: Option<Duration>,
    subscribe_message: Option<String>,
    stream: Option<WsStream>,
    keepalive: Option<Interval>,
    awaiting_pong: bool,
    state: ConnectionState,
}

impl WebSocketFeed {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            handshake_timeout: Duration::from_secs(10),
            keepalive_interval: None,
            subscribe_message: None,
            stream: None,
            keepalive: None,
            awaiting_pong: false,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        let mut feed = Self::new(&config.feed_url).with_handshake_timeout(config.handshake_timeout());
        if let Some(interval) = config.keepalive_interval() {
            feed = feed.with_keepalive(interval);
        }
        if let Some(message) = config.subscribe_message.clone() {
            feed = feed.with_subscription(message);
        }
        feed
    }

    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    pub fn with_keepalive(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }

    pub fn with_subscription(mut self, message: String) -> Self {
        self.subscribe_message = Some(message);
        self
    }

    fn connection_error(&mut self, reason: String) -> SessionError {
        self.state = ConnectionState::Disconnected;
        SessionError::Connection {
            url: self.url.clone(),
            reason,
        }
    }

    fn disconnect(&mut self, reason: String) -> SessionError {
        warn!("WebSocket {} lost: {}", self.url, reason);
        self.stream = None;
        self.keepalive = None;
        self.awaiting_pong = false;
        self.state = ConnectionState::Disconnected;
        SessionError::FeedDisconnected(reason)
    }

    async fn on_keepalive_tick(&mut self) -> Result<()> {
        if self.awaiting_pong {
            return Err(self.disconnect("keep-alive ping was not answered".to_string()));
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };
        if let Err(e) = stream.send(Message::Ping(Vec::new())).await {
            return Err(self.disconnect(format!("failed to send ping: {}", e)));
        }
        self.awaiting_pong = true;
        debug!("Keep-alive ping sent");
        Ok(())
    }

    async fn acknowledge(&mut self, payload: Vec<u8>) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };
        if let Err(e) = stream.send(Message::Pong(payload)).await {
            return Err(self.disconnect(format!("failed to answer ping: {}", e)));
        }
        debug!("Answered server ping");
        Ok(())
    }
}

async fn next_keepalive(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[async_trait]
impl PriceFeed for WebSocketFeed {
    async fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            self.close().await;
        }
        self.state = ConnectionState::Connecting;
        info!("Connecting to {}", self.url);

        let handshake = timeout(self.handshake_timeout, connect_async(self.url.as_str())).await;
        let mut stream = match handshake {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => return Err(self.connection_error(e.to_string())),
            Err(_) => {
                return Err(self.connection_error(format!(
                    "handshake timed out after {:?}",
                    self.handshake_timeout
                )))
            }
        };

        if let Some(subscription) = self.subscribe_message.clone() {
            if let Err(e) = stream.send(Message::Text(subscription.clone())).await {
                return Err(self.connection_error(format!("subscription failed: {}", e)));
            }
            info!("Subscription sent: {}", subscription);
        }

        self.keepalive = self.keepalive_interval.map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        self.awaiting_pong = false;
        self.stream = Some(stream);
        self.state = ConnectionState::Connected;
        info!("WebSocket connected: {}", self.url);
        Ok(())
    }

    async fn next_message(&mut self) -> Result<RawMessage> {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return Err(SessionError::FeedDisconnected("not connected".to_string()));
            };
            let keepalive = &mut self.keepalive;

            let wake = tokio::select! {
                frame = stream.next() => Wake::Frame(frame),
                _ = next_keepalive(keepalive) => Wake::KeepAlive,
            };

            match wake {
                Wake::KeepAlive => self.on_keepalive_tick().await?,
                Wake::Frame(None) => return Err(self.disconnect("stream ended".to_string())),
                Wake::Frame(Some(Err(e))) => return Err(self.disconnect(e.to_string())),
                Wake::Frame(Some(Ok(message))) => match message {
                    Message::Ping(payload) => self.acknowledge(payload).await?,
                    Message::Pong(_) => {
                        self.awaiting_pong = false;
                    }
                    Message::Text(text) => return Ok(RawMessage::Text(text)),
                    Message::Binary(bytes) => return Ok(RawMessage::Binary(bytes)),
                    Message::Close(frame) => {
                        let reason = match frame {
                            Some(frame) => format!("closed by server ({}): {}", frame.code, frame.reason),
                            None => "closed by server".to_string(),
                        };
                        return Err(self.disconnect(reason));
                    }
                    Message::Frame(_) => {}
                },
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            self.state = ConnectionState::Closing;
            if let Err(e) = stream.close(None).await {
                debug!("Close handshake with {} failed: {}", self.url, e);
            }
            info!("WebSocket closed: {}", self.url);
        }
        self.keepalive = None;
        self.awaiting_pong = false;
        self.state = ConnectionState::Disconnected;
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

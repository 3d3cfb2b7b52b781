// src/connectors/traits.rs
use crate::error::Result;
use crate::types::ConnectionState;
use async_trait::async_trait;

/// Payload of a data frame received from the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum RawMessage {
    Text(String),
    Binary(Vec<u8>),
}

#[async_trait]
pub trait PriceFeed: Send {
    /// Opens (or reopens) the transport. Fails with `SessionError::Connection`.
    async fn connect(&mut self) -> Result<()>;

    /// Waits for the next data frame. Control frames are serviced internally.
    /// Transport loss surfaces as `SessionError::FeedDisconnected`.
    async fn next_message(&mut self) -> Result<RawMessage>;

    async fn close(&mut self);

    fn state(&self) -> ConnectionState;
}

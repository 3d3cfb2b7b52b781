// src/connectors/mock.rs
use crate::connectors::traits::{PriceFeed, RawMessage};
use crate::error::{Result, SessionError};
use crate::types::ConnectionState;
use async_trait::async_trait;
use std::collections::VecDeque;

pub enum Step {
    Frame(RawMessage),
    Drop(&'static str),
}

/// In-memory feed replaying a fixed script. Once the script runs out it waits forever,
/// like a quiet but healthy connection.
pub struct ScriptedFeed {
    steps: VecDeque<Step>,
    connect_outcomes: VecDeque<bool>,
    stall_after: Option<usize>,
    state: ConnectionState,
    pub connects: usize,
    pub closes: usize,
}

impl ScriptedFeed {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            connect_outcomes: VecDeque::new(),
            stall_after: None,
            state: ConnectionState::Disconnected,
            connects: 0,
            closes: 0,
        }
    }

    /// Trades for `symbol` at the given prices, in order.
    pub fn trades(symbol: &str, prices: &[&str]) -> Self {
        Self::new(prices.iter().map(|p| trade(symbol, p)).collect())
    }

    /// Outcome of each successive `connect` call; calls past the list succeed.
    pub fn with_connect_outcomes(mut self, outcomes: &[bool]) -> Self {
        self.connect_outcomes = outcomes.iter().copied().collect();
        self
    }

    /// Every `connect` call hangs, like a server that never answers the handshake.
    pub fn stalling(self) -> Self {
        self.stalling_after(0)
    }

    /// The first `connects` calls behave normally, later ones hang.
    pub fn stalling_after(mut self, connects: usize) -> Self {
        self.stall_after = Some(connects);
        self
    }
}

pub fn trade(symbol: &str, price: &str) -> Step {
    Step::Frame(RawMessage::Text(format!(
        r#"{{"e":"trade","s":"{}","p":"{}","q":"1"}}"#,
        symbol, price
    )))
}

pub fn text(payload: &str) -> Step {
    Step::Frame(RawMessage::Text(payload.to_string()))
}

#[async_trait]
impl PriceFeed for ScriptedFeed {
    async fn connect(&mut self) -> Result<()> {
        self.connects += 1;
        if self.stall_after.is_some_and(|n| self.connects > n) {
            self.state = ConnectionState::Connecting;
            std::future::pending::<()>().await;
        }
        if !self.connect_outcomes.pop_front().unwrap_or(true) {
            self.state = ConnectionState::Disconnected;
            return Err(SessionError::Connection {
                url: "scripted://feed".to_string(),
                reason: "refused".to_string(),
            });
        }
        self.state = ConnectionState::Connected;
        Ok(())
    }

    async fn next_message(&mut self) -> Result<RawMessage> {
        if self.state != ConnectionState::Connected {
            return Err(SessionError::FeedDisconnected("not connected".to_string()));
        }
        match self.steps.pop_front() {
            Some(Step::Frame(message)) => Ok(message),
            Some(Step::Drop(reason)) => {
                self.state = ConnectionState::Disconnected;
                Err(SessionError::FeedDisconnected(reason.to_string()))
            }
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.closes += 1;
        self.state = ConnectionState::Disconnected;
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

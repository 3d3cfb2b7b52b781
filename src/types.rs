// src/types.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// Normalized trade print decoded from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEvent {
    pub symbol: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        };
        f.write_str(label)
    }
}

/// Position of a strategy inside the session's ordered strategy list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyId(pub usize);

/// Simulated execution applied to a strategy's book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub id: Uuid,
    pub strategy: StrategyId,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Realized P&L of the round trip, set on sells only.
    pub realized_pnl: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    RuntimeElapsed,
    Interrupted,
    FeedDisconnected(String),
    ConnectionFailed(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::RuntimeElapsed => f.write_str("runtime elapsed"),
            StopReason::Interrupted => f.write_str("stopped by user"),
            StopReason::FeedDisconnected(reason) => {
                write!(f, "terminated early, feed disconnected: {}", reason)
            }
            StopReason::ConnectionFailed(reason) => write!(f, "connection failed: {}", reason),
        }
    }
}

// --- Output sink records ---

#[derive(Debug, Clone)]
pub struct TickRecord {
    pub strategy: String,
    pub event: PriceEvent,
    pub signal: Signal,
    pub fill: Option<Fill>,
    pub cash: Decimal,
    pub holdings: Decimal,
    pub net_worth: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategySummary {
    pub name: String,
    pub initial_balance: Decimal,
    pub cash: Decimal,
    pub holdings: Decimal,
    pub net_worth: Decimal,
    /// Mark-to-market P&L of the open holding, if any.
    pub unrealized_pnl: Option<Decimal>,
    pub realized_pnl: Decimal,
    pub pnl: Decimal,
    pub pnl_pct: Decimal,
    pub round_trips: u32,
    pub wins: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub symbol: String,
    pub reason: StopReason,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    pub events_processed: u64,
    pub last_price: Option<Decimal>,
    pub strategies: Vec<StrategySummary>,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connected { url: String },
    Tick(TickRecord),
    Summary(SessionSummary),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fill_serializes_for_trade_logs() {
        let fill = Fill {
            id: Uuid::new_v4(),
            strategy: StrategyId(1),
            side: Side::Sell,
            quantity: dec!(0.998),
            price: dec!(99.8),
            timestamp: Utc::now(),
            realized_pnl: Some(dec!(-0.4)),
        };
        let json = serde_json::to_string(&fill).unwrap();
        assert!(json.contains(&fill.id.to_string()));
        let back: Fill = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fill);
    }
}

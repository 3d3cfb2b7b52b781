// src/connectors/messages.rs
use crate::connectors::traits::RawMessage;
use crate::error::DecodeError;
use crate::types::PriceEvent;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// Trade event from wss://stream.binance.com:9443/ws/<symbol>@trade.
/// Short field names (rename) map Binance JSON. Everything optional so the
/// decoder can tell a broken trade apart from an unrelated frame.
#[derive(Debug, Deserialize)]
struct TradeFrame {
    #[serde(rename = "s")]
    symbol: Option<String>,

    #[serde(rename = "p")]
    price: Option<Value>,

    #[serde(rename = "T")]
    trade_time: Option<i64>,
}

/// Quote pushed by wss://dws.coinmarketcap.com/ws after a `quote@transaction@...`
/// subscription. The frame carries no ticker, so the session's symbol is used.
#[derive(Debug, Deserialize)]
struct QuoteFrame {
    #[serde(rename = "t0pu")]
    price: Value,
}

/// Decodes one inbound frame. `quote_symbol` names events from feeds whose frames
/// carry no ticker of their own.
///
/// `Ok(None)` means the frame is not a trade (subscription ack, other event type)
/// and is skipped silently.
pub fn decode(raw: &RawMessage, quote_symbol: &str) -> Result<Option<PriceEvent>, DecodeError> {
    let text = match raw {
        RawMessage::Text(text) => text.as_str(),
        RawMessage::Binary(bytes) => std::str::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)?,
    };

    let value: Value = serde_json::from_str(text)?;
    let Some(object) = value.as_object() else {
        return Ok(None);
    };

    if let Some(quote) = object.get("d").filter(|d| d.get("t0pu").is_some()) {
        let frame: QuoteFrame = serde_json::from_value(quote.clone())?;
        return Ok(Some(PriceEvent {
            symbol: quote_symbol.to_string(),
            price: parse_price(frame.price)?,
            timestamp: Utc::now(),
        }));
    }

    let is_trade = match object.get("e").and_then(Value::as_str) {
        Some(event_type) => event_type == "trade",
        None => object.contains_key("p") || object.contains_key("s"),
    };
    if !is_trade {
        return Ok(None);
    }

    let frame: TradeFrame = serde_json::from_value(value)?;
    let symbol = frame
        .symbol
        .filter(|s| !s.is_empty())
        .ok_or(DecodeError::MissingField("s"))?;
    let price = parse_price(frame.price.ok_or(DecodeError::MissingField("p"))?)?;
    let timestamp = frame
        .trade_time
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);

    Ok(Some(PriceEvent {
        symbol,
        price,
        timestamp,
    }))
}

// String to Decimal directly, never through f64
fn parse_price(value: Value) -> Result<Decimal, DecodeError> {
    let literal = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => return Err(DecodeError::InvalidPrice(other.to_string())),
    };
    let price = Decimal::from_str(&literal)
        .or_else(|_| Decimal::from_scientific(&literal))
        .map_err(|_| DecodeError::InvalidPrice(literal.clone()))?;
    if price <= Decimal::ZERO {
        return Err(DecodeError::InvalidPrice(literal));
    }
    Ok(price)
}

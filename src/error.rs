// src/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to connect to {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("Feed disconnected: {0}")]
    FeedDisconnected(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
}

/// A single inbound frame could not be turned into a trade. The session skips it.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary frame is not valid UTF-8")]
    NotUtf8,

    #[error("Trade message is missing field `{0}`")]
    MissingField(&'static str),

    #[error("Invalid price {0:?}")]
    InvalidPrice(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;

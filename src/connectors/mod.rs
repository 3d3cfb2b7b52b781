// src/connectors/mod.rs
pub mod messages;
#[cfg(test)]
pub mod mock;
pub mod traits;
pub mod websocket;

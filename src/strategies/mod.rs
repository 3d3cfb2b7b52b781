// src/strategies/mod.rs
pub mod bracket;
pub mod registry;
pub mod threshold;
pub mod traits;

// src/strategies/traits.rs
use crate::types::Signal;
use rust_decimal::Decimal;

/// A stateful decision unit fed one trade price at a time.
pub trait Strategy: Send {
    fn name(&self) -> &str;

    // Observe a new price and decide; internal state advances on BUY/SELL only
    fn evaluate(&mut self, price: Decimal) -> Signal;

    /// The book could not execute the signal `evaluate` just returned.
    /// Strategies that track a position roll it back here.
    fn on_rejected(&mut self, _signal: Signal) {}
}

// src/strategies/threshold.rs
use crate::strategies::traits::Strategy;
use crate::types::Signal;
use rust_decimal::Decimal;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Flat,
    Holding,
}

/// Buys once price climbs `threshold_percent` above the reference and sells once it
/// drops `threshold_percent` below it. Every fill moves the reference to the fill price.
pub struct ThresholdStrategy {
    name: String,
    threshold_percent: Decimal,
    reference_price: Option<Decimal>,
    position: Position,
    // Reference before the last BUY/SELL, restored if the book rejects it
    prior_reference: Option<Decimal>,
}

impl ThresholdStrategy {
    /// # Arguments
    /// * `threshold_percent` - Move in percent that triggers a fill (e.g. 0.2 for 0.2%).
    pub fn new(name: String, threshold_percent: Decimal) -> Self {
        Self {
            name,
            threshold_percent,
            reference_price: None,
            position: Position::Flat,
            prior_reference: None,
        }
    }

    pub fn reference_price(&self) -> Option<Decimal> {
        self.reference_price
    }

    pub fn is_holding(&self) -> bool {
        self.position == Position::Holding
    }

    fn band(&self) -> Decimal {
        self.threshold_percent / Decimal::ONE_HUNDRED
    }
}

impl Strategy for ThresholdStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&mut self, price: Decimal) -> Signal {
        self.prior_reference = None;
        // The first print becomes the baseline
        let reference = match self.reference_price {
            Some(reference) => reference,
            None => {
                debug!("[{}] Baseline price initialized at {}", self.name, price);
                self.reference_price = Some(price);
                return Signal::Hold;
            }
        };

        match self.position {
            Position::Flat => {
                let Some(buy_target) = reference.checked_mul(Decimal::ONE + self.band()) else {
                    return Signal::Hold;
                };
                if price >= buy_target {
                    info!(
                        "[{}] Price {} reached buy target {} (+{}%)",
                        self.name, price, buy_target, self.threshold_percent
                    );
                    self.position = Position::Holding;
                    self.prior_reference = self.reference_price.replace(price);
                    return Signal::Buy;
                }
            }
            Position::Holding => {
                let Some(sell_target) = reference.checked_mul(Decimal::ONE - self.band()) else {
                    return Signal::Hold;
                };
                if price <= sell_target {
                    info!(
                        "[{}] Price {} fell to sell target {} (-{}%)",
                        self.name, price, sell_target, self.threshold_percent
                    );
                    self.position = Position::Flat;
                    self.prior_reference = self.reference_price.replace(price);
                    return Signal::Sell;
                }
            }
        }

        Signal::Hold
    }

    fn on_rejected(&mut self, signal: Signal) {
        let Some(prior) = self.prior_reference.take() else {
            return;
        };
        self.position = match signal {
            Signal::Buy => Position::Flat,
            Signal::Sell => Position::Holding,
            Signal::Hold => return,
        };
        self.reference_price = Some(prior);
        debug!("[{}] {} not filled, reference back at {}", self.name, signal, prior);
    }
}

// src/strategies/bracket.rs
use crate::strategies::traits::Strategy;
use crate::types::Signal;
use rust_decimal::Decimal;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketParams {
    pub stop_loss_percent: Decimal,
    pub take_profit_percent: Decimal,
    pub recovery_buy_percent: Decimal,
    pub reinvest_fall_percent: Decimal,
}

impl BracketParams {
    /// 5% stop loss, 10% take profit, 3% recovery buy, 10% fall reinvest.
    pub fn conservative() -> Self {
        Self {
            stop_loss_percent: Decimal::from(5),
            take_profit_percent: Decimal::from(10),
            recovery_buy_percent: Decimal::from(3),
            reinvest_fall_percent: Decimal::from(10),
        }
    }

    /// 2% stop loss, 5% take profit, 2% recovery buy, 5% fall reinvest.
    pub fn aggressive() -> Self {
        Self {
            stop_loss_percent: Decimal::from(2),
            take_profit_percent: Decimal::from(5),
            recovery_buy_percent: Decimal::from(2),
            reinvest_fall_percent: Decimal::from(5),
        }
    }
}

/// Stop-loss / take-profit exits around the entry price, re-entry on a recovery from
/// the last exit or on a deep fall below the previous entry.
pub struct BracketStrategy {
    name: String,
    params: BracketParams,
    anchor_price: Option<Decimal>,
    entry_price: Option<Decimal>,
    holding: bool,
    // (anchor, entry, holding) before the last BUY/SELL
    prior: Option<(Option<Decimal>, Option<Decimal>, bool)>,
}

impl BracketStrategy {
    /// Creates a new BracketStrategy.
    ///
    /// # Arguments
    /// * `name` - Label used in logs and reports.
    /// * `params` - Percent thresholds (e.g. 5 for 5%).
    pub fn new(name: String, params: BracketParams) -> Self {
        Self {
            name,
            params,
            anchor_price: None,
            entry_price: None,
            holding: false,
            prior: None,
        }
    }

    fn snapshot(&mut self) {
        self.prior = Some((self.anchor_price, self.entry_price, self.holding));
    }

    fn enter(&mut self, price: Decimal, reason: &str) -> Signal {
        info!("[{}] BUY signal at {} ({})", self.name, price, reason);
        self.snapshot();
        self.holding = true;
        self.entry_price = Some(price);
        Signal::Buy
    }

    fn exit(&mut self, price: Decimal, reason: &str) -> Signal {
        info!("[{}] SELL signal at {} ({})", self.name, price, reason);
        self.snapshot();
        self.holding = false;
        self.anchor_price = Some(price);
        Signal::Sell
    }
}

impl Strategy for BracketStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&mut self, price: Decimal) -> Signal {
        self.prior = None;
        let anchor = match self.anchor_price {
            Some(anchor) => anchor,
            None => {
                debug!("[{}] Anchor price initialized at {}", self.name, price);
                self.anchor_price = Some(price);
                return Signal::Hold;
            }
        };

        if self.holding {
            let Some(entry) = self.entry_price else {
                return Signal::Hold;
            };
            let Some(change_pct) = (price - entry)
                .checked_div(entry)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            else {
                return Signal::Hold;
            };
            if change_pct <= -self.params.stop_loss_percent {
                return self.exit(price, "stop loss");
            }
            if change_pct >= self.params.take_profit_percent {
                return self.exit(price, "take profit");
            }
            return Signal::Hold;
        }

        let recovery_target =
            anchor.checked_mul(Decimal::ONE + self.params.recovery_buy_percent / Decimal::ONE_HUNDRED);
        if recovery_target.is_some_and(|target| price >= target) {
            return self.enter(price, "recovery buy");
        }

        if let Some(entry) = self.entry_price {
            let reinvest_target = entry
                .checked_mul(Decimal::ONE - self.params.reinvest_fall_percent / Decimal::ONE_HUNDRED);
            if reinvest_target.is_some_and(|target| price <= target) {
                return self.enter(price, "fall reinvest");
            }
        }

        Signal::Hold
    }

    fn on_rejected(&mut self, signal: Signal) {
        if let Some((anchor, entry, holding)) = self.prior.take() {
            debug!("[{}] {} not filled, rolling back", self.name, signal);
            self.anchor_price = anchor;
            self.entry_price = entry;
            self.holding = holding;
        }
    }
}

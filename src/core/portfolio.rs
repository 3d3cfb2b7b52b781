// src/core/portfolio.rs
use crate::types::{Fill, Side, Signal, StrategyId, StrategySummary};
use crate::utils::precision::{floor_to_step, round_cash};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};
use uuid::Uuid;

/// How simulated fills are sized and rounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillRules {
    /// Zero spends the whole cash balance; otherwise quantities are floored to this step.
    pub quantity_step: Decimal,
    /// Decimal places cash is rounded to after a sell.
    pub cash_scale: u32,
}

impl Default for FillRules {
    fn default() -> Self {
        Self {
            quantity_step: Decimal::ZERO,
            cash_scale: 8,
        }
    }
}

/// Cash and coin balance of one strategy. Never negative, no margin, no shorts.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub symbol: String,
    initial_balance: Decimal,
    cash_balance: Decimal,
    holdings_quantity: Decimal,
    cost_basis: Decimal,
    realized_pnl: Decimal,
    round_trips: u32,
    wins: u32,
}

impl Portfolio {
    pub fn new(symbol: &str, initial_balance: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            initial_balance,
            cash_balance: initial_balance,
            holdings_quantity: Decimal::ZERO,
            cost_basis: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            round_trips: 0,
            wins: 0,
        }
    }

    pub fn cash_balance(&self) -> Decimal {
        self.cash_balance
    }

    pub fn holdings_quantity(&self) -> Decimal {
        self.holdings_quantity
    }

    /// Cash plus holdings marked at `current_price`. Saturates at `Decimal::MAX`.
    pub fn net_worth(&self, current_price: Decimal) -> Decimal {
        self.holdings_quantity
            .checked_mul(current_price)
            .and_then(|value| value.checked_add(self.cash_balance))
            .unwrap_or(Decimal::MAX)
    }

    /// Turns a signal into a simulated fill. Signals that cannot be honoured are no-ops.
    pub fn apply(
        &mut self,
        strategy: StrategyId,
        signal: Signal,
        price: Decimal,
        timestamp: DateTime<Utc>,
        rules: &FillRules,
    ) -> Option<Fill> {
        if price <= Decimal::ZERO {
            warn!("Ignoring {} at non-positive price {}", signal, price);
            return None;
        }
        match signal {
            Signal::Buy => self.buy(strategy, price, timestamp, rules),
            Signal::Sell => self.sell(strategy, price, timestamp, rules),
            Signal::Hold => None,
        }
    }

    fn buy(
        &mut self,
        strategy: StrategyId,
        price: Decimal,
        timestamp: DateTime<Utc>,
        rules: &FillRules,
    ) -> Option<Fill> {
        if self.cash_balance <= Decimal::ZERO {
            debug!("BUY skipped: no cash left");
            return None;
        }

        let Some(raw_quantity) = self.cash_balance.checked_div(price) else {
            warn!("BUY skipped: {} / {} overflows", self.cash_balance, price);
            return None;
        };
        let quantity = floor_to_step(raw_quantity, rules.quantity_step);
        if quantity.is_zero() {
            warn!("Quantity is zero after normalization. Not entering position.");
            return None;
        }
        let cost = if rules.quantity_step.is_zero() {
            self.cash_balance
        } else {
            quantity
                .checked_mul(price)
                .map_or(self.cash_balance, |cost| cost.min(self.cash_balance))
        };

        self.cash_balance -= cost;
        self.holdings_quantity += quantity;
        self.cost_basis += cost;

        Some(Fill {
            id: Uuid::new_v4(),
            strategy,
            side: Side::Buy,
            quantity,
            price,
            timestamp,
            realized_pnl: None,
        })
    }

    fn sell(
        &mut self,
        strategy: StrategyId,
        price: Decimal,
        timestamp: DateTime<Utc>,
        rules: &FillRules,
    ) -> Option<Fill> {
        if self.holdings_quantity <= Decimal::ZERO {
            debug!("SELL skipped: nothing to sell");
            return None;
        }

        let quantity = self.holdings_quantity;
        let Some(cash_after) = quantity
            .checked_mul(price)
            .and_then(|proceeds| proceeds.checked_add(self.cash_balance))
        else {
            warn!("SELL skipped: {} @ {} overflows", quantity, price);
            return None;
        };
        let proceeds = cash_after - self.cash_balance;
        let pnl = proceeds - self.cost_basis;

        self.cash_balance = round_cash(cash_after, rules.cash_scale);
        self.holdings_quantity = Decimal::ZERO;
        self.cost_basis = Decimal::ZERO;
        self.realized_pnl += pnl;
        self.round_trips += 1;
        if pnl > Decimal::ZERO {
            self.wins += 1;
        }

        Some(Fill {
            id: Uuid::new_v4(),
            strategy,
            side: Side::Sell,
            quantity,
            price,
            timestamp,
            realized_pnl: Some(pnl),
        })
    }

    pub fn summary(&self, name: &str, last_price: Option<Decimal>) -> StrategySummary {
        let net_worth = match last_price {
            Some(price) => self.net_worth(price),
            None => self.cash_balance,
        };
        let unrealized_pnl = match last_price {
            Some(price) if self.holdings_quantity > Decimal::ZERO => self
                .holdings_quantity
                .checked_mul(price)
                .and_then(|value| value.checked_sub(self.cost_basis)),
            _ => None,
        };
        let pnl = net_worth.saturating_sub(self.initial_balance);
        let pnl_pct = pnl
            .checked_div(self.initial_balance)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::ZERO);

        StrategySummary {
            name: name.to_string(),
            initial_balance: self.initial_balance,
            cash: self.cash_balance,
            holdings: self.holdings_quantity,
            net_worth,
            unrealized_pnl,
            realized_pnl: self.realized_pnl,
            pnl,
            pnl_pct,
            round_trips: self.round_trips,
            wins: self.wins,
        }
    }
}

struct Book {
    name: String,
    portfolio: Portfolio,
}

/// One book per strategy instance so every fill is attributed to the strategy that asked for it.
pub struct PortfolioTracker {
    symbol: String,
    initial_balance: Decimal,
    rules: FillRules,
    books: Vec<Book>,
}

impl PortfolioTracker {
    pub fn new(symbol: &str, initial_balance: Decimal, rules: FillRules) -> Self {
        Self {
            symbol: symbol.to_string(),
            initial_balance,
            rules,
            books: Vec::new(),
        }
    }

    pub fn open_book(&mut self, name: &str) -> StrategyId {
        self.books.push(Book {
            name: name.to_string(),
            portfolio: Portfolio::new(&self.symbol, self.initial_balance),
        });
        StrategyId(self.books.len() - 1)
    }

    pub fn portfolio(&self, id: StrategyId) -> Option<&Portfolio> {
        self.books.get(id.0).map(|book| &book.portfolio)
    }

    pub fn apply(
        &mut self,
        id: StrategyId,
        signal: Signal,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Option<Fill> {
        let rules = self.rules;
        match self.books.get_mut(id.0) {
            Some(book) => book.portfolio.apply(id, signal, price, timestamp, &rules),
            None => {
                warn!("No book for strategy {:?}; {} dropped", id, signal);
                None
            }
        }
    }

    pub fn summaries(&self, last_price: Option<Decimal>) -> Vec<StrategySummary> {
        self.books
            .iter()
            .map(|book| book.portfolio.summary(&book.name, last_price))
            .collect()
    }
}

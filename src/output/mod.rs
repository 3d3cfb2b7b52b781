// src/output/mod.rs
use crate::types::{SessionEvent, SessionSummary, Side, Signal, TickRecord};
use tokio::sync::mpsc;

/// Renders session records as console lines.
pub struct ConsolePrinter {
    symbol: String,
    quiet_holds: bool,
}

impl ConsolePrinter {
    pub fn new(symbol: String) -> Self {
        Self {
            symbol,
            quiet_holds: true,
        }
    }

    pub fn verbose(mut self) -> Self {
        self.quiet_holds = false;
        self
    }

    pub fn render(&self, event: &SessionEvent) -> Vec<String> {
        match event {
            SessionEvent::Connected { url } => {
                vec![format!("🔌 Connected to {} [{}]", url, self.symbol)]
            }
            SessionEvent::Tick(tick) => self.render_tick(tick).into_iter().collect(),
            SessionEvent::Summary(summary) => render_summary(summary),
        }
    }

    fn render_tick(&self, tick: &TickRecord) -> Option<String> {
        match &tick.fill {
            Some(fill) => {
                let icon = match fill.side {
                    Side::Buy => "🟢 BUY ",
                    Side::Sell => "🔴 SELL",
                };
                let pnl = fill
                    .realized_pnl
                    .map(|pnl| format!(" | P&L: {:.2}", pnl))
                    .unwrap_or_default();
                Some(format!(
                    "[{}] {} {:.8} @ ${:.4}{} | Cash: ${:.2} | Net worth: ${:.2}",
                    tick.strategy, icon, fill.quantity, fill.price, pnl, tick.cash, tick.net_worth
                ))
            }
            None if tick.signal == Signal::Hold && self.quiet_holds => None,
            None => Some(format!(
                "[{}] {} @ ${:.4} | Cash: ${:.2} | Holdings: {:.8} | Net worth: ${:.2}",
                tick.strategy,
                tick.signal,
                tick.event.price,
                tick.cash,
                tick.holdings,
                tick.net_worth
            )),
        }
    }
}

fn render_summary(summary: &SessionSummary) -> Vec<String> {
    let mut lines = vec![
        "========================================".to_string(),
        format!("📊 Session summary [{}]: {}", summary.symbol, summary.reason),
        format!(
            "   Events: {} | Last price: {}",
            summary.events_processed,
            summary
                .last_price
                .map(|p| format!("${:.4}", p))
                .unwrap_or_else(|| "n/a".to_string())
        ),
    ];
    for strategy in &summary.strategies {
        lines.push(format!("[{}]", strategy.name));
        if let Some(unrealized) = strategy.unrealized_pnl {
            lines.push(format!(
                "   Holding: {:.8} | Unrealized P&L: ${:.2}",
                strategy.holdings, unrealized
            ));
        }
        lines.push(format!(
            "   Final value: ${:.2} | P&L: ${:.2} ({:+.2}%)",
            strategy.net_worth, strategy.pnl, strategy.pnl_pct
        ));
        lines.push(format!(
            "   Trades: {} | Wins: {} | Realized P&L: ${:.2}",
            strategy.round_trips, strategy.wins, strategy.realized_pnl
        ));
    }
    lines.push("========================================".to_string());
    lines
}

/// Prints records until the session drops its sender.
pub async fn run(mut rx: mpsc::Receiver<SessionEvent>, printer: ConsolePrinter) {
    while let Some(event) = rx.recv().await {
        for line in printer.render(&event) {
            println!("{}", line);
        }
    }
}

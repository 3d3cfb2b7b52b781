// src/main.rs
use crate::config::SessionConfig;
use crate::connectors::websocket::WebSocketFeed;
use crate::core::engine::TradingSession;
use crate::output::ConsolePrinter;
use crate::strategies::registry::StrategyRegistry;
use dotenvy::dotenv;
use tokio::sync::mpsc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

mod config;
mod connectors;
mod core;
mod error;
mod output;
mod strategies;
mod types;
mod utils;

fn init_tracing() -> WorkerGuard {
    // Full log goes to a daily file, console only sees warnings
    let file_appender = tracing_appender::rolling::daily("logs", "paper_sniper.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(LevelFilter::DEBUG),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(LevelFilter::WARN),
        )
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _log_guard = init_tracing();

    // 1. Load and validate configuration before touching the network
    let config = SessionConfig::load()?;
    config.validate()?;
    let strategies = StrategyRegistry::default().build_all(&config.strategies)?;

    println!("========================================");
    println!("       PAPER SNIPER - v{}", env!("CARGO_PKG_VERSION"));
    println!("========================================");
    println!("Target:   {}", config.symbol);
    println!("Feed:     {}", config.feed_url);
    println!("Runtime:  {:?}", config.runtime());
    println!("Balance:  ${}", config.initial_balance);
    for strategy in &config.strategies {
        println!("Strategy: {} ({})", strategy.label(), strategy.kind);
    }
    println!("========================================");

    // 2. Wire feed, output and session
    let feed = WebSocketFeed::from_config(&config);
    let (event_tx, event_rx) = mpsc::channel(1024);
    let mut console = ConsolePrinter::new(config.symbol.clone());
    if config.print_holds {
        console = console.verbose();
    }
    let printer = tokio::spawn(output::run(event_rx, console));
    let (mut session, handle) = TradingSession::new(config, feed, strategies, event_tx);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("🛑 Interrupted by user");
            handle.stop();
        }
    });

    // 3. Run
    let result = session.run().await;
    info!("Session finished in state {:?}", session.state());

    // Dropping the session closes the output channel so the printer can drain
    drop(session);
    printer.await?;

    result?;
    Ok(())
}

// src/core/engine.rs
use crate::config::{DisconnectPolicy, SessionConfig};
use crate::connectors::messages::decode;
use crate::connectors::traits::{PriceFeed, RawMessage};
use crate::core::portfolio::{FillRules, PortfolioTracker};
use crate::error::{Result, SessionError};
use crate::strategies::traits::Strategy;
use crate::types::{
    PriceEvent, SessionEvent, SessionState, SessionSummary, Signal, StopReason, StrategyId,
    TickRecord,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Requests a running session to stop. Cloneable, usable from any task.
#[derive(Clone)]
pub struct SessionHandle {
    stop_tx: watch::Sender<bool>,
}

impl SessionHandle {
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }
}

/// Drives one paper-trading session: feed in, strategies evaluated, fills booked,
/// records out. Runs at most once.
pub struct TradingSession<F> {
    config: SessionConfig,
    feed: F,
    strategies: Vec<(StrategyId, Box<dyn Strategy>)>,
    tracker: PortfolioTracker,
    event_sender: mpsc::Sender<SessionEvent>,
    stop_rx: watch::Receiver<bool>,
    state: SessionState,
    started_at: DateTime<Utc>,
    clock: Option<Instant>,
    events_processed: u64,
    last_price: Option<Decimal>,
    reconnects: u32,
}

impl<F> TradingSession<F>
where
    F: PriceFeed,
{
    pub fn new(
        config: SessionConfig,
        feed: F,
        strategies: Vec<Box<dyn Strategy>>,
        event_sender: mpsc::Sender<SessionEvent>,
    ) -> (Self, SessionHandle) {
        let rules = FillRules {
            quantity_step: config.quantity_step,
            cash_scale: config.cash_scale,
        };
        let mut tracker = PortfolioTracker::new(&config.symbol, config.initial_balance, rules);
        let strategies = strategies
            .into_iter()
            .map(|strategy| (tracker.open_book(strategy.name()), strategy))
            .collect();
        let (stop_tx, stop_rx) = watch::channel(false);

        let session = Self {
            config,
            feed,
            strategies,
            tracker,
            event_sender,
            stop_rx,
            state: SessionState::Idle,
            started_at: Utc::now(),
            clock: None,
            events_processed: 0,
            last_price: None,
            reconnects: 0,
        };
        (session, SessionHandle { stop_tx })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    pub fn tracker(&self) -> &PortfolioTracker {
        &self.tracker
    }

    /// Runs until the runtime elapses, `stop()` is called or the feed is lost.
    ///
    /// Only a failed initial handshake is returned as an error; every other ending is
    /// described by the summary. The feed is closed on every path.
    pub async fn run(&mut self) -> Result<SessionSummary> {
        if self.state != SessionState::Idle {
            return Err(SessionError::InvalidConfig(
                "a session can only be run once".to_string(),
            ));
        }

        info!(
            "Session starting: {} | {} strategies | runtime {:?} | balance {}",
            self.config.symbol,
            self.strategies.len(),
            self.config.runtime(),
            self.config.initial_balance
        );
        self.started_at = Utc::now();

        let reason = match self.connect_or_stop().await {
            Some(Ok(())) => {
                self.send_event(SessionEvent::Connected {
                    url: self.config.feed_url.clone(),
                });
                self.state = SessionState::Running;
                self.clock = Some(Instant::now());
                self.drive().await
            }
            Some(Err(e)) => {
                error!("Could not open feed: {}", e);
                self.feed.close().await;
                self.state = SessionState::Stopped;
                self.finish(StopReason::ConnectionFailed(e.to_string()))
                    .await;
                return Err(e);
            }
            None => {
                info!("Stop requested during handshake");
                StopReason::Interrupted
            }
        };

        self.feed.close().await;
        debug!("Feed {:?} after close", self.feed.state());
        self.state = SessionState::Stopped;
        Ok(self.finish(reason).await)
    }

    /// `None` when `stop()` wins the race against the handshake.
    async fn connect_or_stop(&mut self) -> Option<Result<()>> {
        tokio::select! {
            biased;
            _ = wait_for_stop(&mut self.stop_rx) => None,
            outcome = self.feed.connect() => Some(outcome),
        }
    }

    async fn drive(&mut self) -> StopReason {
        loop {
            let next = tokio::select! {
                biased;
                _ = wait_for_stop(&mut self.stop_rx) => {
                    info!("Stop requested");
                    return StopReason::Interrupted;
                }
                message = self.feed.next_message() => message,
            };

            match next {
                Ok(raw) => {
                    if let Some(reason) = self.on_message(raw) {
                        return reason;
                    }
                }
                Err(SessionError::FeedDisconnected(reason)) => {
                    if let Some(stop) = self.recover(reason).await {
                        return stop;
                    }
                }
                Err(e) => return StopReason::FeedDisconnected(e.to_string()),
            }
        }
    }

    fn on_message(&mut self, raw: RawMessage) -> Option<StopReason> {
        let event = match decode(&raw, &self.config.symbol) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!("Skipping non-trade message");
                return None;
            }
            Err(e) => {
                warn!("Skipping undecodable message: {}", e);
                return None;
            }
        };

        if !event.symbol.eq_ignore_ascii_case(&self.config.symbol) {
            debug!("Skipping trade for {}", event.symbol);
            return None;
        }

        if self.runtime_elapsed() {
            info!("Runtime of {:?} elapsed", self.config.runtime());
            return Some(StopReason::RuntimeElapsed);
        }

        self.on_price_event(event);
        None
    }

    fn runtime_elapsed(&self) -> bool {
        self.clock
            .map_or(false, |clock| clock.elapsed() >= self.config.runtime())
    }

    fn on_price_event(&mut self, event: PriceEvent) {
        self.events_processed += 1;
        self.last_price = Some(event.price);

        for (id, strategy) in self.strategies.iter_mut() {
            let signal = strategy.evaluate(event.price);
            let fill = self
                .tracker
                .apply(*id, signal, event.price, event.timestamp);

            if fill.is_none() && signal != Signal::Hold {
                debug!("[{}] {} not filled", strategy.name(), signal);
                strategy.on_rejected(signal);
            }

            if let Some(fill) = &fill {
                info!(
                    "[{}] Paper {:?}: {} @ {}",
                    strategy.name(),
                    fill.side,
                    fill.quantity,
                    fill.price
                );
            }

            let Some(portfolio) = self.tracker.portfolio(*id) else {
                continue;
            };
            let record = TickRecord {
                strategy: strategy.name().to_string(),
                event: event.clone(),
                signal,
                fill,
                cash: portfolio.cash_balance(),
                holdings: portfolio.holdings_quantity(),
                net_worth: portfolio.net_worth(event.price),
            };
            send_event(&self.event_sender, SessionEvent::Tick(record));
        }
    }

    /// Returns the stop reason when the session should end instead of reconnecting.
    async fn recover(&mut self, reason: String) -> Option<StopReason> {
        warn!("Feed disconnected: {}", reason);
        if self.config.on_disconnect == DisconnectPolicy::FailFast {
            return Some(StopReason::FeedDisconnected(reason));
        }
        if self.reconnects >= self.config.max_reconnect_attempts {
            error!(
                "Giving up after {} reconnect attempts",
                self.config.max_reconnect_attempts
            );
            return Some(StopReason::FeedDisconnected(reason));
        }

        self.reconnects += 1;
        info!(
            "Reconnecting in {:?} (attempt {}/{})",
            self.config.reconnect_delay(),
            self.reconnects,
            self.config.max_reconnect_attempts
        );
        tokio::select! {
            biased;
            _ = wait_for_stop(&mut self.stop_rx) => return Some(StopReason::Interrupted),
            _ = tokio::time::sleep(self.config.reconnect_delay()) => {}
        }

        match self.connect_or_stop().await {
            Some(Ok(())) => self.send_event(SessionEvent::Connected {
                url: self.config.feed_url.clone(),
            }),
            Some(Err(e)) => warn!("Reconnect failed: {}", e),
            None => return Some(StopReason::Interrupted),
        }
        None
    }

    async fn finish(&mut self, reason: StopReason) -> SessionSummary {
        let summary = SessionSummary {
            symbol: self.config.symbol.clone(),
            reason,
            started_at: self.started_at,
            stopped_at: Utc::now(),
            events_processed: self.events_processed,
            last_price: self.last_price,
            strategies: self.tracker.summaries(self.last_price),
        };
        info!(
            "Session stopped ({}) after {} events",
            summary.reason, summary.events_processed
        );
        for strategy in &summary.strategies {
            info!(
                "[{}] cash {} | holdings {} | net worth {} | trades {} | wins {}",
                strategy.name,
                strategy.cash,
                strategy.holdings,
                strategy.net_worth,
                strategy.round_trips,
                strategy.wins
            );
        }
        // Ticks may be dropped under pressure, the summary is waited for
        if self
            .event_sender
            .send(SessionEvent::Summary(summary.clone()))
            .await
            .is_err()
        {
            error!("Output channel closed! Summary not delivered.");
        }
        summary
    }

    fn send_event(&self, event: SessionEvent) {
        send_event(&self.event_sender, event);
    }
}

fn send_event(sender: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    match sender.try_send(event) {
        Ok(_) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!("Output channel full, record dropped");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            error!("Output channel closed! Records are being dropped.");
        }
    }
}

async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            // Every handle is gone, nobody can ask to stop anymore
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyConfig;
    use crate::connectors::mock::{text, trade, ScriptedFeed, Step};
    use crate::strategies::registry::StrategyRegistry;
    use crate::types::{ConnectionState, Side};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn config(strategies: Vec<StrategyConfig>) -> SessionConfig {
        SessionConfig {
            runtime_secs: 3600,
            strategies,
            ..SessionConfig::default()
        }
    }

    fn threshold(name: &str, percent: Decimal) -> StrategyConfig {
        let mut config = StrategyConfig::new("threshold").with_param("threshold_percent", percent);
        config.name = Some(name.to_string());
        config
    }

    fn session(
        config: SessionConfig,
        feed: ScriptedFeed,
    ) -> (
        TradingSession<ScriptedFeed>,
        SessionHandle,
        mpsc::Receiver<SessionEvent>,
    ) {
        let strategies = StrategyRegistry::default()
            .build_all(&config.strategies)
            .unwrap();
        let (tx, rx) = mpsc::channel(1024);
        let (session, handle) = TradingSession::new(config, feed, strategies, tx);
        (session, handle, rx)
    }

    fn ticks(rx: &mut mpsc::Receiver<SessionEvent>) -> Vec<TickRecord> {
        let mut ticks = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::Tick(tick) = event {
                ticks.push(tick);
            }
        }
        ticks
    }

    #[tokio::test]
    async fn reference_scenario_end_to_end() {
        let feed = ScriptedFeed::new(vec![
            trade("BTCUSDT", "100"),
            trade("BTCUSDT", "100.2"),
            trade("BTCUSDT", "100.5"),
            trade("BTCUSDT", "99.8"),
            Step::Drop("end of script"),
        ]);
        let (mut session, _handle, mut rx) = session(config(vec![threshold("t", dec!(0.2))]), feed);

        let summary = session.run().await.unwrap();

        let ticks = ticks(&mut rx);
        let signals: Vec<Signal> = ticks.iter().map(|t| t.signal).collect();
        assert_eq!(
            signals,
            vec![Signal::Hold, Signal::Buy, Signal::Hold, Signal::Sell]
        );
        assert_eq!(ticks[1].fill.as_ref().unwrap().side, Side::Buy);
        assert_eq!(ticks[1].holdings, dec!(100) / dec!(100.2));
        assert_eq!(ticks[1].cash, Decimal::ZERO);
        assert_eq!(ticks[3].cash.round_dp(2), dec!(99.60));

        assert_eq!(
            summary.reason,
            StopReason::FeedDisconnected("end of script".to_string())
        );
        assert_eq!(summary.events_processed, 4);
        assert_eq!(summary.strategies[0].round_trips, 1);
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.feed().closes, 1);
        assert_eq!(session.feed().state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn zero_runtime_stops_at_first_event() {
        let feed = ScriptedFeed::trades("BTCUSDT", &["100", "101", "102"]);
        let mut cfg = config(vec![threshold("t", dec!(0.2))]);
        cfg.runtime_secs = 0;
        let (mut session, _handle, mut rx) = session(cfg, feed);

        let summary = session.run().await.unwrap();

        assert_eq!(summary.reason, StopReason::RuntimeElapsed);
        assert!(summary.events_processed <= 1);
        assert!(ticks(&mut rx).len() <= 1);
        assert_eq!(session.feed().closes, 1);
    }

    #[tokio::test]
    async fn stop_before_run_trades_nothing() {
        let feed = ScriptedFeed::trades("BTCUSDT", &["100", "200"]);
        let (mut session, handle, mut rx) = session(config(vec![threshold("t", dec!(0.2))]), feed);
        handle.stop();

        let summary = session.run().await.unwrap();

        assert_eq!(summary.reason, StopReason::Interrupted);
        assert_eq!(summary.events_processed, 0);
        assert!(ticks(&mut rx).is_empty());
        assert_eq!(session.feed().closes, 1);
    }

    #[tokio::test]
    async fn stop_while_waiting_for_data() {
        let feed = ScriptedFeed::trades("BTCUSDT", &["100", "100.2"]);
        let (mut session, handle, _rx) = session(config(vec![threshold("t", dec!(0.2))]), feed);

        let task = tokio::spawn(async move {
            let summary = session.run().await.unwrap();
            (session, summary)
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
        let (session, summary) = task.await.unwrap();

        assert_eq!(summary.reason, StopReason::Interrupted);
        assert_eq!(summary.events_processed, 2);
        assert!(summary.strategies[0].holdings > Decimal::ZERO);
        assert_eq!(session.feed().closes, 1);
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn bad_and_foreign_messages_are_skipped() {
        let feed = ScriptedFeed::new(vec![
            text("garbage"),
            text(r#"{"result":null,"id":1}"#),
            text(r#"{"e":"trade","s":"BTCUSDT"}"#),
            trade("ETHUSDT", "2000"),
            trade("btcusdt", "100"),
            Step::Drop("bye"),
        ]);
        let (mut session, _handle, mut rx) = session(config(vec![threshold("t", dec!(0.2))]), feed);

        let summary = session.run().await.unwrap();

        assert_eq!(summary.events_processed, 1);
        assert_eq!(summary.last_price, Some(dec!(100)));
        assert_eq!(ticks(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn failed_handshake_is_fatal_and_reported() {
        let feed = ScriptedFeed::trades("BTCUSDT", &["100"]).with_connect_outcomes(&[false]);
        let (mut session, _handle, mut rx) = session(config(vec![threshold("t", dec!(0.2))]), feed);

        let err = session.run().await.unwrap_err();

        assert!(matches!(err, SessionError::Connection { .. }));
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.feed().closes, 1);
        let mut reported = None;
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::Summary(summary) = event {
                reported = Some(summary);
            }
        }
        let reported = reported.unwrap();
        assert!(matches!(reported.reason, StopReason::ConnectionFailed(_)));
        assert_eq!(reported.strategies[0].cash, dec!(100));
    }

    #[tokio::test]
    async fn reconnect_policy_resumes_then_gives_up() {
        let feed = ScriptedFeed::new(vec![
            trade("BTCUSDT", "100"),
            Step::Drop("blip"),
            trade("BTCUSDT", "100.2"),
            Step::Drop("gone"),
        ]);
        let mut cfg = config(vec![threshold("t", dec!(0.2))]);
        cfg.on_disconnect = DisconnectPolicy::Reconnect;
        cfg.max_reconnect_attempts = 1;
        cfg.reconnect_delay_secs = 0;
        let (mut session, _handle, _rx) = session(cfg, feed);

        let summary = session.run().await.unwrap();

        assert_eq!(session.feed().connects, 2);
        assert_eq!(summary.events_processed, 2);
        assert_eq!(
            summary.reason,
            StopReason::FeedDisconnected("gone".to_string())
        );
        // Partial state survives into the report
        assert!(summary.strategies[0].holdings > Decimal::ZERO);
        assert!(summary.strategies[0].unrealized_pnl.is_some());
    }

    #[tokio::test]
    async fn failed_reconnect_counts_as_an_attempt() {
        let feed = ScriptedFeed::new(vec![trade("BTCUSDT", "100"), Step::Drop("blip")])
            .with_connect_outcomes(&[true, false, false]);
        let mut cfg = config(vec![threshold("t", dec!(0.2))]);
        cfg.on_disconnect = DisconnectPolicy::Reconnect;
        cfg.max_reconnect_attempts = 2;
        cfg.reconnect_delay_secs = 0;
        let (mut session, _handle, _rx) = session(cfg, feed);

        let summary = session.run().await.unwrap();

        assert_eq!(session.feed().connects, 3);
        assert!(matches!(summary.reason, StopReason::FeedDisconnected(_)));
    }

    #[tokio::test]
    async fn fills_are_attributed_per_strategy() {
        let feed = ScriptedFeed::new(vec![
            trade("BTCUSDT", "100"),
            trade("BTCUSDT", "100.5"),
            trade("BTCUSDT", "101"),
            Step::Drop("done"),
        ]);
        let cfg = config(vec![threshold("tight", dec!(0.2)), threshold("wide", dec!(1))]);
        let (mut session, _handle, mut rx) = session(cfg, feed);

        let summary = session.run().await.unwrap();
        let ticks = ticks(&mut rx);

        assert_eq!(ticks.len(), 6);
        let fills: Vec<(String, StrategyId)> = ticks
            .iter()
            .filter_map(|t| t.fill.as_ref().map(|f| (t.strategy.clone(), f.strategy)))
            .collect();
        assert_eq!(
            fills,
            vec![
                ("tight".to_string(), StrategyId(0)),
                ("wide".to_string(), StrategyId(1)),
            ]
        );
        assert_eq!(summary.strategies[0].name, "tight");
        assert_eq!(summary.strategies[1].name, "wide");
        assert_eq!(
            session.tracker().portfolio(StrategyId(1)).unwrap().cash_balance(),
            Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn runs_only_once() {
        let feed = ScriptedFeed::new(vec![Step::Drop("done")]);
        let (mut session, _handle, _rx) = session(config(vec![threshold("t", dec!(0.2))]), feed);
        session.run().await.unwrap();
        assert!(session.run().await.is_err());
    }

    #[tokio::test]
    async fn dust_prices_do_not_break_the_session() {
        let feed = ScriptedFeed::new(vec![
            trade("BTCUSDT", "0.0000000000000000000000000001"),
            trade("BTCUSDT", "0.000000000000000000000000001"),
            Step::Drop("done"),
        ]);
        let (mut session, _handle, mut rx) = session(config(vec![threshold("t", dec!(0.2))]), feed);

        let summary = session.run().await.unwrap();

        let ticks = ticks(&mut rx);
        assert_eq!(ticks[1].signal, Signal::Buy);
        assert!(ticks[1].fill.is_none());
        assert_eq!(summary.strategies[0].cash, dec!(100));
        assert_eq!(summary.strategies[0].round_trips, 0);
        assert_eq!(session.feed().closes, 1);
    }

    #[tokio::test]
    async fn unfilled_buy_is_retried_on_the_next_rise() {
        let feed = ScriptedFeed::new(vec![
            trade("BTCUSDT", "100"),
            trade("BTCUSDT", "100.2"),
            trade("BTCUSDT", "100.3"),
            Step::Drop("done"),
        ]);
        let mut cfg = config(vec![threshold("t", dec!(0.2))]);
        // 100 cash buys less than one whole unit, so every BUY floors to zero
        cfg.quantity_step = dec!(1000);
        let (mut session, _handle, mut rx) = session(cfg, feed);

        session.run().await.unwrap();

        let signals: Vec<Signal> = ticks(&mut rx).iter().map(|t| t.signal).collect();
        assert_eq!(signals, vec![Signal::Hold, Signal::Buy, Signal::Buy]);
    }

    #[tokio::test]
    async fn coinmarketcap_quotes_are_traded_under_the_session_symbol() {
        let feed = ScriptedFeed::new(vec![
            text(r#"{"d":{"id":1,"t0pu":"100"},"s":"0"}"#),
            text(r#"{"d":{"id":1,"t0pu":"100.2"},"s":"0"}"#),
            Step::Drop("done"),
        ]);
        let (mut session, _handle, mut rx) = session(config(vec![threshold("t", dec!(0.2))]), feed);

        let summary = session.run().await.unwrap();

        assert_eq!(summary.events_processed, 2);
        let ticks = ticks(&mut rx);
        assert_eq!(ticks[1].event.symbol, "BTCUSDT");
        assert_eq!(ticks[1].signal, Signal::Buy);
    }

    #[tokio::test]
    async fn summary_survives_a_full_output_channel() {
        let prices: Vec<String> = (0..20).map(|i| format!("{}", 100 + i)).collect();
        let mut steps: Vec<Step> = prices.iter().map(|p| trade("BTCUSDT", p)).collect();
        steps.push(Step::Drop("done"));
        let cfg = config(vec![threshold("t", dec!(0.2))]);
        let strategies = StrategyRegistry::default()
            .build_all(&cfg.strategies)
            .unwrap();
        let (tx, mut rx) = mpsc::channel(2);
        let (mut session, _handle) = TradingSession::new(cfg, ScriptedFeed::new(steps), strategies, tx);

        let task = tokio::spawn(async move {
            let summary = session.run().await.unwrap();
            drop(session);
            summary
        });
        // Let the ticks overflow the channel before anyone reads
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut received = Vec::new();
        while let Some(event) = rx.recv().await {
            received.push(event);
        }
        let summary = task.await.unwrap();

        assert!(received.len() < 22);
        match received.last() {
            Some(SessionEvent::Summary(reported)) => assert_eq!(*reported, summary),
            other => panic!("expected a summary last, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn stop_interrupts_a_hanging_handshake() {
        let feed = ScriptedFeed::trades("BTCUSDT", &["100"]).stalling();
        let (mut session, handle, _rx) = session(config(vec![threshold("t", dec!(0.2))]), feed);

        let task = tokio::spawn(async move {
            let summary = session.run().await.unwrap();
            (session, summary)
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
        let (session, summary) = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(summary.reason, StopReason::Interrupted);
        assert_eq!(summary.events_processed, 0);
        assert_eq!(session.feed().connects, 1);
        assert_eq!(session.feed().closes, 1);
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn stop_interrupts_a_hanging_reconnect() {
        let feed =
            ScriptedFeed::new(vec![trade("BTCUSDT", "100"), Step::Drop("blip")]).stalling_after(1);
        let mut cfg = config(vec![threshold("t", dec!(0.2))]);
        cfg.on_disconnect = DisconnectPolicy::Reconnect;
        cfg.reconnect_delay_secs = 0;
        let (mut session, handle, _rx) = session(cfg, feed);

        let task = tokio::spawn(async move {
            let summary = session.run().await.unwrap();
            (session, summary)
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
        let (session, summary) = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(summary.reason, StopReason::Interrupted);
        assert_eq!(summary.events_processed, 1);
        assert_eq!(session.feed().connects, 2);
    }
}

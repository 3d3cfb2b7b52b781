// src/config.rs

use crate::error::{Result, SessionError};
use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

const DEFAULT_FEED_URL: &str = "wss://stream.binance.com:9443/ws/btcusdt@trade";

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StrategyConfig {
    /// Registry key, e.g. "threshold" or "bracket".
    pub kind: String,
    /// Label used in logs and the summary. Defaults to the kind.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub params: HashMap<String, Decimal>,
}

impl StrategyConfig {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: None,
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: Decimal) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.kind.clone())
    }

    /// Looks up a strictly positive percentage parameter.
    pub fn percent(&self, key: &str) -> Result<Decimal> {
        match self.params.get(key) {
            Some(value) if *value > Decimal::ZERO => Ok(*value),
            Some(value) => Err(SessionError::InvalidConfig(format!(
                "strategy `{}`: `{}` must be positive, got {}",
                self.label(),
                key,
                value
            ))),
            None => Err(SessionError::InvalidConfig(format!(
                "strategy `{}`: missing parameter `{}`",
                self.label(),
                key
            ))),
        }
    }

    /// Like [`percent`](Self::percent) but falls back to `default` when the key is absent.
    pub fn percent_or(&self, key: &str, default: Decimal) -> Result<Decimal> {
        if self.params.contains_key(key) {
            self.percent(key)
        } else {
            Ok(default)
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectPolicy {
    FailFast,
    Reconnect,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_feed_url")]
    pub feed_url: String,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_runtime_secs")]
    pub runtime_secs: u64,
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
    #[serde(default)]
    pub subscribe_message: Option<String>,
    #[serde(default = "default_on_disconnect")]
    pub on_disconnect: DisconnectPolicy,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    #[serde(default)]
    pub quantity_step: Decimal,
    #[serde(default = "default_cash_scale")]
    pub cash_scale: u32,
    /// Also print HOLD ticks, not only fills.
    #[serde(default)]
    pub print_holds: bool,
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyConfig>,
}

fn default_feed_url() -> String {
    DEFAULT_FEED_URL.to_string()
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_runtime_secs() -> u64 {
    180
}

fn default_initial_balance() -> Decimal {
    Decimal::ONE_HUNDRED
}

fn default_handshake_timeout_secs() -> u64 {
    10
}

fn default_keepalive_interval_secs() -> u64 {
    30
}

fn default_on_disconnect() -> DisconnectPolicy {
    DisconnectPolicy::FailFast
}

fn default_max_reconnect_attempts() -> u32 {
    3
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_cash_scale() -> u32 {
    8
}

fn default_strategies() -> Vec<StrategyConfig> {
    vec![StrategyConfig::new("threshold").with_param("threshold_percent", Decimal::new(2, 1))]
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            feed_url: default_feed_url(),
            symbol: default_symbol(),
            runtime_secs: default_runtime_secs(),
            initial_balance: default_initial_balance(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
            subscribe_message: None,
            on_disconnect: default_on_disconnect(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            quantity_step: Decimal::ZERO,
            cash_scale: default_cash_scale(),
            print_holds: false,
            strategies: default_strategies(),
        }
    }
}

impl SessionConfig {
    /// Reads `Settings.toml` (optional) and `APP_*` environment variables.
    pub fn load() -> Result<Self> {
        let builder = Config::builder()
            .add_source(File::with_name("Settings").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"));

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Rejects settings that would make the session meaningless. Runs before any connection.
    pub fn validate(&self) -> Result<()> {
        if self.initial_balance <= Decimal::ZERO {
            return Err(invalid(format!(
                "initial_balance must be positive, got {}",
                self.initial_balance
            )));
        }
        if self.symbol.trim().is_empty() {
            return Err(invalid("symbol must not be empty".to_string()));
        }
        let url = Url::parse(&self.feed_url)
            .map_err(|e| invalid(format!("feed_url {:?}: {}", self.feed_url, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(invalid(format!(
                "feed_url must use ws:// or wss://, got {}://",
                url.scheme()
            )));
        }
        if self.handshake_timeout_secs == 0 {
            return Err(invalid("handshake_timeout_secs must be positive".to_string()));
        }
        if self.quantity_step < Decimal::ZERO {
            return Err(invalid("quantity_step must not be negative".to_string()));
        }
        if self.strategies.is_empty() {
            return Err(invalid("at least one strategy must be configured".to_string()));
        }
        Ok(())
    }

    pub fn runtime(&self) -> Duration {
        Duration::from_secs(self.runtime_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn keepalive_interval(&self) -> Option<Duration> {
        (self.keepalive_interval_secs > 0).then(|| Duration::from_secs(self.keepalive_interval_secs))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

fn invalid(message: String) -> SessionError {
    SessionError::InvalidConfig(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_are_valid() {
        let cfg = SessionConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.runtime(), Duration::from_secs(180));
        assert_eq!(cfg.initial_balance, dec!(100));
        assert_eq!(cfg.strategies[0].percent("threshold_percent").unwrap(), dec!(0.2));
    }

    #[test]
    fn rejects_non_positive_balance() {
        let cfg = SessionConfig {
            initial_balance: Decimal::ZERO,
            ..SessionConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(SessionError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_http_feed_url() {
        let cfg = SessionConfig {
            feed_url: "https://api.binance.com".to_string(),
            ..SessionConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(SessionError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_empty_strategy_list() {
        let cfg = SessionConfig {
            strategies: vec![],
            ..SessionConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn percent_parameters_must_be_positive() {
        let strat = StrategyConfig::new("threshold").with_param("threshold_percent", dec!(-1));
        assert!(strat.percent("threshold_percent").is_err());
        assert!(strat.percent("missing").is_err());
        assert_eq!(strat.percent_or("missing", dec!(3)).unwrap(), dec!(3));
    }

    #[test]
    fn keepalive_zero_disables_pings() {
        let cfg = SessionConfig {
            keepalive_interval_secs: 0,
            ..SessionConfig::default()
        };
        assert_eq!(cfg.keepalive_interval(), None);
    }
}

// src/strategies/registry.rs
use crate::config::StrategyConfig;
use crate::error::{Result, SessionError};
use crate::strategies::bracket::{BracketParams, BracketStrategy};
use crate::strategies::threshold::ThresholdStrategy;
use crate::strategies::traits::Strategy;
use std::collections::HashMap;

pub type StrategyConstructor = fn(&StrategyConfig) -> Result<Box<dyn Strategy>>;

/// Maps a strategy kind from configuration to its constructor.
pub struct StrategyRegistry {
    constructors: HashMap<String, StrategyConstructor>,
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: &str, constructor: StrategyConstructor) {
        self.constructors.insert(kind.to_lowercase(), constructor);
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.constructors.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn build(&self, config: &StrategyConfig) -> Result<Box<dyn Strategy>> {
        let constructor = self
            .constructors
            .get(&config.kind.to_lowercase())
            .ok_or_else(|| {
                SessionError::InvalidConfig(format!(
                    "unknown strategy kind `{}` (known: {})",
                    config.kind,
                    self.kinds().join(", ")
                ))
            })?;
        constructor(config)
    }

    /// Builds every configured strategy in order, failing on the first bad one.
    pub fn build_all(&self, configs: &[StrategyConfig]) -> Result<Vec<Box<dyn Strategy>>> {
        configs.iter().map(|config| self.build(config)).collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("threshold", build_threshold);
        registry.register("bracket", build_bracket);
        registry.register("conservative", build_conservative);
        registry.register("aggressive", build_aggressive);
        registry
    }
}

fn build_threshold(config: &StrategyConfig) -> Result<Box<dyn Strategy>> {
    let threshold = config.percent("threshold_percent")?;
    Ok(Box::new(ThresholdStrategy::new(config.label(), threshold)))
}

fn build_bracket(config: &StrategyConfig) -> Result<Box<dyn Strategy>> {
    bracket_with_defaults(config, BracketParams::conservative())
}

fn build_conservative(config: &StrategyConfig) -> Result<Box<dyn Strategy>> {
    bracket_with_defaults(config, BracketParams::conservative())
}

fn build_aggressive(config: &StrategyConfig) -> Result<Box<dyn Strategy>> {
    bracket_with_defaults(config, BracketParams::aggressive())
}

fn bracket_with_defaults(
    config: &StrategyConfig,
    defaults: BracketParams,
) -> Result<Box<dyn Strategy>> {
    let params = BracketParams {
        stop_loss_percent: config.percent_or("stop_loss_percent", defaults.stop_loss_percent)?,
        take_profit_percent: config
            .percent_or("take_profit_percent", defaults.take_profit_percent)?,
        recovery_buy_percent: config
            .percent_or("recovery_buy_percent", defaults.recovery_buy_percent)?,
        reinvest_fall_percent: config
            .percent_or("reinvest_fall_percent", defaults.reinvest_fall_percent)?,
    };
    Ok(Box::new(BracketStrategy::new(config.label(), params)))
}

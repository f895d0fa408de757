//! Top-of-range buy guard.
//!
//! A cheap global circuit breaker evaluated before any buy layer is built.
//! Three rules, each independently togglable, checked in order; the first
//! one that fires blocks new buys for this tick:
//!
//! 1. Pump: short-horizon return above threshold
//! 2. RSI top: overbought RSI close to the 24h high
//! 3. Crowd: volume surge close to the 24h high

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

use crate::metrics::MarketSnapshot;

/// Top guard thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopGuardConfig {
    #[serde(default = "default_true")]
    pub pump_enabled: bool,
    /// 1m return that counts as a pump (0.02 = 2%).
    #[serde(default = "default_pump_ret_1m")]
    pub pump_ret_1m: f64,
    #[serde(default = "default_pump_ret_5m")]
    pub pump_ret_5m: f64,

    #[serde(default = "default_true")]
    pub rsi_enabled: bool,
    #[serde(default = "default_rsi_overbought")]
    pub rsi_overbought: f64,
    /// Max distance below the 24h high for the RSI rule (bps).
    #[serde(default = "default_rsi_high_distance_bps")]
    pub rsi_high_distance_bps: f64,

    #[serde(default = "default_true")]
    pub crowd_enabled: bool,
    #[serde(default = "default_crowd_volume_zscore")]
    pub crowd_volume_zscore: f64,
    /// Max distance below the 24h high for the crowd rule (bps).
    #[serde(default = "default_crowd_high_distance_bps")]
    pub crowd_high_distance_bps: f64,
}

impl Default for TopGuardConfig {
    fn default() -> Self {
        Self {
            pump_enabled: true,
            pump_ret_1m: default_pump_ret_1m(),
            pump_ret_5m: default_pump_ret_5m(),
            rsi_enabled: true,
            rsi_overbought: default_rsi_overbought(),
            rsi_high_distance_bps: default_rsi_high_distance_bps(),
            crowd_enabled: true,
            crowd_volume_zscore: default_crowd_volume_zscore(),
            crowd_high_distance_bps: default_crowd_high_distance_bps(),
        }
    }
}

impl TopGuardConfig {
    pub fn validate(&self) -> Result<(), String> {
        let values = [
            ("pump_ret_1m", self.pump_ret_1m),
            ("pump_ret_5m", self.pump_ret_5m),
            ("rsi_overbought", self.rsi_overbought),
            ("rsi_high_distance_bps", self.rsi_high_distance_bps),
            ("crowd_volume_zscore", self.crowd_volume_zscore),
            ("crowd_high_distance_bps", self.crowd_high_distance_bps),
        ];
        for (name, value) in values {
            if !value.is_finite() {
                return Err(format!("{name} must be finite (got {value})"));
            }
        }
        if !(0.0..=100.0).contains(&self.rsi_overbought) {
            return Err(format!(
                "rsi_overbought must be in [0, 100] (got {})",
                self.rsi_overbought
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
fn default_pump_ret_1m() -> f64 {
    0.02 // 2%
}
fn default_pump_ret_5m() -> f64 {
    0.035 // 3.5%
}
fn default_rsi_overbought() -> f64 {
    70.0
}
fn default_rsi_high_distance_bps() -> f64 {
    50.0
}
fn default_crowd_volume_zscore() -> f64 {
    2.0
}
fn default_crowd_high_distance_bps() -> f64 {
    75.0
}

/// Which top guard rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopGuardRule {
    Pump,
    RsiTop,
    Crowd,
}

impl TopGuardRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pump => "pump_guard",
            Self::RsiTop => "rsi_top_guard",
            Self::Crowd => "fomo_guard",
        }
    }
}

impl fmt::Display for TopGuardRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top guard verdict for new buys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopGuardDecision {
    Allow,
    Block { rule: TopGuardRule, reason: String },
}

impl TopGuardDecision {
    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block { .. })
    }
}

/// Evaluates the top guard rules against a metrics snapshot.
#[derive(Debug, Clone, Default)]
pub struct TopGuardEvaluator {
    config: TopGuardConfig,
}

impl TopGuardEvaluator {
    pub fn new(config: TopGuardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TopGuardConfig {
        &self.config
    }

    /// Decide whether new buys should be blocked for `symbol`.
    pub fn should_block_top_buy(&self, symbol: &str, snap: &MarketSnapshot) -> TopGuardDecision {
        let cfg = &self.config;
        let dist_bps = snap.distance_from_high_bps();

        if cfg.pump_enabled && (snap.ret_1m >= cfg.pump_ret_1m || snap.ret_5m >= cfg.pump_ret_5m) {
            let reason = format!(
                "pump_guard ret1m={:.2}% ret5m={:.2}%",
                snap.ret_1m * 100.0,
                snap.ret_5m * 100.0
            );
            return self.block(symbol, TopGuardRule::Pump, reason);
        }

        if cfg.rsi_enabled {
            if let Some(rsi) = snap.rsi_5m {
                if rsi >= cfg.rsi_overbought && dist_bps <= cfg.rsi_high_distance_bps {
                    let reason =
                        format!("rsi_top_guard rsi5m={rsi:.1} distFromHighBps={dist_bps:.1}");
                    return self.block(symbol, TopGuardRule::RsiTop, reason);
                }
            }
        }

        if cfg.crowd_enabled
            && snap.volume_zscore_5m >= cfg.crowd_volume_zscore
            && dist_bps <= cfg.crowd_high_distance_bps
        {
            let reason = format!(
                "fomo_guard volZ={:.2} distFromHighBps={dist_bps:.1}",
                snap.volume_zscore_5m
            );
            return self.block(symbol, TopGuardRule::Crowd, reason);
        }

        trace!(symbol, dist_bps, "Top guard allow");
        TopGuardDecision::Allow
    }

    fn block(&self, symbol: &str, rule: TopGuardRule, reason: String) -> TopGuardDecision {
        debug!(symbol, gate = rule.as_str(), reason = %reason, "Top guard blocked buys");
        TopGuardDecision::Block { rule, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            mid: 100.0,
            ret_1m: 0.0,
            ret_5m: 0.0,
            rsi_5m: None,
            local_high_24h: 110.0,
            volume_zscore_5m: 0.0,
            sample_count: 100,
            updated_at_ms: 0,
        }
    }

    #[test]
    fn test_pump_rule() {
        let guard = TopGuardEvaluator::default();
        let mut snap = snapshot();

        snap.ret_1m = 0.025;
        match guard.should_block_top_buy("ZEC", &snap) {
            TopGuardDecision::Block { rule, reason } => {
                assert_eq!(rule, TopGuardRule::Pump);
                assert_eq!(reason, "pump_guard ret1m=2.50% ret5m=0.00%");
            }
            TopGuardDecision::Allow => panic!("expected pump block"),
        }

        snap.ret_1m = 0.01;
        assert_eq!(
            guard.should_block_top_buy("ZEC", &snap),
            TopGuardDecision::Allow
        );

        snap.ret_5m = 0.035;
        assert!(guard.should_block_top_buy("ZEC", &snap).is_block());
    }

    #[test]
    fn test_rsi_rule_needs_proximity_to_high() {
        let guard = TopGuardEvaluator::default();
        let mut snap = snapshot();
        snap.rsi_5m = Some(75.0);

        // 100 vs 110 high = ~909 bps away
        assert_eq!(
            guard.should_block_top_buy("UNI", &snap),
            TopGuardDecision::Allow
        );

        snap.local_high_24h = 100.3; // ~30 bps
        let decision = guard.should_block_top_buy("UNI", &snap);
        assert!(matches!(
            decision,
            TopGuardDecision::Block {
                rule: TopGuardRule::RsiTop,
                ..
            }
        ));

        snap.rsi_5m = None;
        assert!(!guard.should_block_top_buy("UNI", &snap).is_block());
    }

    #[test]
    fn test_crowd_rule() {
        let guard = TopGuardEvaluator::default();
        let mut snap = snapshot();
        snap.volume_zscore_5m = 2.5;
        snap.local_high_24h = 100.6; // ~60 bps

        match guard.should_block_top_buy("VIRTUAL", &snap) {
            TopGuardDecision::Block { rule, reason } => {
                assert_eq!(rule, TopGuardRule::Crowd);
                assert!(reason.starts_with("fomo_guard volZ=2.50"));
            }
            TopGuardDecision::Allow => panic!("expected crowd block"),
        }
    }

    #[test]
    fn test_first_rule_wins() {
        let guard = TopGuardEvaluator::default();
        let mut snap = snapshot();
        snap.ret_1m = 0.05;
        snap.rsi_5m = Some(90.0);
        snap.volume_zscore_5m = 5.0;
        snap.local_high_24h = 100.0;
        assert!(matches!(
            guard.should_block_top_buy("ZEC", &snap),
            TopGuardDecision::Block {
                rule: TopGuardRule::Pump,
                ..
            }
        ));
    }

    #[test]
    fn test_disabled_rules_skip() {
        let guard = TopGuardEvaluator::new(TopGuardConfig {
            pump_enabled: false,
            ..Default::default()
        });
        let mut snap = snapshot();
        snap.ret_1m = 0.5;
        assert_eq!(
            guard.should_block_top_buy("ZEC", &snap),
            TopGuardDecision::Allow
        );
    }

    #[test]
    fn test_missing_high_uses_mid() {
        let mut snap = snapshot();
        snap.local_high_24h = 0.0;
        assert_eq!(snap.distance_from_high_bps(), 0.0);
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: TopGuardConfig = toml::from_str("rsi_enabled = false").unwrap();
        assert!(!config.rsi_enabled);
        assert!(config.pump_enabled);
        assert_eq!(config.pump_ret_5m, 0.035);
        assert!(config.validate().is_ok());

        let bad = TopGuardConfig {
            rsi_overbought: 150.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}

//! Behavioural buy filter (anti-FOMO / anti-knife).
//!
//! Per-token profiles decide when a move is sharp enough to stop adding
//! longs:
//! - Knife: sharp drop or bid-depth collapse → all buy layers removed and
//!   buys suspended for the profile's cooldown
//! - FOMO: sharp rise → every buy layer pushed further from mid
//!
//! Knife takes precedence over FOMO. Sell layers always pass through
//! untouched.

use std::collections::HashMap;
use std::sync::Arc;

use hlmm_core::{LayerQuote, Price, BPS};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{RiskError, RiskResult};

/// Sensitivity of the behavioural profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviourMode {
    #[default]
    Normal,
    Aggressive,
}

/// Thresholds for one token in one mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviourProfile {
    /// 1m return at or above which FOMO fires (0.012 = 1.2%).
    pub fomo_ret_1m: f64,
    pub fomo_ret_5m: f64,
    /// 1m return at or below which the knife fires (negative).
    pub knife_ret_1m: f64,
    pub knife_ret_5m: f64,
    /// Bid depth / median below which the book is treated as collapsing.
    pub min_depth_ratio: f64,
    /// Multiplier applied to each buy layer's distance from mid under FOMO.
    pub fomo_spread_boost: Decimal,
    /// Buy suspension after a knife (ms).
    pub knife_suspend_ms: u64,
}

impl BehaviourProfile {
    pub fn new(
        fomo_ret_1m: f64,
        fomo_ret_5m: f64,
        knife_ret_1m: f64,
        knife_ret_5m: f64,
        min_depth_ratio: f64,
        fomo_spread_boost: Decimal,
        knife_suspend_min: u64,
    ) -> Self {
        Self {
            fomo_ret_1m,
            fomo_ret_5m,
            knife_ret_1m,
            knife_ret_5m,
            min_depth_ratio,
            fomo_spread_boost,
            knife_suspend_ms: knife_suspend_min * 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ModeProfiles {
    normal: BehaviourProfile,
    aggressive: BehaviourProfile,
}

impl ModeProfiles {
    fn get(&self, mode: BehaviourMode) -> &BehaviourProfile {
        match mode {
            BehaviourMode::Normal => &self.normal,
            BehaviourMode::Aggressive => &self.aggressive,
        }
    }
}

/// Immutable profile table keyed by token.
///
/// Unknown tokens fall back to the conservative profile (ZEC normal).
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviourProfiles {
    tokens: HashMap<String, ModeProfiles>,
    fallback: BehaviourProfile,
}

impl Default for BehaviourProfiles {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BehaviourProfiles {
    /// Built-in table for ZEC, UNI and VIRTUAL.
    pub fn builtin() -> Self {
        let zec = ModeProfiles {
            normal: BehaviourProfile::new(0.012, 0.030, -0.010, -0.030, 0.30, dec!(1.3), 2),
            aggressive: BehaviourProfile::new(0.008, 0.020, -0.008, -0.023, 0.35, dec!(1.7), 4),
        };
        let uni = ModeProfiles {
            normal: BehaviourProfile::new(0.010, 0.025, -0.008, -0.025, 0.25, dec!(1.4), 3),
            aggressive: BehaviourProfile::new(0.007, 0.018, -0.007, -0.020, 0.30, dec!(1.8), 5),
        };
        let virtual_ = ModeProfiles {
            normal: BehaviourProfile::new(0.009, 0.022, -0.009, -0.027, 0.25, dec!(1.5), 3),
            aggressive: BehaviourProfile::new(0.007, 0.016, -0.007, -0.018, 0.35, dec!(1.9), 5),
        };

        let fallback = zec.normal.clone();
        let mut tokens = HashMap::new();
        tokens.insert("ZEC".to_string(), zec);
        tokens.insert("UNI".to_string(), uni);
        tokens.insert("VIRTUAL".to_string(), virtual_);

        Self { tokens, fallback }
    }

    /// Add or replace a token's profiles.
    pub fn with_token(
        mut self,
        token: &str,
        normal: BehaviourProfile,
        aggressive: BehaviourProfile,
    ) -> Self {
        self.tokens
            .insert(token.to_uppercase(), ModeProfiles { normal, aggressive });
        self
    }

    /// Profile for `token` in `mode`, and whether the fallback was used.
    pub fn get(&self, token: &str, mode: BehaviourMode) -> (&BehaviourProfile, bool) {
        match self.tokens.get(&token.to_uppercase()) {
            Some(profiles) => (profiles.get(mode), false),
            None => (&self.fallback, true),
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains_key(&token.to_uppercase())
    }
}

/// Token from a pair name: `"zec-perp"` → `"ZEC"`, `"UNI_USDC"` → `"UNI"`.
pub fn token_of(pair: &str) -> String {
    pair.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_uppercase()
}

/// Market context for one filter evaluation.
#[derive(Debug, Clone)]
pub struct BehaviourInput<'a> {
    pub mode: BehaviourMode,
    pub pair: &'a str,
    pub mid: Price,
    /// Missing returns count as 0.
    pub ret_1m: Option<f64>,
    pub ret_5m: Option<f64>,
    /// Current bid depth (USD). Counts as 0 when a median is known.
    pub bid_depth_now: Option<f64>,
    /// Median bid depth (USD). Without it the depth check is skipped.
    pub bid_depth_median: Option<f64>,
    pub now_ms: u64,
}

/// Result of the behavioural filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Knife: buys removed and suspended until `suspend_until_ms`.
    Blocked {
        sell_layers: Vec<LayerQuote>,
        reason: String,
        suspend_until_ms: u64,
    },
    /// FOMO: buy layers pushed away from mid.
    Modified {
        buy_layers: Vec<LayerQuote>,
        sell_layers: Vec<LayerQuote>,
        spread_multiplier: Decimal,
        reason: String,
    },
    Unchanged {
        buy_layers: Vec<LayerQuote>,
        sell_layers: Vec<LayerQuote>,
    },
}

impl FilterOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Blocked { reason, .. } | Self::Modified { reason, .. } => Some(reason),
            Self::Unchanged { .. } => None,
        }
    }

    /// Surviving `(buy, sell)` layers.
    pub fn into_layers(self) -> (Vec<LayerQuote>, Vec<LayerQuote>) {
        match self {
            Self::Blocked { sell_layers, .. } => (Vec::new(), sell_layers),
            Self::Modified {
                buy_layers,
                sell_layers,
                ..
            }
            | Self::Unchanged {
                buy_layers,
                sell_layers,
            } => (buy_layers, sell_layers),
        }
    }
}

/// Applies behavioural profiles to one tick's layers.
#[derive(Debug, Clone, Default)]
pub struct BehaviouralRiskFilter {
    profiles: Arc<BehaviourProfiles>,
}

impl BehaviouralRiskFilter {
    pub fn new(profiles: Arc<BehaviourProfiles>) -> Self {
        Self { profiles }
    }

    pub fn profiles(&self) -> &BehaviourProfiles {
        &self.profiles
    }

    /// True while a previous knife suspension is still running.
    pub fn is_buy_suspended(suspend_until_ms: Option<u64>, now_ms: u64) -> bool {
        suspend_until_ms.is_some_and(|until| now_ms < until)
    }

    /// Filter `buy` and `sell` layers for the current market.
    pub fn apply(
        &self,
        input: &BehaviourInput<'_>,
        buy: Vec<LayerQuote>,
        sell: Vec<LayerQuote>,
    ) -> RiskResult<FilterOutcome> {
        if !input.mid.is_positive() {
            return Err(RiskError::invalid("mid", input.mid));
        }
        let ret_1m = finite_or_zero("ret_1m", input.ret_1m)?;
        let ret_5m = finite_or_zero("ret_5m", input.ret_5m)?;
        let depth_ratio = depth_ratio(input.bid_depth_now, input.bid_depth_median)?;

        let token = token_of(input.pair);
        let (cfg, fallback) = self.profiles.get(&token, input.mode);
        if fallback {
            debug!(pair = input.pair, token = %token, "No behaviour profile, using fallback");
        }

        let is_knife = ret_1m <= cfg.knife_ret_1m
            || ret_5m <= cfg.knife_ret_5m
            || depth_ratio < cfg.min_depth_ratio;

        if is_knife {
            let reason = format!(
                "knife_detected token={token} ret1m={:.2}% ret5m={:.2}% depthRatio={depth_ratio:.2} suspend={}min",
                ret_1m * 100.0,
                ret_5m * 100.0,
                cfg.knife_suspend_ms / 60_000
            );
            let suspend_until_ms = input.now_ms.saturating_add(cfg.knife_suspend_ms);
            info!(
                pair = input.pair,
                dropped_buys = buy.len(),
                suspend_until_ms,
                reason = %reason,
                "Knife detected, buys suspended"
            );
            return Ok(FilterOutcome::Blocked {
                sell_layers: sell,
                reason,
                suspend_until_ms,
            });
        }

        let is_fomo = ret_1m >= cfg.fomo_ret_1m || ret_5m >= cfg.fomo_ret_5m;
        if is_fomo && !buy.is_empty() {
            let boost = cfg.fomo_spread_boost;
            let buy_layers: Vec<LayerQuote> = buy
                .into_iter()
                .filter_map(|layer| push_from_mid(layer, input.mid, boost))
                .collect();
            let reason = format!(
                "fomo_guard token={token} ret1m={:.2}% ret5m={:.2}% spreadBoost={boost:.1}x",
                ret_1m * 100.0,
                ret_5m * 100.0
            );
            debug!(pair = input.pair, reason = %reason, "FOMO reshape");
            return Ok(FilterOutcome::Modified {
                buy_layers,
                sell_layers: sell,
                spread_multiplier: boost,
                reason,
            });
        }

        Ok(FilterOutcome::Unchanged {
            buy_layers: buy,
            sell_layers: sell,
        })
    }
}

fn finite_or_zero(field: &'static str, value: Option<f64>) -> RiskResult<f64> {
    match value {
        Some(v) if !v.is_finite() => Err(RiskError::invalid(field, v)),
        Some(v) => Ok(v),
        None => Ok(0.0),
    }
}

fn depth_ratio(now: Option<f64>, median: Option<f64>) -> RiskResult<f64> {
    let now = finite_or_zero("bid_depth_now", now)?;
    match median {
        Some(m) if !m.is_finite() => Err(RiskError::invalid("bid_depth_median", m)),
        Some(m) if m > 0.0 => Ok(now / m),
        _ => Ok(1.0),
    }
}

/// Scale a buy layer's distance from mid by `boost`. Layers pushed to a
/// non-positive price are dropped.
fn push_from_mid(mut layer: LayerQuote, mid: Price, boost: Decimal) -> Option<LayerQuote> {
    let mid = mid.inner();
    let dist_bps = (mid - layer.price.inner()) / mid * BPS;
    let new_dist_bps = dist_bps * boost;
    let price = Price::new(mid * (Decimal::ONE - new_dist_bps / BPS));
    if !price.is_positive() {
        return None;
    }
    layer.price = price;
    layer.offset_bps = new_dist_bps;
    Some(layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlmm_core::{OrderSide, Size};

    fn layer(side: OrderSide, price: Decimal, i: u32) -> LayerQuote {
        LayerQuote {
            layer: i,
            side,
            price: Price::new(price),
            size: Size::new(dec!(1)),
            size_usd: price,
            offset_bps: dec!(20),
        }
    }

    fn layers() -> (Vec<LayerQuote>, Vec<LayerQuote>) {
        let buy = vec![
            layer(OrderSide::Buy, dec!(99.8), 0),
            layer(OrderSide::Buy, dec!(99.7), 1),
            layer(OrderSide::Buy, dec!(99.55), 2),
        ];
        let sell = vec![
            layer(OrderSide::Sell, dec!(100.2), 0),
            layer(OrderSide::Sell, dec!(100.3), 1),
        ];
        (buy, sell)
    }

    fn input(pair: &str, ret_1m: Option<f64>, ret_5m: Option<f64>) -> BehaviourInput<'_> {
        BehaviourInput {
            mode: BehaviourMode::Normal,
            pair,
            mid: Price::new(dec!(100)),
            ret_1m,
            ret_5m,
            bid_depth_now: None,
            bid_depth_median: None,
            now_ms: 1_000_000,
        }
    }

    #[test]
    fn test_token_of() {
        assert_eq!(token_of("zec-perp"), "ZEC");
        assert_eq!(token_of("UNI_USDC"), "UNI");
        assert_eq!(token_of("VIRTUAL"), "VIRTUAL");
        assert_eq!(token_of(""), "");
    }

    #[test]
    fn test_builtin_profiles_and_fallback() {
        let profiles = BehaviourProfiles::builtin();
        let (uni, fallback) = profiles.get("UNI", BehaviourMode::Aggressive);
        assert!(!fallback);
        assert_eq!(uni.fomo_spread_boost, dec!(1.8));
        assert_eq!(uni.knife_suspend_ms, 300_000);

        let (unknown, fallback) = profiles.get("DOGE", BehaviourMode::Aggressive);
        assert!(fallback);
        assert_eq!(unknown, profiles.get("ZEC", BehaviourMode::Normal).0);
    }

    #[test]
    fn test_knife_overrides_fomo() {
        let filter = BehaviouralRiskFilter::default();
        let (buy, sell) = layers();
        // ret1m pumps, ret5m crashes: both conditions true
        let outcome = filter
            .apply(&input("ZEC-PERP", Some(0.02), Some(-0.05)), buy, sell.clone())
            .unwrap();

        match outcome {
            FilterOutcome::Blocked {
                sell_layers,
                reason,
                suspend_until_ms,
            } => {
                assert_eq!(sell_layers, sell);
                assert!(reason.starts_with("knife_detected token=ZEC"));
                assert!(reason.ends_with("suspend=2min"));
                assert_eq!(suspend_until_ms, 1_000_000 + 120_000);
            }
            other => panic!("expected knife block, got {other:?}"),
        }
    }

    #[test]
    fn test_knife_wins_on_one_minute_dump_inside_five_minute_pump() {
        let filter = BehaviouralRiskFilter::default();
        let (buy, sell) = layers();
        // -2% over 1m trips the knife, +4% over 5m trips FOMO
        let outcome = filter
            .apply(&input("ZEC", Some(-0.02), Some(0.04)), buy, sell.clone())
            .unwrap();

        let FilterOutcome::Blocked {
            sell_layers,
            reason,
            suspend_until_ms,
        } = outcome
        else {
            panic!("expected knife block");
        };
        assert_eq!(sell_layers, sell);
        assert!(reason.starts_with("knife_detected token=ZEC ret1m=-2.00% ret5m=4.00%"));
        assert!(reason.ends_with("suspend=2min"));
        assert_eq!(suspend_until_ms, 1_000_000 + 120_000);
    }

    #[test]
    fn test_depth_collapse_is_knife() {
        let filter = BehaviouralRiskFilter::default();
        let (buy, sell) = layers();
        let mut inp = input("UNI", None, None);
        inp.bid_depth_now = Some(200.0);
        inp.bid_depth_median = Some(1000.0);
        let outcome = filter.apply(&inp, buy.clone(), sell.clone()).unwrap();
        assert!(outcome.is_blocked());

        // Unknown median skips the depth check
        inp.bid_depth_median = None;
        let outcome = filter.apply(&inp, buy, sell).unwrap();
        assert!(matches!(outcome, FilterOutcome::Unchanged { .. }));
    }

    #[test]
    fn test_fomo_pushes_buys_and_leaves_sells() {
        let filter = BehaviouralRiskFilter::default();
        let (buy, sell) = layers();
        let outcome = filter
            .apply(&input("ZEC", Some(0.013), None), buy.clone(), sell.clone())
            .unwrap();

        let FilterOutcome::Modified {
            buy_layers,
            sell_layers,
            spread_multiplier,
            reason,
        } = outcome
        else {
            panic!("expected FOMO reshape");
        };

        assert_eq!(spread_multiplier, dec!(1.3));
        assert_eq!(sell_layers, sell);
        assert_eq!(reason, "fomo_guard token=ZEC ret1m=1.30% ret5m=0.00% spreadBoost=1.3x");

        let mid = Price::new(dec!(100));
        for (before, after) in buy.iter().zip(&buy_layers) {
            let d0 = before.distance_bps(mid).unwrap();
            let d1 = after.distance_bps(mid).unwrap();
            assert!(d1 >= d0);
            assert_eq!(d1, d0 * dec!(1.3));
            assert_eq!(after.size, before.size);
        }
        assert_eq!(buy_layers[0].price.inner(), dec!(99.74));
    }

    #[test]
    fn test_larger_boost_pushes_bids_further() {
        let profile = |boost| BehaviourProfile::new(0.01, 0.03, -0.01, -0.03, 0.3, boost, 2);
        let profiles = BehaviourProfiles::builtin()
            .with_token("LOW", profile(dec!(1.2)), profile(dec!(1.2)))
            .with_token("HIGH", profile(dec!(1.8)), profile(dec!(1.8)));
        let filter = BehaviouralRiskFilter::new(Arc::new(profiles));
        let (buy, sell) = layers();
        let mid = Price::new(dec!(100));

        let pushed = |pair| match filter
            .apply(&input(pair, Some(0.015), None), buy.clone(), sell.clone())
            .unwrap()
        {
            FilterOutcome::Modified { buy_layers, .. } => buy_layers,
            other => panic!("expected FOMO reshape, got {other:?}"),
        };
        let low = pushed("LOW");
        let high = pushed("HIGH");

        assert_eq!(low.len(), buy.len());
        assert_eq!(high.len(), buy.len());
        for ((base, l), h) in buy.iter().zip(&low).zip(&high) {
            let d0 = base.distance_bps(mid).unwrap();
            let dl = l.distance_bps(mid).unwrap();
            let dh = h.distance_bps(mid).unwrap();
            assert!(d0 <= dl && dl <= dh, "{d0} {dl} {dh}");
            assert!(h.price < l.price);
        }
    }

    #[test]
    fn test_fomo_without_buys_is_unchanged() {
        let filter = BehaviouralRiskFilter::default();
        let (_, sell) = layers();
        let outcome = filter
            .apply(&input("ZEC", Some(0.05), None), Vec::new(), sell)
            .unwrap();
        assert!(matches!(outcome, FilterOutcome::Unchanged { .. }));
    }

    #[test]
    fn test_quiet_market_unchanged() {
        let filter = BehaviouralRiskFilter::default();
        let (buy, sell) = layers();
        let outcome = filter
            .apply(&input("VIRTUAL", Some(0.001), Some(-0.001)), buy.clone(), sell.clone())
            .unwrap();
        assert_eq!(outcome.reason(), None);
        assert_eq!(outcome.into_layers(), (buy, sell));
    }

    #[test]
    fn test_aggressive_mode_is_more_sensitive() {
        let filter = BehaviouralRiskFilter::default();
        let (buy, sell) = layers();
        let mut inp = input("ZEC", Some(0.009), None);
        assert!(matches!(
            filter.apply(&inp, buy.clone(), sell.clone()).unwrap(),
            FilterOutcome::Unchanged { .. }
        ));
        inp.mode = BehaviourMode::Aggressive;
        assert!(matches!(
            filter.apply(&inp, buy, sell).unwrap(),
            FilterOutcome::Modified { .. }
        ));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let filter = BehaviouralRiskFilter::default();
        let (buy, sell) = layers();
        let mut inp = input("ZEC", Some(f64::NAN), None);
        assert!(filter.apply(&inp, buy.clone(), sell.clone()).is_err());

        inp.ret_1m = None;
        inp.mid = Price::ZERO;
        assert!(matches!(
            filter.apply(&inp, buy, sell),
            Err(RiskError::InvalidInput { field: "mid", .. })
        ));
    }

    #[test]
    fn test_custom_profile() {
        let strict = BehaviourProfile::new(0.001, 0.002, -0.001, -0.002, 0.5, dec!(2), 1);
        let profiles = BehaviourProfiles::builtin().with_token("doge", strict.clone(), strict);
        assert!(profiles.contains("DOGE"));
        let filter = BehaviouralRiskFilter::new(Arc::new(profiles));
        let (buy, sell) = layers();
        let outcome = filter
            .apply(&input("DOGE-PERP", Some(0.0015), None), buy, sell)
            .unwrap();
        assert!(matches!(
            outcome,
            FilterOutcome::Modified { spread_multiplier, .. } if spread_multiplier == dec!(2)
        ));
    }

    #[test]
    fn test_suspension_window() {
        assert!(BehaviouralRiskFilter::is_buy_suspended(Some(2_000), 1_999));
        assert!(!BehaviouralRiskFilter::is_buy_suspended(Some(2_000), 2_000));
        assert!(!BehaviouralRiskFilter::is_buy_suspended(None, 0));
    }
}

//! Per-tick quote pipeline.
//!
//! Runs the quoting components for one pair in order:
//!
//! ```text
//! mid/volume ─→ MetricsStore.update() ─→ MarketSnapshot
//!                                           │
//!                 TopGuardEvaluator ←───────┤
//!                                           │
//! inventory/trend ─→ compute_side_spread() ─→ build_layers() (per side)
//!                                           │
//!                 BehaviouralRiskFilter ←───┘
//!                           │
//!                   quantize_layer() ─→ QuotePlan
//! ```
//!
//! Both guards run every tick. Any buy block (top guard, knife, or a
//! still-running suspension) removes all buys, a FOMO reshape only moves
//! them, and every reason is reported. Sells are never touched by the
//! guards. Exposure is only read here; the caller books accepted orders on
//! the shared [`ExposureTracker`].

use std::sync::Arc;

use hlmm_core::{
    check_min_notional, quantize_layer, InstrumentSpec, LayerQuote, OrderSide, Price,
    QuantizedQuote,
};
use hlmm_mm::{
    build_layers, compute_side_spread, ExposureTracker, InstitutionalSizer, InventoryState,
    LayerRequest, MmConfig, SideSpread, SpreadInputs, Trend, VisionInputs,
};
use hlmm_risk::{
    BehaviourInput, BehaviourMode, BehaviourProfiles, BehaviouralRiskFilter, FilterOutcome,
    MarketSnapshot, MetricsStore, TopGuardDecision, TopGuardEvaluator,
};
use hlmm_telemetry::Metrics;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info, trace, warn};

use crate::config::AppConfig;
use crate::error::AppResult;

/// Market and position state for one pair at one tick.
#[derive(Debug, Clone)]
pub struct TickInput<'a> {
    pub pair: &'a str,
    pub spec: &'a InstrumentSpec,
    pub mid: f64,
    /// Traded volume since the previous tick.
    pub volume: f64,
    pub inventory: InventoryState,
    pub trend_4h: Trend,
    pub trend_15m: Trend,
    pub vision: Option<VisionInputs>,
    pub flash_crash: bool,
    /// Current bid depth (USD).
    pub bid_depth_now: Option<f64>,
    /// Median bid depth (USD).
    pub bid_depth_median: Option<f64>,
    /// Suspension returned by an earlier tick, if any.
    pub buy_suspended_until_ms: Option<u64>,
    pub now_ms: u64,
}

impl<'a> TickInput<'a> {
    /// Flat, trendless input with no depth data.
    pub fn new(pair: &'a str, spec: &'a InstrumentSpec, mid: f64, now_ms: u64) -> Self {
        Self {
            pair,
            spec,
            mid,
            volume: 0.0,
            inventory: InventoryState::flat(),
            trend_4h: Trend::Neutral,
            trend_15m: Trend::Neutral,
            vision: None,
            flash_crash: false,
            bid_depth_now: None,
            bid_depth_median: None,
            buy_suspended_until_ms: None,
            now_ms,
        }
    }
}

/// Combined buy-side verdict of both guards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiskVerdict {
    /// New buys suppressed for this tick.
    pub blocked: bool,
    pub reasons: Vec<String>,
    /// FOMO distance multiplier applied to the buys.
    pub spread_multiplier: Option<Decimal>,
    /// Buys stay suspended until this time. Feed back on later ticks.
    pub suspend_until_ms: Option<u64>,
}

/// Exchange-legal quotes for one pair at one tick.
#[derive(Debug, Clone)]
pub struct QuotePlan {
    pub pair: String,
    /// Innermost first.
    pub bids: Vec<QuantizedQuote>,
    pub asks: Vec<QuantizedQuote>,
    pub spread: SideSpread,
    pub verdict: RiskVerdict,
    /// Layers removed during quantization, one reason each.
    pub dropped: Vec<String>,
    pub snapshot: MarketSnapshot,
}

impl QuotePlan {
    pub fn quote_count(&self) -> usize {
        self.bids.len() + self.asks.len()
    }
}

/// Result of one pipeline evaluation.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Invalid input or spec; nothing should be quoted this tick.
    Skipped { reason: String },
    Quoted(QuotePlan),
}

impl TickOutcome {
    pub fn plan(&self) -> Option<&QuotePlan> {
        match self {
            Self::Quoted(plan) => Some(plan),
            Self::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Quote pipeline shared across pairs.
///
/// `evaluate` takes `&self`; per-pair state lives in the concurrent stores,
/// so different pairs can be evaluated from different threads.
#[derive(Debug)]
pub struct QuotePipeline {
    mm: MmConfig,
    mode: BehaviourMode,
    metrics: Arc<MetricsStore>,
    exposure: Arc<ExposureTracker>,
    top_guard: TopGuardEvaluator,
    behaviour: BehaviouralRiskFilter,
    sizer: InstitutionalSizer,
}

impl QuotePipeline {
    pub fn new(
        mm: MmConfig,
        mode: BehaviourMode,
        top_guard: TopGuardEvaluator,
        behaviour: BehaviouralRiskFilter,
        sizer: InstitutionalSizer,
    ) -> Self {
        Self {
            mm,
            mode,
            metrics: Arc::new(MetricsStore::new()),
            exposure: Arc::new(ExposureTracker::new()),
            top_guard,
            behaviour,
            sizer,
        }
    }

    /// Pipeline with built-in behaviour profiles.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.mm.clone(),
            config.behaviour_mode,
            TopGuardEvaluator::new(config.top_guard.clone()),
            BehaviouralRiskFilter::new(Arc::new(BehaviourProfiles::builtin())),
            config.sizer(),
        )
    }

    /// Share existing stores (e.g. across a pipeline rebuild on config reload).
    pub fn with_stores(
        mut self,
        metrics: Arc<MetricsStore>,
        exposure: Arc<ExposureTracker>,
    ) -> Self {
        self.metrics = metrics;
        self.exposure = exposure;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsStore> {
        &self.metrics
    }

    pub fn exposure(&self) -> &Arc<ExposureTracker> {
        &self.exposure
    }

    /// Evaluate one tick. Component errors become [`TickOutcome::Skipped`].
    pub fn evaluate(&self, input: &TickInput<'_>) -> TickOutcome {
        Metrics::tick_evaluated(input.pair);

        match self.try_evaluate(input) {
            Ok(plan) => {
                Metrics::side_spread(
                    input.pair,
                    "buy",
                    plan.spread.bid_bps.to_f64().unwrap_or_default(),
                );
                Metrics::side_spread(
                    input.pair,
                    "sell",
                    plan.spread.ask_bps.to_f64().unwrap_or_default(),
                );
                Metrics::quotes_emitted(input.pair, "buy", plan.bids.len());
                Metrics::quotes_emitted(input.pair, "sell", plan.asks.len());
                TickOutcome::Quoted(plan)
            }
            Err(e) => {
                warn!(pair = input.pair, error = %e, "Tick skipped");
                Metrics::tick_skipped(input.pair, e.kind());
                TickOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn try_evaluate(&self, input: &TickInput<'_>) -> AppResult<QuotePlan> {
        let pair = input.pair;
        let mid = Price::from_f64_checked(input.mid)?;
        let snapshot = self
            .metrics
            .update(pair, input.mid, input.volume, input.now_ms)?;

        let top = self.top_guard.should_block_top_buy(pair, &snapshot);

        let spread = compute_side_spread(&SpreadInputs {
            base_bps: self.mm.base_spread_bps,
            inventory_ratio: input.inventory.inventory_ratio(self.mm.max_inventory_usd),
            trend_4h: input.trend_4h,
            trend_15m: input.trend_15m,
            vision: input.vision.clone(),
            flash_crash: input.flash_crash,
        });
        trace!(pair, breakdown = ?spread.breakdown, "Spread breakdown");

        let buys = self.side_layers(pair, mid, OrderSide::Buy, &spread);
        let sells = self.side_layers(pair, mid, OrderSide::Sell, &spread);

        let outcome = self.behaviour.apply(
            &BehaviourInput {
                mode: self.mode,
                pair,
                mid,
                ret_1m: Some(snapshot.ret_1m),
                ret_5m: Some(snapshot.ret_5m),
                bid_depth_now: input.bid_depth_now,
                bid_depth_median: input.bid_depth_median,
                now_ms: input.now_ms,
            },
            buys,
            sells,
        )?;

        let mut verdict = RiskVerdict::default();
        if let TopGuardDecision::Block { rule, reason } = top {
            Metrics::buy_blocked(rule.as_str(), pair);
            verdict.blocked = true;
            verdict.reasons.push(reason);
        }

        let (mut buys, sells) = match outcome {
            FilterOutcome::Blocked {
                sell_layers,
                reason,
                suspend_until_ms,
            } => {
                Metrics::buy_blocked("knife", pair);
                verdict.blocked = true;
                verdict.reasons.push(reason);
                verdict.suspend_until_ms = Some(suspend_until_ms);
                (Vec::new(), sell_layers)
            }
            FilterOutcome::Modified {
                buy_layers,
                sell_layers,
                spread_multiplier,
                reason,
            } => {
                Metrics::fomo_reshape(pair);
                verdict.spread_multiplier = Some(spread_multiplier);
                verdict.reasons.push(reason);
                (buy_layers, sell_layers)
            }
            FilterOutcome::Unchanged {
                buy_layers,
                sell_layers,
            } => (buy_layers, sell_layers),
        };

        if BehaviouralRiskFilter::is_buy_suspended(input.buy_suspended_until_ms, input.now_ms) {
            if let Some(until) = input.buy_suspended_until_ms {
                // A fresh knife may extend, never shorten, the window.
                let until = verdict.suspend_until_ms.map_or(until, |new| new.max(until));
                if verdict.suspend_until_ms.is_none() {
                    Metrics::buy_blocked("suspended", pair);
                    verdict
                        .reasons
                        .push(format!("buy_suspended remainingMs={}", until - input.now_ms));
                }
                verdict.blocked = true;
                verdict.suspend_until_ms = Some(until);
            }
        }

        if verdict.blocked {
            buys.clear();
            info!(pair, reasons = ?verdict.reasons, "New buys blocked");
        }

        let mut dropped = Vec::new();
        let bids = quantize_side(pair, &buys, input.spec, &mut dropped);
        let asks = quantize_side(pair, &sells, input.spec, &mut dropped);

        debug!(
            pair,
            mid = input.mid,
            bid_bps = %spread.bid_bps,
            ask_bps = %spread.ask_bps,
            bids = bids.len(),
            asks = asks.len(),
            blocked = verdict.blocked,
            dropped = dropped.len(),
            "Quote plan"
        );

        Ok(QuotePlan {
            pair: pair.to_string(),
            bids,
            asks,
            spread,
            verdict,
            dropped,
            snapshot,
        })
    }

    fn side_layers(
        &self,
        pair: &str,
        mid: Price,
        side: OrderSide,
        spread: &SideSpread,
    ) -> Vec<LayerQuote> {
        let side_bps = match side {
            OrderSide::Buy => spread.bid_bps,
            OrderSide::Sell => spread.ask_bps,
        };
        build_layers(
            &LayerRequest {
                pair,
                mid,
                side,
                side_bps,
                safe_base_bps: spread.breakdown.safe_base_bps,
                current_exposure_usd: self.exposure.get_exposure(pair, side),
            },
            &self.mm,
            &self.sizer,
        )
    }
}

/// Quantize layers. A layer that fails to quantize, rounds to zero size or
/// falls below the instrument's minimum notional is left out and its reason
/// appended to `dropped`; the other layers are kept.
fn quantize_side(
    pair: &str,
    layers: &[LayerQuote],
    spec: &InstrumentSpec,
    dropped: &mut Vec<String>,
) -> Vec<QuantizedQuote> {
    let mut quotes = Vec::with_capacity(layers.len());
    for layer in layers {
        let quote = match quantize_layer(layer, spec) {
            Ok(quote) => quote,
            Err(e) => {
                warn!(pair, side = %layer.side, layer = layer.layer, error = %e, "Layer dropped");
                dropped.push(format!("{} layer {}: {e}", layer.side, layer.layer));
                continue;
            }
        };
        if quote.size.is_zero() {
            trace!(pair, side = %layer.side, layer = layer.layer, "Layer rounds to zero size");
            dropped.push(format!(
                "{} layer {}: size {} rounds to zero",
                layer.side, layer.layer, layer.size
            ));
            continue;
        }
        if !check_min_notional(
            quote.size.size_int,
            quote.price.price_int,
            spec,
            spec.min_notional_usd,
        ) {
            trace!(
                pair,
                side = %layer.side,
                layer = layer.layer,
                size = %quote.size.size_str,
                price = %quote.price.price_str,
                "Quote below exchange minimum, dropped"
            );
            dropped.push(format!(
                "{} layer {}: {} @ {} below min notional {}",
                layer.side,
                layer.layer,
                quote.size.size_str,
                quote.price.price_str,
                spec.min_notional_usd
            ));
            continue;
        }
        quotes.push(quote);
    }
    quotes
}

//! Asymmetric per-side spread computation.
//!
//! Starts from a base spread and applies multiplicative adjustments per side:
//! - Inventory: widen the side that would grow the position, tighten the other
//! - Trend: widen the side facing an aligned 4h/15m trend
//! - Vision: optional chart-analysis bias and risk widening
//! - Flash crash: widen both sides
//!
//! Each side is then clamped to `[0.6, 1.8] × base`. Pure and deterministic.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Floor for the base spread (bps).
const MIN_BASE_BPS: Decimal = dec!(2);
/// Max extra widening from inventory at |ratio| = 1.
const INVENTORY_MAX_EXTRA: Decimal = dec!(0.5);
/// Share of the inventory widening taken off the opposite side.
const INVENTORY_TIGHTEN_SHARE: Decimal = dec!(0.3);
const TREND_WIDEN: Decimal = dec!(1.15);
const VISION_TIGHTEN: Decimal = dec!(0.9);
const VISION_WIDEN: Decimal = dec!(1.1);
const VISION_RISK_WIDEN: Decimal = dec!(1.15);
const FLASH_CRASH_MULT: Decimal = dec!(1.6);
const CLAMP_MIN: Decimal = dec!(0.6);
const CLAMP_MAX: Decimal = dec!(1.8);

/// Higher-timeframe trend classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bull,
    Bear,
    #[default]
    Neutral,
}

/// Trend direction reported by chart analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualTrend {
    Up,
    Down,
    #[default]
    Sideways,
}

/// Optional chart-analysis signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisionInputs {
    pub trend: VisualTrend,
    /// Conviction score in `[0, 100]`, 50 = neutral.
    pub score: Option<f64>,
    /// Risk score in `[0, 10]`.
    pub risk: Option<f64>,
    #[serde(default)]
    pub squeeze_risk: bool,
    #[serde(default)]
    pub breakout_risk: bool,
}

impl VisionInputs {
    /// Normalized score in `[-1, 1]`. Missing or non-finite scores are neutral.
    fn signed_score(&self) -> f64 {
        let score = self.score.filter(|s| s.is_finite()).unwrap_or(50.0);
        (score - 50.0) / 50.0
    }

    fn risk(&self) -> f64 {
        self.risk.filter(|r| r.is_finite()).unwrap_or(0.0)
    }

    fn high_risk(&self) -> bool {
        self.risk() > 7.0 || self.breakout_risk || self.squeeze_risk
    }
}

/// Inputs for [`compute_side_spread`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpreadInputs {
    pub base_bps: Decimal,
    /// Signed inventory ratio, positive = long. Magnitude is capped at 1.
    pub inventory_ratio: Decimal,
    pub trend_4h: Trend,
    pub trend_15m: Trend,
    pub vision: Option<VisionInputs>,
    pub flash_crash: bool,
}

/// Every multiplier that went into a [`SideSpread`], for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpreadBreakdown {
    pub safe_base_bps: Decimal,
    pub inv_bid_mult: Decimal,
    pub inv_ask_mult: Decimal,
    pub trend_bid_mult: Decimal,
    pub trend_ask_mult: Decimal,
    pub vision_bid_mult: Decimal,
    pub vision_ask_mult: Decimal,
    pub flash_mult: Decimal,
    pub unclamped_bid_bps: Decimal,
    pub unclamped_ask_bps: Decimal,
}

/// Per-side spread in bps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideSpread {
    pub bid_bps: Decimal,
    pub ask_bps: Decimal,
    pub breakdown: SpreadBreakdown,
}

impl SideSpread {
    /// Bid multiplier relative to the safe base.
    pub fn bid_scale(&self) -> Decimal {
        self.bid_bps / self.breakdown.safe_base_bps
    }

    /// Ask multiplier relative to the safe base.
    pub fn ask_scale(&self) -> Decimal {
        self.ask_bps / self.breakdown.safe_base_bps
    }
}

/// Compute bid and ask spreads for one instrument.
pub fn compute_side_spread(inputs: &SpreadInputs) -> SideSpread {
    let safe_base = inputs.base_bps.max(MIN_BASE_BPS);

    // Inventory: long → don't buy more, short → don't sell more
    let inv_abs = inputs.inventory_ratio.abs().min(Decimal::ONE);
    let extra = INVENTORY_MAX_EXTRA * inv_abs;
    let (inv_bid_mult, inv_ask_mult) = if inputs.inventory_ratio > Decimal::ZERO {
        (
            Decimal::ONE + extra,
            Decimal::ONE - extra * INVENTORY_TIGHTEN_SHARE,
        )
    } else if inputs.inventory_ratio < Decimal::ZERO {
        (
            Decimal::ONE - extra * INVENTORY_TIGHTEN_SHARE,
            Decimal::ONE + extra,
        )
    } else {
        (Decimal::ONE, Decimal::ONE)
    };

    let (trend_bid_mult, trend_ask_mult) = match (inputs.trend_4h, inputs.trend_15m) {
        (Trend::Bull, Trend::Bull) => (Decimal::ONE, TREND_WIDEN),
        (Trend::Bear, Trend::Bear) => (TREND_WIDEN, Decimal::ONE),
        _ => (Decimal::ONE, Decimal::ONE),
    };

    let (vision_bid_mult, vision_ask_mult) = inputs
        .vision
        .as_ref()
        .map(vision_multipliers)
        .unwrap_or((Decimal::ONE, Decimal::ONE));

    let flash_mult = if inputs.flash_crash {
        FLASH_CRASH_MULT
    } else {
        Decimal::ONE
    };

    let unclamped_bid = safe_base * inv_bid_mult * trend_bid_mult * vision_bid_mult * flash_mult;
    let unclamped_ask = safe_base * inv_ask_mult * trend_ask_mult * vision_ask_mult * flash_mult;

    let min_side = safe_base * CLAMP_MIN;
    let max_side = safe_base * CLAMP_MAX;

    SideSpread {
        bid_bps: unclamped_bid.clamp(min_side, max_side),
        ask_bps: unclamped_ask.clamp(min_side, max_side),
        breakdown: SpreadBreakdown {
            safe_base_bps: safe_base,
            inv_bid_mult,
            inv_ask_mult,
            trend_bid_mult,
            trend_ask_mult,
            vision_bid_mult,
            vision_ask_mult,
            flash_mult,
            unclamped_bid_bps: unclamped_bid,
            unclamped_ask_bps: unclamped_ask,
        },
    }
}

/// (bid, ask) multipliers from chart analysis.
fn vision_multipliers(vision: &VisionInputs) -> (Decimal, Decimal) {
    let s = vision.signed_score();
    let calm = vision.risk() < 5.0;
    let mut bid = Decimal::ONE;
    let mut ask = Decimal::ONE;

    match vision.trend {
        VisualTrend::Up => {
            // Happy to buy pullbacks, protect against a runaway
            if s > 0.3 && calm {
                bid *= VISION_TIGHTEN;
                ask *= VISION_WIDEN;
            }
            if vision.high_risk() {
                ask *= VISION_RISK_WIDEN;
            }
        }
        VisualTrend::Down => {
            if s < -0.3 && calm {
                ask *= VISION_TIGHTEN;
                bid *= VISION_WIDEN;
            }
            if vision.high_risk() {
                bid *= VISION_RISK_WIDEN;
            }
        }
        VisualTrend::Sideways => {}
    }

    (bid, ask)
}

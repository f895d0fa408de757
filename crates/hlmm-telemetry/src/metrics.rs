//! Prometheus metrics for hlmm.
//!
//! Covers the quote pipeline:
//! - Ticks evaluated and skipped
//! - Guard blocks by rule
//! - FOMO reshapes and knife suspensions
//! - Side spreads and emitted quotes
//!
//! # Panics
//!
//! Registration uses `unwrap()`: a failure means duplicate metric names,
//! which is a startup bug. It only happens during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, CounterVec, Encoder, GaugeVec, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Ticks evaluated per pair.
pub static TICKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hlmm_ticks_total",
        "Total quote pipeline evaluations",
        &["pair"]
    )
    .unwrap()
});

/// Ticks that produced no plan.
/// Labels: reason (invalid_spec/invalid_input/time_regression/...)
pub static TICKS_SKIPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hlmm_ticks_skipped_total",
        "Total ticks skipped without a quote plan",
        &["pair", "reason"]
    )
    .unwrap()
});

/// Buy blocks by guard.
/// Labels: guard (pump_guard/rsi_top_guard/fomo_guard/knife/suspended)
pub static BUY_BLOCKED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hlmm_buy_blocked_total",
        "Total ticks with new buys blocked",
        &["guard", "pair"]
    )
    .unwrap()
});

/// FOMO reshapes of buy layers.
pub static FOMO_RESHAPE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hlmm_fomo_reshape_total",
        "Total ticks with buy layers pushed away from mid",
        &["pair"]
    )
    .unwrap()
});

/// Current side spread in bps.
pub static SIDE_SPREAD_BPS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "hlmm_side_spread_bps",
        "Current per-side spread in basis points",
        &["pair", "side"]
    )
    .unwrap()
});

/// Quotes emitted after quantization.
pub static QUOTES_EMITTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hlmm_quotes_emitted_total",
        "Total exchange-legal quotes emitted",
        &["pair", "side"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    pub fn tick_evaluated(pair: &str) {
        TICKS_TOTAL.with_label_values(&[pair]).inc();
    }

    pub fn tick_skipped(pair: &str, reason: &str) {
        TICKS_SKIPPED_TOTAL.with_label_values(&[pair, reason]).inc();
    }

    pub fn buy_blocked(guard: &str, pair: &str) {
        BUY_BLOCKED_TOTAL.with_label_values(&[guard, pair]).inc();
    }

    pub fn fomo_reshape(pair: &str) {
        FOMO_RESHAPE_TOTAL.with_label_values(&[pair]).inc();
    }

    /// Record side spreads. `side` is "buy" or "sell".
    pub fn side_spread(pair: &str, side: &str, bps: f64) {
        SIDE_SPREAD_BPS.with_label_values(&[pair, side]).set(bps);
    }

    pub fn quotes_emitted(pair: &str, side: &str, count: usize) {
        QUOTES_EMITTED_TOTAL
            .with_label_values(&[pair, side])
            .inc_by(count as f64);
    }
}

/// Encode every registered metric in the Prometheus text format.
pub fn gather_text() -> TelemetryResult<String> {
    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buf)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
}

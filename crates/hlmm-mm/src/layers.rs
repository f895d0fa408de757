//! Layer grid construction.
//!
//! Each side gets up to `active_layers` quotes at the configured base
//! offsets, stretched by how far the side spread moved from the base
//! spread. Sizes come from the institutional sizer when the pair has an
//! override, otherwise from the per-layer capital split.

use hlmm_core::{LayerQuote, OrderSide, Price, Size};
use rust_decimal::Decimal;
use tracing::trace;

use crate::config::MmConfig;
use crate::sizing::InstitutionalSizer;

/// One side's layer request.
#[derive(Debug, Clone)]
pub struct LayerRequest<'a> {
    pub pair: &'a str,
    pub mid: Price,
    pub side: OrderSide,
    /// Side spread from the spread engine (bps).
    pub side_bps: Decimal,
    /// Base spread after flooring (bps).
    pub safe_base_bps: Decimal,
    /// Exposure already resting on this side (USD).
    pub current_exposure_usd: Decimal,
}

/// Build the layers for one side, innermost first.
///
/// Projected exposure accumulates across the layers so the sum of one
/// tick's clips never exceeds the side budget.
pub fn build_layers(
    req: &LayerRequest<'_>,
    config: &MmConfig,
    sizer: &InstitutionalSizer,
) -> Vec<LayerQuote> {
    if !req.mid.is_positive() {
        return Vec::new();
    }

    let scale = if req.safe_base_bps > Decimal::ZERO {
        req.side_bps / req.safe_base_bps
    } else {
        Decimal::ONE
    };

    let override_sizing = sizer.sizing_for(req.pair);
    let mut count = config.effective_layers();
    if let Some(sizing) = override_sizing {
        count = count.min(sizing.max_layers_per_side as usize);
    }

    let mut layers = Vec::with_capacity(count);
    let mut projected = req.current_exposure_usd;

    for (i, base_offset) in config.layer_offsets_bps.iter().take(count).enumerate() {
        let layer = i as u32;
        let offset_bps = (*base_offset * scale).max(config.min_layer_offset_bps);
        let price = match req.side {
            OrderSide::Buy => req.mid.offset_bps(-offset_bps),
            OrderSide::Sell => req.mid.offset_bps(offset_bps),
        };
        if !price.is_positive() {
            break;
        }

        let size_usd = if override_sizing.is_some() {
            let Some(clip) = sizer.calculate_clip(req.pair, layer, projected) else {
                break;
            };
            if clip.size_usd <= Decimal::ZERO {
                trace!(pair = req.pair, side = %req.side, layer, reason = ?clip.reason, "Layer dropped");
                break;
            }
            projected = projected.saturating_add(clip.size_usd);
            clip.size_usd
        } else {
            let pct = config
                .layer_capital_pct
                .get(i)
                .copied()
                .unwrap_or_else(|| Decimal::ONE_HUNDRED / Decimal::from(count as u64));
            config.capital_per_side_usd * pct / Decimal::ONE_HUNDRED
        };

        if size_usd <= Decimal::ZERO {
            continue;
        }

        layers.push(LayerQuote {
            layer,
            side: req.side,
            price,
            size: Size::from_notional(size_usd, price),
            size_usd,
            offset_bps,
        });
    }

    layers
}

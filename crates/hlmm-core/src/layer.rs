//! Layer quotes: one resting order target per side per layer.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::quant::{QuantizedPrice, QuantizedSize};
use crate::{OrderSide, Price, Size};

/// A single layer's target price and size, before quantization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerQuote {
    /// Layer index (0 = closest to mid).
    pub layer: u32,
    pub side: OrderSide,
    /// Target price (off-grid until quantized).
    pub price: Price,
    /// Target size in coins.
    pub size: Size,
    /// Target notional in USD.
    pub size_usd: Decimal,
    /// Distance from mid this layer was built from, in bps.
    pub offset_bps: Decimal,
}

impl LayerQuote {
    /// Distance from `mid` in bps, positive when the quote is on its passive side.
    pub fn distance_bps(&self, mid: Price) -> Option<Decimal> {
        let signed = self.price.bps_from(mid)?;
        Some(match self.side {
            OrderSide::Buy => -signed,
            OrderSide::Sell => signed,
        })
    }
}

/// An exchange-legal quote ready for the order manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuantizedQuote {
    pub layer: u32,
    pub side: OrderSide,
    pub price: QuantizedPrice,
    pub size: QuantizedSize,
    pub offset_bps: Decimal,
}

impl QuantizedQuote {
    pub fn price_str(&self) -> &str {
        &self.price.price_str
    }

    pub fn size_str(&self) -> &str {
        &self.size.size_str
    }
}

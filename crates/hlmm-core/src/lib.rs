//! Core domain types for the hlmm market maker.
//!
//! This crate provides the numeric and exchange-facing building blocks:
//! - `Price`, `Size`: Precision-safe decimal newtypes
//! - `InstrumentSpec`: Tick/lot grid with derived decimal counts
//! - `LayerQuote`: A single resting order target around mid
//! - `quant`: Integer-exact price/size quantization

pub mod decimal;
pub mod error;
pub mod instrument;
pub mod layer;
pub mod order;
pub mod quant;

pub use decimal::{Price, Size, BPS};
pub use error::{CoreError, CoreResult};
pub use instrument::{InstrumentSpec, MAX_DECIMALS};
pub use layer::{LayerQuote, QuantizedQuote};
pub use order::{MakerIntent, OrderSide};
pub use quant::{
    adjust_price_by_ticks, check_min_notional, int_to_decimal_string, parse_decimal_to_int,
    quantize_layer, quantize_order, quantize_price, quantize_price_f64, quantize_price_str,
    quantize_size, quantize_size_f64, safe_step_multiplier, PriceRounding, QuantizedPrice,
    QuantizedSize,
};

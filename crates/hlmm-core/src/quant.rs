//! Exchange-grade quantization.
//!
//! Every price and size that leaves the core goes through this module.
//! Prices become an integer number of ticks, sizes an integer number of lot
//! steps, and the decimal strings handed to the exchange are rebuilt from
//! those integers by splitting digits, never by float formatting. The string
//! therefore always carries exactly `price_decimals` / `size_decimals`
//! fractional digits.
//!
//! Rounding direction:
//! - Buy prices round UP to the tick, sell prices round DOWN.
//! - Sizes always round DOWN to the lot (never oversize).
//!
//! A small epsilon is applied before rounding so that values which picked up
//! binary float noise upstream (`100.01` arriving as `100.0100000000000051`)
//! do not flicker across a tick boundary.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::instrument::{InstrumentSpec, MAX_DECIMALS};
use crate::{LayerQuote, MakerIntent, OrderSide, Price, QuantizedQuote, Size};

/// Boundary-flicker guard applied before ceil/floor (1e-12).
const QUANT_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 12);

/// A price snapped to the tick grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuantizedPrice {
    /// Number of ticks.
    pub ticks: i64,
    /// Price in units of `10^-price_decimals` (`ticks * tick_int`).
    pub price_int: i64,
    /// Exchange string with exactly `price_decimals` fractional digits.
    pub price_str: String,
}

impl QuantizedPrice {
    pub fn as_price(&self, spec: &InstrumentSpec) -> Price {
        Price::new(Decimal::new(self.price_int, spec.price_decimals))
    }
}

/// A size snapped to the lot grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuantizedSize {
    /// Number of lot steps.
    pub steps: i64,
    /// Size in units of `10^-size_decimals` (`steps * lot_int`).
    pub size_int: i64,
    /// Exchange string with exactly `size_decimals` fractional digits.
    pub size_str: String,
}

impl QuantizedSize {
    pub fn as_size(&self, spec: &InstrumentSpec) -> Size {
        Size::new(Decimal::new(self.size_int, spec.size_decimals))
    }

    pub fn is_zero(&self) -> bool {
        self.steps == 0
    }
}

/// Rounding mode for prices that are already decimal strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceRounding {
    Floor,
    Ceil,
    /// Half-up to the nearest tick.
    Round,
    /// Floor, then step one tick lower when the price already sits on the
    /// grid. Side-agnostic; used for ALO orders.
    MakerSafeFloor,
}

/// Quantize a price to the tick grid with side-aware rounding.
pub fn quantize_price(
    price: Price,
    spec: &InstrumentSpec,
    side: OrderSide,
) -> CoreResult<QuantizedPrice> {
    if !price.is_positive() {
        return Err(CoreError::InvalidPrice(format!("{price} is not positive")));
    }

    let tick = spec.tick_size.inner();
    let raw_ticks = match side {
        OrderSide::Buy => ((price.inner() - QUANT_EPSILON) / tick).ceil(),
        OrderSide::Sell => ((price.inner() + QUANT_EPSILON) / tick).floor(),
    };
    let ticks = raw_ticks
        .to_i64()
        .ok_or_else(|| CoreError::Overflow(format!("{raw_ticks} ticks")))?;
    if ticks <= 0 {
        return Err(CoreError::InvalidPrice(format!(
            "{price} is below one tick ({tick})"
        )));
    }

    build_price(ticks, spec)
}

/// Boundary variant of [`quantize_price`] for raw `f64` inputs.
pub fn quantize_price_f64(
    price: f64,
    spec: &InstrumentSpec,
    side: OrderSide,
) -> CoreResult<QuantizedPrice> {
    quantize_price(Price::from_f64_checked(price)?, spec, side)
}

/// Quantize a size down to whole lot steps.
///
/// For lot sizes whose binary representation is inexact (0.1, 0.01, 0.001)
/// the step count is also floored to a multiple of [`safe_step_multiplier`].
/// A size below one multiple comes back as zero steps; callers drop it.
pub fn quantize_size(size: Size, spec: &InstrumentSpec) -> CoreResult<QuantizedSize> {
    if size.inner().is_sign_negative() && !size.is_zero() {
        return Err(CoreError::InvalidSize(format!("{size} is negative")));
    }

    let raw_steps = ((size.inner() + QUANT_EPSILON) / spec.lot_size.inner()).floor();
    let mut steps = raw_steps
        .to_i64()
        .ok_or_else(|| CoreError::Overflow(format!("{raw_steps} lot steps")))?;

    let multiple = safe_step_multiplier(spec.lot_size);
    if multiple > 1 {
        steps = steps / multiple * multiple;
    }

    let size_int = steps
        .checked_mul(spec.lot_int())
        .ok_or_else(|| CoreError::Overflow(format!("{steps} steps * {}", spec.lot_int())))?;

    Ok(QuantizedSize {
        steps,
        size_int,
        size_str: int_to_decimal_string(size_int, spec.size_decimals),
    })
}

/// Boundary variant of [`quantize_size`] for raw `f64` inputs.
pub fn quantize_size_f64(size: f64, spec: &InstrumentSpec) -> CoreResult<QuantizedSize> {
    quantize_size(Size::from_f64_checked(size)?, spec)
}

/// Step multiple for lot sizes that are not exactly representable in binary.
pub fn safe_step_multiplier(lot_size: Size) -> i64 {
    let lot = lot_size.inner();
    if lot == dec!(0.1) {
        10
    } else if lot == dec!(0.01) {
        100
    } else if lot == dec!(0.001) {
        1000
    } else {
        1
    }
}

/// Quantize a decimal price string with an explicit rounding mode.
///
/// Digits beyond the grid precision are truncated before rounding.
pub fn quantize_price_str(
    price_str: &str,
    spec: &InstrumentSpec,
    mode: PriceRounding,
) -> CoreResult<QuantizedPrice> {
    let raw = parse_decimal_to_int(price_str, spec.price_decimals)?;
    if raw < 0 {
        return Err(CoreError::InvalidPrice(format!("{price_str} is negative")));
    }

    let tick_int = spec.tick_int();
    let mut ticks = raw / tick_int;
    let rem = raw % tick_int;

    match mode {
        PriceRounding::Floor => {}
        PriceRounding::Ceil => {
            if rem != 0 {
                ticks += 1;
            }
        }
        PriceRounding::Round => {
            if rem * 2 >= tick_int {
                ticks += 1;
            }
        }
        PriceRounding::MakerSafeFloor => {
            if rem == 0 && ticks > 0 {
                ticks -= 1;
            }
        }
    }

    if ticks <= 0 {
        return Err(CoreError::InvalidPrice(format!(
            "{price_str} rounds below one tick"
        )));
    }
    build_price(ticks, spec)
}

/// Quantize a full order, choosing the price mode from the maker intent.
///
/// ALO orders use the maker-safe floor, GTC orders round to the nearest tick.
/// Sizes are floored to the lot grid.
pub fn quantize_order(
    intent: MakerIntent,
    price: Price,
    size: Size,
    spec: &InstrumentSpec,
) -> CoreResult<(QuantizedPrice, QuantizedSize)> {
    let mode = match intent {
        MakerIntent::Alo => PriceRounding::MakerSafeFloor,
        MakerIntent::Gtc => PriceRounding::Round,
    };
    let qp = quantize_price_str(&price.inner().to_string(), spec, mode)?;
    let qs = quantize_size(size, spec)?;
    Ok((qp, qs))
}

/// Quantize a layer quote into its exchange-legal form.
pub fn quantize_layer(layer: &LayerQuote, spec: &InstrumentSpec) -> CoreResult<QuantizedQuote> {
    Ok(QuantizedQuote {
        layer: layer.layer,
        side: layer.side,
        price: quantize_price(layer.price, spec, layer.side)?,
        size: quantize_size(layer.size, spec)?,
        offset_bps: layer.offset_bps,
    })
}

/// Check `size * price >= min_notional` on the integer grid.
///
/// The product is computed with checked `i64` arithmetic. When either the
/// product or the scaled threshold would overflow, the comparison falls back
/// to dividing each operand down to units first.
pub fn check_min_notional(
    size_int: i64,
    price_int: i64,
    spec: &InstrumentSpec,
    min_notional: Decimal,
) -> bool {
    if size_int <= 0 || price_int <= 0 {
        return false;
    }
    if min_notional <= Decimal::ZERO {
        return true;
    }

    let threshold = min_notional
        .checked_mul(Decimal::from(spec.step_multiplier()))
        .and_then(|v| v.checked_mul(Decimal::from(spec.tick_multiplier())))
        .and_then(|v| v.ceil().to_i64());

    match (size_int.checked_mul(price_int), threshold) {
        (Some(product), Some(threshold)) => product >= threshold,
        _ => {
            let size = Decimal::new(size_int, spec.size_decimals);
            let price = Decimal::new(price_int, spec.price_decimals);
            match size.checked_mul(price) {
                Some(notional) => notional >= min_notional,
                // Beyond decimal range: necessarily above any sane minimum.
                None => true,
            }
        }
    }
}

/// Shift an already-quantized price string by `tick_delta` ticks.
///
/// Parsing is pure string-to-integer; the result is clamped to one tick.
pub fn adjust_price_by_ticks(
    price_str: &str,
    tick_delta: i64,
    spec: &InstrumentSpec,
) -> CoreResult<String> {
    let tick_int = spec.tick_int();
    let current = parse_decimal_to_int(price_str, spec.price_decimals)?;
    let adjusted = tick_delta
        .checked_mul(tick_int)
        .and_then(|delta| current.checked_add(delta))
        .ok_or_else(|| CoreError::Overflow(format!("{price_str} {tick_delta:+} ticks")))?;

    Ok(int_to_decimal_string(adjusted.max(tick_int), spec.price_decimals))
}

/// Build a decimal string from an integer in units of `10^-decimals`.
///
/// `int_to_decimal_string(51280, 1) == "5128.0"`
pub fn int_to_decimal_string(value: i64, decimals: u32) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let sign = if value < 0 { "-" } else { "" };
    let digits = value.unsigned_abs().to_string();
    let width = decimals as usize + 1;
    let padded = format!("{digits:0>width$}");
    let split = padded.len() - decimals as usize;
    format!("{sign}{}.{}", &padded[..split], &padded[split..])
}

/// Parse a decimal string into an integer in units of `10^-decimals`.
///
/// Extra fractional digits are truncated, missing ones are zero-filled.
pub fn parse_decimal_to_int(s: &str, decimals: u32) -> CoreResult<i64> {
    if decimals > MAX_DECIMALS {
        return Err(CoreError::InvalidSpec(format!(
            "decimals {decimals} > {MAX_DECIMALS}"
        )));
    }

    let trimmed = s.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));

    let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !is_digits(int_part) || !is_digits(frac_part)
    {
        return Err(CoreError::Malformed(s.to_string()));
    }

    let mut frac: String = frac_part.chars().take(decimals as usize).collect();
    while frac.len() < decimals as usize {
        frac.push('0');
    }

    let combined = format!("{int_part}{frac}");
    let magnitude = if combined.is_empty() {
        0
    } else {
        combined
            .parse::<i64>()
            .map_err(|_| CoreError::Overflow(format!("{s} at {decimals} decimals")))?
    };

    Ok(if negative { -magnitude } else { magnitude })
}

fn build_price(ticks: i64, spec: &InstrumentSpec) -> CoreResult<QuantizedPrice> {
    let price_int = ticks
        .checked_mul(spec.tick_int())
        .ok_or_else(|| CoreError::Overflow(format!("{ticks} ticks * {}", spec.tick_int())))?;
    Ok(QuantizedPrice {
        ticks,
        price_int,
        price_str: int_to_decimal_string(price_int, spec.price_decimals),
    })
}

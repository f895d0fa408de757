//! Instrument grid: the exchange's price and size increments.
//!
//! Tick and lot sizes come from the exchange client. Everything the
//! quantizer needs (decimal counts, integer tick/lot units) is derived once
//! here so that a bad spec fails closed at construction instead of producing
//! a mispriced order later.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::{Price, Size};

/// Upper bound for derived decimal counts (overflow protection for `10^n`).
pub const MAX_DECIMALS: u32 = 18;

/// Exchange grid for a single instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrumentSpec {
    /// Minimum price increment.
    pub tick_size: Price,
    /// Minimum size increment.
    pub lot_size: Size,
    /// Decimal places used for price strings.
    pub price_decimals: u32,
    /// Decimal places used for size strings.
    pub size_decimals: u32,
    /// Minimum order notional accepted by the exchange (USD).
    pub min_notional_usd: Decimal,
    /// Tick size expressed in units of `10^-price_decimals`.
    tick_int: i64,
    /// Lot size expressed in units of `10^-size_decimals`.
    lot_int: i64,
}

impl InstrumentSpec {
    /// Build a spec from tick and lot sizes.
    ///
    /// Fails when either size is non-positive or needs more than
    /// `MAX_DECIMALS` decimal places.
    pub fn new(tick_size: Decimal, lot_size: Decimal) -> CoreResult<Self> {
        let price_decimals = grid_decimals("tick_size", tick_size)?;
        let size_decimals = grid_decimals("lot_size", lot_size)?;
        let tick_int = scaled_int("tick_size", tick_size, price_decimals)?;
        let lot_int = scaled_int("lot_size", lot_size, size_decimals)?;

        Ok(Self {
            tick_size: Price::new(tick_size),
            lot_size: Size::new(lot_size),
            price_decimals,
            size_decimals,
            min_notional_usd: Decimal::ZERO,
            tick_int,
            lot_int,
        })
    }

    /// Parse tick and lot sizes from exchange strings.
    pub fn from_strs(tick_size: &str, lot_size: &str) -> CoreResult<Self> {
        Self::new(tick_size.trim().parse()?, lot_size.trim().parse()?)
    }

    pub fn with_min_notional(mut self, min_notional_usd: Decimal) -> Self {
        self.min_notional_usd = min_notional_usd;
        self
    }

    #[inline]
    pub fn tick_int(&self) -> i64 {
        self.tick_int
    }

    #[inline]
    pub fn lot_int(&self) -> i64 {
        self.lot_int
    }

    /// `10^price_decimals`.
    #[inline]
    pub fn tick_multiplier(&self) -> i64 {
        pow10(self.price_decimals)
    }

    /// `10^size_decimals`.
    #[inline]
    pub fn step_multiplier(&self) -> i64 {
        pow10(self.size_decimals)
    }

    /// Check if the grid has materially changed (requires requoting from scratch).
    pub fn has_material_change(&self, other: &Self) -> bool {
        self.tick_size != other.tick_size
            || self.lot_size != other.lot_size
            || self.min_notional_usd != other.min_notional_usd
    }
}

#[inline]
pub(crate) fn pow10(decimals: u32) -> i64 {
    10i64.pow(decimals.min(MAX_DECIMALS))
}

/// Decimal places for a grid size: `-floor(log10(size))`, clamped at zero,
/// widened to the size's own scale when it carries more fractional digits
/// (0.025 needs 3 places even though `-floor(log10(0.025)) = 2`).
fn grid_decimals(field: &str, size: Decimal) -> CoreResult<u32> {
    if size <= Decimal::ZERO {
        return Err(CoreError::InvalidSpec(format!(
            "{field} must be > 0 (got {size})"
        )));
    }

    let normalized = size.normalize();
    let scale = normalized.scale();
    let digits = normalized.mantissa().unsigned_abs().to_string().len() as i64;
    let floor_log10 = digits - 1 - i64::from(scale);
    let from_log = (-floor_log10).max(0) as u32;
    let decimals = from_log.max(scale);

    if decimals > MAX_DECIMALS {
        return Err(CoreError::InvalidSpec(format!(
            "{field} {size} needs {decimals} decimals (max {MAX_DECIMALS})"
        )));
    }
    Ok(decimals)
}

fn scaled_int(field: &str, size: Decimal, decimals: u32) -> CoreResult<i64> {
    let scaled = size * Decimal::from(pow10(decimals));
    if !scaled.fract().is_zero() {
        return Err(CoreError::InvalidSpec(format!(
            "{field} {size} is not representable with {decimals} decimals"
        )));
    }
    scaled
        .to_i64()
        .filter(|v| *v > 0)
        .ok_or_else(|| CoreError::Overflow(format!("{field} {size} at {decimals} decimals")))
}

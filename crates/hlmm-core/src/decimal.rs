//! Precision-safe decimal types for quoting.
//!
//! Uses `rust_decimal` for exact decimal arithmetic. Values that arrive as
//! `f64` from outside the core are converted once, at the boundary, through
//! the `from_f64_checked` constructors so that NaN or infinity can never
//! reach a quote.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

/// Basis-point divisor.
pub const BPS: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Price with exact decimal precision.
///
/// Wraps `Decimal` to provide type safety and prevent mixing
/// prices with sizes in calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Convert an external `f64` price, rejecting non-finite and non-positive values.
    pub fn from_f64_checked(value: f64) -> CoreResult<Self> {
        if !value.is_finite() {
            return Err(CoreError::NonFinite {
                field: "price",
                value,
            });
        }
        if value <= 0.0 {
            return Err(CoreError::InvalidPrice(format!("{value} is not positive")));
        }
        Decimal::from_f64_retain(value)
            .map(Self)
            .ok_or_else(|| CoreError::InvalidPrice(format!("{value} is out of decimal range")))
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Calculate basis points difference from another price.
    #[inline]
    pub fn bps_from(&self, other: Price) -> Option<Decimal> {
        if other.is_zero() {
            return None;
        }
        Some((self.0 - other.0) / other.0 * BPS)
    }

    /// Price offset from `self` by `bps`, negative moves down.
    #[inline]
    pub fn offset_bps(&self, bps: Decimal) -> Self {
        Self(self.0 * (Decimal::ONE + bps / BPS))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Size/quantity with exact decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Size(pub Decimal);

impl Size {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Convert an external `f64` size, rejecting non-finite and negative values.
    pub fn from_f64_checked(value: f64) -> CoreResult<Self> {
        if !value.is_finite() {
            return Err(CoreError::NonFinite {
                field: "size",
                value,
            });
        }
        if value < 0.0 {
            return Err(CoreError::InvalidSize(format!("{value} is negative")));
        }
        Decimal::from_f64_retain(value)
            .map(Self)
            .ok_or_else(|| CoreError::InvalidSize(format!("{value} is out of decimal range")))
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Size in coins for a USD notional at `price`.
    ///
    /// Zero when the price is zero or the quotient leaves decimal range.
    pub fn from_notional(notional_usd: Decimal, price: Price) -> Self {
        notional_usd
            .checked_div(price.0)
            .map(Self)
            .unwrap_or(Self::ZERO)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

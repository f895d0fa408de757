//! Inventory snapshot for spread skew.
//!
//! The position itself is owned by the exchange client. The caller hands
//! in a fresh snapshot every tick and the quote path only reads it.

use hlmm_core::{OrderSide, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Current position for a single pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InventoryState {
    /// Net position size in coins (positive = long, negative = short).
    pub position_size: Decimal,
    /// Absolute position notional in USD.
    pub notional_usd: Decimal,
}

impl InventoryState {
    /// Flat inventory.
    pub fn flat() -> Self {
        Self::default()
    }

    /// Build from a signed size marked at `mark_px`.
    pub fn from_position(position_size: Decimal, mark_px: Price) -> Self {
        Self {
            position_size,
            notional_usd: (position_size * mark_px.inner()).abs(),
        }
    }

    /// Side the position is on, `None` when flat.
    pub fn side(&self) -> Option<OrderSide> {
        if self.position_size > Decimal::ZERO {
            Some(OrderSide::Buy)
        } else if self.position_size < Decimal::ZERO {
            Some(OrderSide::Sell)
        } else {
            None
        }
    }

    /// Signed notional over `max_inventory_usd`, clamped to `[-1, 1]`.
    pub fn inventory_ratio(&self, max_inventory_usd: Decimal) -> Decimal {
        if max_inventory_usd <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let ratio = self.notional_usd / max_inventory_usd;
        let signed = match self.side() {
            Some(OrderSide::Buy) => ratio,
            Some(OrderSide::Sell) => -ratio,
            None => return Decimal::ZERO,
        };
        signed.clamp(Decimal::NEGATIVE_ONE, Decimal::ONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_inventory_ratio_long_and_short() {
        let mark = Price::new(dec!(100));
        let long = InventoryState::from_position(dec!(6), mark);
        assert_eq!(long.notional_usd, dec!(600));
        assert_eq!(long.side(), Some(OrderSide::Buy));
        assert_eq!(long.inventory_ratio(dec!(1000)), dec!(0.6));

        let short = InventoryState::from_position(dec!(-6), mark);
        assert_eq!(short.inventory_ratio(dec!(1000)), dec!(-0.6));
    }

    #[test]
    fn test_inventory_ratio_clamped() {
        let state = InventoryState::from_position(dec!(50), Price::new(dec!(100)));
        assert_eq!(state.inventory_ratio(dec!(1000)), dec!(1));
        assert_eq!(state.inventory_ratio(dec!(0)), dec!(0));
        assert_eq!(InventoryState::flat().inventory_ratio(dec!(1000)), dec!(0));
    }
}

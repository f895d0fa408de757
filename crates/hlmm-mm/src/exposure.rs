//! Per-pair, per-side resting exposure.
//!
//! Counts the USD notional of accepted orders so the sizer can cap how much
//! liquidity one side of a pair may offer. The caller records an order when
//! the exchange accepts it and releases it on cancel or fill.

use dashmap::DashMap;
use hlmm_core::OrderSide;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

/// Cumulative notional on both sides of one pair (USD).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SideExposure {
    pub buy: Decimal,
    pub sell: Decimal,
}

impl SideExposure {
    pub fn get(&self, side: OrderSide) -> Decimal {
        match side {
            OrderSide::Buy => self.buy,
            OrderSide::Sell => self.sell,
        }
    }

    fn slot_mut(&mut self, side: OrderSide) -> &mut Decimal {
        match side {
            OrderSide::Buy => &mut self.buy,
            OrderSide::Sell => &mut self.sell,
        }
    }
}

/// Concurrent exposure counters keyed by pair.
#[derive(Debug, Default)]
pub struct ExposureTracker {
    exposure: DashMap<String, SideExposure>,
}

impl ExposureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current exposure on one side. Unknown pairs are zero.
    pub fn get_exposure(&self, pair: &str, side: OrderSide) -> Decimal {
        self.exposure
            .get(pair)
            .map(|e| e.get(side))
            .unwrap_or(Decimal::ZERO)
    }

    /// Both sides for a pair.
    pub fn snapshot(&self, pair: &str) -> SideExposure {
        self.exposure.get(pair).map(|e| *e).unwrap_or_default()
    }

    /// Record an accepted order. Non-positive amounts are ignored.
    ///
    /// Returns the new exposure on that side.
    pub fn add_exposure(&self, pair: &str, side: OrderSide, amount_usd: Decimal) -> Decimal {
        if amount_usd <= Decimal::ZERO {
            return self.get_exposure(pair, side);
        }
        let mut entry = self.exposure.entry(pair.to_string()).or_default();
        let slot = entry.slot_mut(side);
        *slot += amount_usd;
        debug!(pair, %side, amount_usd = %amount_usd, total = %*slot, "Exposure added");
        *slot
    }

    /// Release exposure after a cancel or fill, saturating at zero.
    pub fn release_exposure(&self, pair: &str, side: OrderSide, amount_usd: Decimal) -> Decimal {
        if amount_usd <= Decimal::ZERO {
            return self.get_exposure(pair, side);
        }
        match self.exposure.get_mut(pair) {
            Some(mut entry) => {
                let slot = entry.slot_mut(side);
                *slot = (*slot - amount_usd).max(Decimal::ZERO);
                debug!(pair, %side, amount_usd = %amount_usd, total = %*slot, "Exposure released");
                *slot
            }
            None => Decimal::ZERO,
        }
    }

    /// Reset one pair, or every pair when `pair` is `None`.
    pub fn reset(&self, pair: Option<&str>) {
        match pair {
            Some(p) => {
                self.exposure.remove(p);
            }
            None => self.exposure.clear(),
        }
    }

    /// Number of pairs with recorded exposure.
    pub fn pair_count(&self) -> usize {
        self.exposure.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    #[test]
    fn test_add_and_get() {
        let tracker = ExposureTracker::new();
        assert_eq!(tracker.get_exposure("ZEC-PERP", OrderSide::Buy), dec!(0));

        tracker.add_exposure("ZEC-PERP", OrderSide::Buy, dec!(100));
        let total = tracker.add_exposure("ZEC-PERP", OrderSide::Buy, dec!(125));
        assert_eq!(total, dec!(225));
        assert_eq!(tracker.get_exposure("ZEC-PERP", OrderSide::Sell), dec!(0));
        assert_eq!(
            tracker.snapshot("ZEC-PERP"),
            SideExposure {
                buy: dec!(225),
                sell: dec!(0)
            }
        );
    }

    #[test]
    fn test_non_positive_amounts_ignored() {
        let tracker = ExposureTracker::new();
        tracker.add_exposure("UNI", OrderSide::Sell, dec!(-50));
        tracker.add_exposure("UNI", OrderSide::Sell, dec!(0));
        assert_eq!(tracker.get_exposure("UNI", OrderSide::Sell), dec!(0));
        assert_eq!(tracker.pair_count(), 0);
    }

    #[test]
    fn test_release_saturates() {
        let tracker = ExposureTracker::new();
        tracker.add_exposure("UNI", OrderSide::Sell, dec!(80));
        assert_eq!(tracker.release_exposure("UNI", OrderSide::Sell, dec!(30)), dec!(50));
        assert_eq!(tracker.release_exposure("UNI", OrderSide::Sell, dec!(500)), dec!(0));
        assert_eq!(tracker.release_exposure("NOPE", OrderSide::Buy, dec!(1)), dec!(0));
    }

    #[test]
    fn test_reset_single_and_all() {
        let tracker = ExposureTracker::new();
        tracker.add_exposure("A", OrderSide::Buy, dec!(1));
        tracker.add_exposure("B", OrderSide::Buy, dec!(2));

        tracker.reset(Some("A"));
        assert_eq!(tracker.get_exposure("A", OrderSide::Buy), dec!(0));
        assert_eq!(tracker.get_exposure("B", OrderSide::Buy), dec!(2));

        tracker.reset(None);
        assert_eq!(tracker.pair_count(), 0);
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let tracker = Arc::new(ExposureTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        t.add_exposure("ZEC", OrderSide::Buy, dec!(1));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(tracker.get_exposure("ZEC", OrderSide::Buy), dec!(800));
    }
}

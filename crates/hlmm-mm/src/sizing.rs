//! Institutional clip sizing.
//!
//! Pairs with a configured override get a geometric clip ladder:
//! `base_clip × multiplier^layer`, capped by what is left of the pair's
//! per-side exposure budget.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::trace;

use crate::config::{default_layer_multiplier, PairSizing};

/// Result of a clip calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClipSizing {
    /// Clip notional for this layer (USD).
    pub size_usd: Decimal,
    /// True when the exposure budget limited the clip.
    pub capped_by_exposure: bool,
    /// Budget left on the side before this clip (USD, may be negative).
    pub remaining_usd: Decimal,
    pub reason: Option<String>,
}

/// Sizes clips for pairs with an institutional override.
#[derive(Debug, Clone)]
pub struct InstitutionalSizer {
    pairs: HashMap<String, PairSizing>,
    layer_multiplier: Decimal,
}

impl Default for InstitutionalSizer {
    fn default() -> Self {
        Self::new(HashMap::new(), default_layer_multiplier())
    }
}

impl InstitutionalSizer {
    pub fn new(pairs: HashMap<String, PairSizing>, layer_multiplier: Decimal) -> Self {
        Self {
            pairs,
            layer_multiplier,
        }
    }

    pub fn layer_multiplier(&self) -> Decimal {
        self.layer_multiplier
    }

    /// Override for a pair, if configured.
    pub fn sizing_for(&self, pair: &str) -> Option<&PairSizing> {
        self.pairs.get(pair)
    }

    /// Compute the clip for `layer` given the side's current exposure.
    ///
    /// Returns `None` when the pair has no override; the caller then uses
    /// its default sizing.
    pub fn calculate_clip(
        &self,
        pair: &str,
        layer: u32,
        current_side_exposure_usd: Decimal,
    ) -> Option<ClipSizing> {
        let sizing = self.pairs.get(pair)?;
        let remaining = sizing.max_exposure_per_side_usd - current_side_exposure_usd;

        if remaining <= Decimal::ZERO {
            trace!(pair, layer, remaining = %remaining, "Clip blocked by exposure cap");
            return Some(ClipSizing {
                size_usd: Decimal::ZERO,
                capped_by_exposure: true,
                remaining_usd: remaining,
                reason: Some(format!(
                    "exposure cap reached ({}/{})",
                    current_side_exposure_usd.round_dp(2),
                    sizing.max_exposure_per_side_usd.round_dp(2)
                )),
            });
        }

        let raw = geometric_clip(sizing.base_clip_usd, self.layer_multiplier, layer, remaining);
        let capped = raw > remaining;
        let size_usd = raw.min(remaining);

        Some(ClipSizing {
            size_usd,
            capped_by_exposure: capped,
            remaining_usd: remaining,
            reason: capped.then(|| {
                format!(
                    "layer {layer} clip capped to remaining exposure {}",
                    remaining.round_dp(2)
                )
            }),
        })
    }
}

/// `base × multiplier^layer`, stopping as soon as a growing clip passes
/// `ceiling` or the product stops changing. Overflow saturates to
/// `Decimal::MAX`, which the caller caps.
fn geometric_clip(base: Decimal, multiplier: Decimal, layer: u32, ceiling: Decimal) -> Decimal {
    let growing = multiplier > Decimal::ONE;
    let mut clip = base;
    for _ in 0..layer {
        if growing && clip > ceiling {
            break;
        }
        match clip.checked_mul(multiplier) {
            Some(next) if next == clip => break,
            Some(next) => clip = next,
            None => return Decimal::MAX,
        }
    }
    clip
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sizer() -> InstitutionalSizer {
        let mut pairs = HashMap::new();
        pairs.insert(
            "ZEC".to_string(),
            PairSizing {
                base_clip_usd: dec!(100),
                max_layers_per_side: 3,
                max_exposure_per_side_usd: dec!(300),
            },
        );
        InstitutionalSizer::new(pairs, dec!(1.25))
    }

    #[test]
    fn test_geometric_growth() {
        let s = sizer();
        let l0 = s.calculate_clip("ZEC", 0, dec!(0)).unwrap();
        let l1 = s.calculate_clip("ZEC", 1, dec!(0)).unwrap();
        let l2 = s.calculate_clip("ZEC", 2, dec!(0)).unwrap();
        assert_eq!(l0.size_usd, dec!(100));
        assert_eq!(l1.size_usd, dec!(125));
        assert_eq!(l2.size_usd, dec!(156.25));
        assert!(!l2.capped_by_exposure);
        assert!(l2.reason.is_none());
    }

    #[test]
    fn test_capped_by_remaining() {
        let s = sizer();
        let clip = s.calculate_clip("ZEC", 2, dec!(225)).unwrap();
        assert_eq!(clip.size_usd, dec!(75));
        assert!(clip.capped_by_exposure);
        assert!(clip.reason.is_some());
    }

    #[test]
    fn test_exposure_cap_reached() {
        let s = sizer();
        let clip = s.calculate_clip("ZEC", 0, dec!(300)).unwrap();
        assert_eq!(clip.size_usd, dec!(0));
        assert!(clip.capped_by_exposure);
        assert_eq!(
            clip.reason.as_deref(),
            Some("exposure cap reached (300/300)")
        );

        let clip = s.calculate_clip("ZEC", 1, dec!(450)).unwrap();
        assert_eq!(clip.size_usd, dec!(0));
        assert_eq!(clip.remaining_usd, dec!(-150));
    }

    #[test]
    fn test_deep_layer_is_capped_not_overflowed() {
        let s = sizer();
        let clip = s.calculate_clip("ZEC", 400, dec!(0)).unwrap();
        assert_eq!(clip.size_usd, dec!(300));
        assert!(clip.capped_by_exposure);
        assert_eq!(
            clip.reason.as_deref(),
            Some("layer 400 clip capped to remaining exposure 300")
        );

        let clip = s.calculate_clip("ZEC", u32::MAX, dec!(299)).unwrap();
        assert_eq!(clip.size_usd, dec!(1));
    }

    #[test]
    fn test_huge_budget_saturates() {
        let mut pairs = HashMap::new();
        pairs.insert(
            "ZEC".to_string(),
            PairSizing {
                base_clip_usd: dec!(100),
                max_layers_per_side: 3,
                max_exposure_per_side_usd: Decimal::MAX,
            },
        );
        let s = InstitutionalSizer::new(pairs, dec!(10));
        let clip = s.calculate_clip("ZEC", 400, dec!(0)).unwrap();
        assert_eq!(clip.size_usd, Decimal::MAX);
        assert!(!clip.capped_by_exposure);
    }

    #[test]
    fn test_flat_and_shrinking_multipliers() {
        let mut pairs = HashMap::new();
        pairs.insert(
            "ZEC".to_string(),
            PairSizing {
                base_clip_usd: dec!(100),
                max_layers_per_side: 3,
                max_exposure_per_side_usd: dec!(1000),
            },
        );
        let flat = InstitutionalSizer::new(pairs.clone(), dec!(1));
        assert_eq!(flat.calculate_clip("ZEC", u32::MAX, dec!(0)).unwrap().size_usd, dec!(100));

        let shrinking = InstitutionalSizer::new(pairs, dec!(0.5));
        assert_eq!(shrinking.calculate_clip("ZEC", 2, dec!(0)).unwrap().size_usd, dec!(25));
        let deep = shrinking.calculate_clip("ZEC", u32::MAX, dec!(0)).unwrap();
        assert!(deep.size_usd < dec!(0.000001));
        assert!(!deep.capped_by_exposure);
    }

    #[test]
    fn test_unknown_pair_has_no_override() {
        assert!(sizer().calculate_clip("UNI", 0, dec!(0)).is_none());
        assert!(InstitutionalSizer::default().sizing_for("ZEC").is_none());
        assert_eq!(InstitutionalSizer::default().layer_multiplier(), dec!(1.25));
    }
}

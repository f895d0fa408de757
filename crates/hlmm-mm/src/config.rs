//! Market making configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Quote construction configuration shared by every pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MmConfig {
    /// Base spread per side in basis points before adjustments.
    #[serde(default = "default_base_spread_bps")]
    pub base_spread_bps: Decimal,

    /// Distance from mid of each grid layer at base spread (bps).
    /// Layer 0 is the innermost.
    #[serde(default = "default_layer_offsets_bps")]
    pub layer_offsets_bps: Vec<Decimal>,

    /// Share of `capital_per_side_usd` given to each layer, in percent.
    /// Only used for pairs without an institutional sizing override.
    #[serde(default = "default_layer_capital_pct")]
    pub layer_capital_pct: Vec<Decimal>,

    /// Number of layers quoted per side. Outer layers are parked.
    #[serde(default = "default_active_layers")]
    pub active_layers: u32,

    /// Capital allocated to one side of one pair when no override exists (USD).
    #[serde(default = "default_capital_per_side_usd")]
    pub capital_per_side_usd: Decimal,

    /// Floor for any layer offset after spread scaling (bps).
    #[serde(default = "default_min_layer_offset_bps")]
    pub min_layer_offset_bps: Decimal,

    /// Position notional at which the inventory ratio saturates (USD).
    #[serde(default = "default_max_inventory_usd")]
    pub max_inventory_usd: Decimal,

    /// Geometric growth of institutional clips per layer.
    #[serde(default = "default_layer_multiplier")]
    pub layer_multiplier: Decimal,
}

impl Default for MmConfig {
    fn default() -> Self {
        Self {
            base_spread_bps: default_base_spread_bps(),
            layer_offsets_bps: default_layer_offsets_bps(),
            layer_capital_pct: default_layer_capital_pct(),
            active_layers: default_active_layers(),
            capital_per_side_usd: default_capital_per_side_usd(),
            min_layer_offset_bps: default_min_layer_offset_bps(),
            max_inventory_usd: default_max_inventory_usd(),
            layer_multiplier: default_layer_multiplier(),
        }
    }
}

impl MmConfig {
    /// Layers actually quoted per side, bounded by the configured offsets.
    pub fn effective_layers(&self) -> usize {
        (self.active_layers as usize).min(self.layer_offsets_bps.len())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_spread_bps <= Decimal::ZERO {
            return Err(format!(
                "base_spread_bps must be > 0 (got {})",
                self.base_spread_bps
            ));
        }
        if self.layer_offsets_bps.is_empty() {
            return Err("layer_offsets_bps must not be empty".to_string());
        }
        if self.layer_offsets_bps.iter().any(|o| *o <= Decimal::ZERO) {
            return Err("layer_offsets_bps must all be > 0".to_string());
        }
        if self.layer_capital_pct.iter().any(|p| *p < Decimal::ZERO) {
            return Err("layer_capital_pct must not be negative".to_string());
        }
        if self.active_layers == 0 {
            return Err("active_layers must be >= 1".to_string());
        }
        if self.max_inventory_usd <= Decimal::ZERO {
            return Err(format!(
                "max_inventory_usd must be > 0 (got {})",
                self.max_inventory_usd
            ));
        }
        if self.layer_multiplier <= Decimal::ZERO {
            return Err(format!(
                "layer_multiplier must be > 0 (got {})",
                self.layer_multiplier
            ));
        }
        Ok(())
    }
}

/// Per-pair institutional sizing override.
///
/// Present only when every field has been configured for the pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PairSizing {
    /// Clip size of layer 0 (USD).
    pub base_clip_usd: Decimal,
    /// Hard cap on layers quoted per side.
    pub max_layers_per_side: u32,
    /// Maximum cumulative notional resting on one side (USD).
    pub max_exposure_per_side_usd: Decimal,
}

impl PairSizing {
    pub fn validate(&self) -> Result<(), String> {
        if self.base_clip_usd <= Decimal::ZERO {
            return Err(format!("base_clip_usd must be > 0 (got {})", self.base_clip_usd));
        }
        if self.max_exposure_per_side_usd < Decimal::ZERO {
            return Err(format!(
                "max_exposure_per_side_usd must be >= 0 (got {})",
                self.max_exposure_per_side_usd
            ));
        }
        Ok(())
    }
}

fn default_base_spread_bps() -> Decimal {
    Decimal::new(20, 0) // 20 bps
}
fn default_layer_offsets_bps() -> Vec<Decimal> {
    [20, 30, 45, 65, 90].into_iter().map(Decimal::from).collect()
}
fn default_layer_capital_pct() -> Vec<Decimal> {
    [25, 30, 25, 15, 5].into_iter().map(Decimal::from).collect()
}
fn default_active_layers() -> u32 {
    3 // L4/L5 parked
}
fn default_capital_per_side_usd() -> Decimal {
    Decimal::new(200, 0)
}
fn default_min_layer_offset_bps() -> Decimal {
    Decimal::TWO
}
fn default_max_inventory_usd() -> Decimal {
    Decimal::new(1000, 0)
}
pub(crate) fn default_layer_multiplier() -> Decimal {
    Decimal::new(125, 2) // 1.25
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = MmConfig::default();
        assert_eq!(config.base_spread_bps, dec!(20));
        assert_eq!(
            config.layer_offsets_bps,
            vec![dec!(20), dec!(30), dec!(45), dec!(65), dec!(90)]
        );
        assert_eq!(config.layer_capital_pct.iter().sum::<Decimal>(), dec!(100));
        assert_eq!(config.active_layers, 3);
        assert_eq!(config.effective_layers(), 3);
        assert_eq!(config.layer_multiplier, dec!(1.25));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serde_defaults() {
        let toml_str = r#"
base_spread_bps = 35
active_layers = 9
"#;
        let config: MmConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.base_spread_bps, dec!(35));
        assert_eq!(config.min_layer_offset_bps, dec!(2));
        // More active layers than offsets falls back to the grid size.
        assert_eq!(config.effective_layers(), 5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = MmConfig {
            active_layers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MmConfig {
            layer_offsets_bps: vec![dec!(20), dec!(0)],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let sizing = PairSizing {
            base_clip_usd: dec!(0),
            max_layers_per_side: 3,
            max_exposure_per_side_usd: dec!(500),
        };
        assert!(sizing.validate().is_err());
    }
}

//! Application configuration.
//!
//! The TOML file carries the quoting and guard settings plus the pair
//! list. Deployment-specific knobs can be overridden from the process
//! environment (see [`AppConfig::apply_env_overrides`]).

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::str::FromStr;

use hlmm_core::InstrumentSpec;
use hlmm_mm::{InstitutionalSizer, MmConfig, PairSizing};
use hlmm_risk::{BehaviourMode, TopGuardConfig};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

/// Env var holding the geometric clip multiplier.
pub const LAYER_MULTIPLIER_ENV: &str = "INSTITUTIONAL_LAYER_MULTIPLIER";
/// Env var selecting the behaviour profile set.
pub const BEHAVIOUR_MODE_ENV: &str = "BEHAVIOURAL_RISK_MODE";

/// Exchange grid for one quoted pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PairConfig {
    /// Pair name as used by the exchange client (e.g. "ZEC-PERP").
    pub name: String,
    pub tick_size: Decimal,
    pub lot_size: Decimal,
    /// Minimum order notional (USD). 0 disables the check.
    #[serde(default)]
    pub min_notional_usd: Decimal,
}

impl PairConfig {
    pub fn instrument_spec(&self) -> AppResult<InstrumentSpec> {
        Ok(InstrumentSpec::new(self.tick_size, self.lot_size)?
            .with_min_notional(self.min_notional_usd))
    }

    /// Env var prefixes to try, in order: the upper-cased name
    /// (`"ZEC-PERP"`), then its shell-safe form (`"ZEC_PERP"`).
    pub fn env_prefixes(&self) -> Vec<String> {
        let upper = self.name.to_ascii_uppercase();
        let safe = env_prefix(&self.name);
        if safe == upper {
            vec![upper]
        } else {
            vec![upper, safe]
        }
    }
}

/// Shell-safe env var prefix for a pair: `"zec-perp"` → `"ZEC_PERP"`.
pub fn env_prefix(pair: &str) -> String {
    pair.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub behaviour_mode: BehaviourMode,

    #[serde(default)]
    pub mm: MmConfig,

    #[serde(default)]
    pub top_guard: TopGuardConfig,

    #[serde(default)]
    pub pairs: Vec<PairConfig>,

    /// Institutional sizing overrides keyed by pair name.
    #[serde(default)]
    pub pair_sizing: HashMap<String, PairSizing>,
}

impl AppConfig {
    /// Load configuration from file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load from file, apply env overrides from `lookup`, then validate.
    pub fn load<F>(path: &str, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides.
    ///
    /// Per pair, `{PAIR}_BASE_CLIP_USD`, `{PAIR}_MAX_LAYERS_PER_SIDE` and
    /// `{PAIR}_MAX_EXPOSURE_PER_SIDE_USD` replace the pair's sizing override,
    /// but only when all three are set. `{PAIR}` is tried as the upper-cased
    /// name first, then with non-alphanumerics turned into `_`; the first
    /// prefix with any key set is used. Guard thresholds use the flat keys
    /// (`ANTI_TOP_PUMP_ENABLED`, `ANTI_TOP_PUMP_RET1M`, ...), returns as
    /// fractions.
    ///
    /// Empty values count as unset. Unparseable values are an error.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(multiplier) = parse_env::<Decimal, _>(&lookup, LAYER_MULTIPLIER_ENV)? {
            self.mm.layer_multiplier = multiplier;
        }

        if let Some(raw) = env_value(&lookup, BEHAVIOUR_MODE_ENV) {
            self.behaviour_mode = match raw.to_ascii_lowercase().as_str() {
                "normal" => BehaviourMode::Normal,
                "aggressive" => BehaviourMode::Aggressive,
                other => {
                    return Err(AppError::Config(format!(
                        "{BEHAVIOUR_MODE_ENV}: unknown mode {other:?}"
                    )))
                }
            };
        }

        self.apply_top_guard_env(&lookup)?;

        let pairs: Vec<(String, Vec<String>)> = self
            .pairs
            .iter()
            .map(|p| (p.name.clone(), p.env_prefixes()))
            .collect();
        for (name, prefixes) in pairs {
            for prefix in prefixes {
                if self.apply_pair_sizing_env(&lookup, &name, &prefix)? {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Returns true when any sizing key under `prefix` was present.
    fn apply_pair_sizing_env<F>(&mut self, lookup: &F, pair: &str, prefix: &str) -> AppResult<bool>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = parse_env::<Decimal, _>(lookup, &format!("{prefix}_BASE_CLIP_USD"))?;
        let layers = parse_env::<u32, _>(lookup, &format!("{prefix}_MAX_LAYERS_PER_SIDE"))?;
        let cap = parse_env::<Decimal, _>(lookup, &format!("{prefix}_MAX_EXPOSURE_PER_SIDE_USD"))?;

        match (base, layers, cap) {
            (Some(base_clip_usd), Some(max_layers_per_side), Some(max_exposure_per_side_usd)) => {
                debug!(
                    pair,
                    prefix,
                    base_clip_usd = %base_clip_usd,
                    max_layers_per_side,
                    max_exposure_per_side_usd = %max_exposure_per_side_usd,
                    "Institutional sizing from env"
                );
                self.pair_sizing.insert(
                    pair.to_string(),
                    PairSizing {
                        base_clip_usd,
                        max_layers_per_side,
                        max_exposure_per_side_usd,
                    },
                );
                Ok(true)
            }
            (None, None, None) => Ok(false),
            _ => {
                warn!(pair, prefix, "Incomplete institutional sizing env, ignoring");
                Ok(true)
            }
        }
    }

    fn apply_top_guard_env<F>(&mut self, lookup: &F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let guard = &mut self.top_guard;

        if let Some(v) = parse_bool_env(lookup, "ANTI_TOP_PUMP_ENABLED")? {
            guard.pump_enabled = v;
        }
        if let Some(v) = parse_env::<f64, _>(lookup, "ANTI_TOP_PUMP_RET1M")? {
            guard.pump_ret_1m = v;
        }
        if let Some(v) = parse_env::<f64, _>(lookup, "ANTI_TOP_PUMP_RET5M")? {
            guard.pump_ret_5m = v;
        }
        if let Some(v) = parse_bool_env(lookup, "RSI_TOP_GUARD_ENABLED")? {
            guard.rsi_enabled = v;
        }
        if let Some(v) = parse_env::<f64, _>(lookup, "RSI_OVERBOUGHT")? {
            guard.rsi_overbought = v;
        }
        if let Some(v) = parse_env::<f64, _>(lookup, "TOP_HIGH_DISTANCE_BPS")? {
            guard.rsi_high_distance_bps = v;
        }
        if let Some(v) = parse_bool_env(lookup, "FOMO_GUARD_ENABLED")? {
            guard.crowd_enabled = v;
        }
        if let Some(v) = parse_env::<f64, _>(lookup, "FOMO_VOLUME_ZSCORE")? {
            guard.crowd_volume_zscore = v;
        }
        if let Some(v) = parse_env::<f64, _>(lookup, "FOMO_HIGH_DISTANCE_BPS")? {
            guard.crowd_high_distance_bps = v;
        }
        Ok(())
    }

    /// Validate the resolved configuration.
    pub fn validate(&self) -> AppResult<()> {
        self.mm
            .validate()
            .map_err(|e| AppError::Config(format!("mm: {e}")))?;
        self.top_guard
            .validate()
            .map_err(|e| AppError::Config(format!("top_guard: {e}")))?;

        let mut seen = HashSet::new();
        for pair in &self.pairs {
            if pair.name.trim().is_empty() {
                return Err(AppError::Config("pair name must not be empty".to_string()));
            }
            if !seen.insert(pair.name.as_str()) {
                return Err(AppError::Config(format!("duplicate pair {}", pair.name)));
            }
            pair.instrument_spec()?;
        }

        for (name, sizing) in &self.pair_sizing {
            sizing
                .validate()
                .map_err(|e| AppError::Config(format!("pair_sizing.{name}: {e}")))?;
            if !seen.contains(name.as_str()) {
                warn!(pair = %name, "Sizing override for a pair that is not quoted");
            }
        }

        Ok(())
    }

    pub fn pair(&self, name: &str) -> Option<&PairConfig> {
        self.pairs.iter().find(|p| p.name == name)
    }

    /// Sizer built from the resolved overrides.
    pub fn sizer(&self) -> InstitutionalSizer {
        InstitutionalSizer::new(self.pair_sizing.clone(), self.mm.layer_multiplier)
    }
}

fn env_value<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T, F>(lookup: &F, key: &str) -> AppResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    env_value(lookup, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| AppError::Config(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}

fn parse_bool_env<F>(lookup: &F, key: &str) -> AppResult<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    env_value(lookup, key)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(AppError::Config(format!("{key}={raw:?}: expected a boolean"))),
        })
        .transpose()
}

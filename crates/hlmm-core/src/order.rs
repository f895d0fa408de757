//! Order side and maker intent.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side: buy (bid) or sell (ask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// How a resting order should be treated by the exchange.
///
/// ALO (add-liquidity-only) orders are rejected when they would cross,
/// so quantization floors their price and drops one more tick when it
/// lands exactly on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MakerIntent {
    #[default]
    Alo,
    Gtc,
}

impl fmt::Display for MakerIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alo => write!(f, "Alo"),
            Self::Gtc => write!(f, "Gtc"),
        }
    }
}

//! Market making quote construction for hlmm.
//!
//! Provides the pieces that turn a mid price and inventory into layered
//! resting quotes:
//! - Asymmetric per-side spread (inventory, trend, vision, flash crash)
//! - Layer grid around mid scaled by the side spreads
//! - Institutional clip sizing with per-side exposure caps
//!
//! # Architecture
//!
//! ```text
//! InventoryState ─┐
//! trend / vision ─┼─ compute_side_spread() → SideSpread
//!                 │
//! SideSpread ─────┼─ build_layers() → Vec<LayerQuote> (per side)
//!                 │       └─ InstitutionalSizer.calculate_clip()
//! ExposureTracker ┘              (current side exposure)
//! ```

pub mod config;
pub mod exposure;
pub mod inventory;
pub mod layers;
pub mod sizing;
pub mod spread;

pub use config::{MmConfig, PairSizing};
pub use exposure::{ExposureTracker, SideExposure};
pub use inventory::InventoryState;
pub use layers::{build_layers, LayerRequest};
pub use sizing::{ClipSizing, InstitutionalSizer};
pub use spread::{
    compute_side_spread, SideSpread, SpreadBreakdown, SpreadInputs, Trend, VisionInputs,
    VisualTrend,
};

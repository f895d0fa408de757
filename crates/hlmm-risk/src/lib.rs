//! Buy-side risk gating for hlmm.
//!
//! Two independent guards decide whether new buy liquidity may be placed:
//! - `TopGuardEvaluator`: cheap circuit breaker near local highs, fed by
//!   the rolling `MetricsStore`
//! - `BehaviouralRiskFilter`: per-token FOMO/knife profiles that reshape or
//!   suppress buy layers
//!
//! Neither guard touches sell layers.

pub mod behaviour;
pub mod error;
pub mod metrics;
pub mod top_guard;

pub use behaviour::{
    token_of, BehaviourInput, BehaviourMode, BehaviourProfile, BehaviourProfiles,
    BehaviouralRiskFilter, FilterOutcome,
};
pub use error::{RiskError, RiskResult};
pub use metrics::{MarketSnapshot, MetricsStore};
pub use top_guard::{TopGuardConfig, TopGuardDecision, TopGuardEvaluator, TopGuardRule};

//! hlmm market maker application.
//!
//! Wires the quoting crates together:
//! - Typed configuration with per-pair env overrides
//! - `QuotePipeline`: metrics → guards → spread → layers → quantization
//!
//! Order submission and market data stay with the exchange client.

pub mod config;
pub mod error;
pub mod pipeline;

pub use config::{env_prefix, AppConfig, PairConfig};
pub use error::{AppError, AppResult};
pub use pipeline::{QuotePipeline, QuotePlan, RiskVerdict, TickInput, TickOutcome};

//! Prometheus metrics and structured logging for hlmm.
//!
//! - Structured logging with tracing (JSON in production)
//! - Prometheus counters/gauges for quote decisions and guard blocks

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{gather_text, Metrics};

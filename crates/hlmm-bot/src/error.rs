//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] hlmm_core::CoreError),

    #[error("Risk error: {0}")]
    Risk(#[from] hlmm_risk::RiskError),
}

impl AppError {
    /// Short label for metrics and skip reasons.
    pub fn kind(&self) -> &'static str {
        use hlmm_core::CoreError;
        use hlmm_risk::RiskError;

        match self {
            Self::Config(_) => "config",
            Self::Core(CoreError::InvalidSpec(_)) => "invalid_spec",
            Self::Core(CoreError::Overflow(_)) => "overflow",
            Self::Core(_) => "invalid_input",
            Self::Risk(RiskError::TimeRegression { .. }) => "time_regression",
            Self::Risk(RiskError::InvalidInput { .. }) => "invalid_input",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

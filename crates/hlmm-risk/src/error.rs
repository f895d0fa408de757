//! Risk error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Invalid input: {field} = {value}")]
    InvalidInput { field: &'static str, value: String },

    #[error("Time regression for {symbol}: {now_ms} < {last_ms}")]
    TimeRegression {
        symbol: String,
        now_ms: u64,
        last_ms: u64,
    },
}

impl RiskError {
    pub(crate) fn invalid(field: &'static str, value: impl ToString) -> Self {
        Self::InvalidInput {
            field,
            value: value.to_string(),
        }
    }
}

pub type RiskResult<T> = Result<T, RiskError>;

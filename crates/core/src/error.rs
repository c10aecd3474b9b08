//! Errors raised by the pure game rules.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// A deterministic failure: bad input to a rule, or a rule that cannot hold.
///
/// Game-rule rejections a player can trigger live in `dbtc_game::JobError`; storage
/// and transport failures live in the infra crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Rejected configuration or input, e.g. an inverted payout range.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A computed value fell outside what the model can represent.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}

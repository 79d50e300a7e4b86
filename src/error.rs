use thiserror::Error;

use crate::chain::ChainError;

/// Failures surfaced by the migration core.
///
/// Every variant leaves the session in its pre-attempt shape with `busy`
/// cleared; the caller may simply retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    /// The wallet handshake could not complete.
    #[error("wallet connection failed: {0}")]
    ConnectionFailed(ChainError),

    /// A balance or allowance query errored.
    #[error("chain read failed: {0}")]
    ReadFailed(ChainError),

    /// A transaction was rejected, reverted, or the user declined signing.
    #[error("transaction failed: {0}")]
    WriteFailed(ChainError),
}

impl MigrationError {
    /// Underlying transport error.
    pub fn source_error(&self) -> &ChainError {
        match self {
            MigrationError::ConnectionFailed(e)
            | MigrationError::ReadFailed(e)
            | MigrationError::WriteFailed(e) => e,
        }
    }
}

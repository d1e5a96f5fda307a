use hf_common::error::DomainError;
use thiserror::Error;

use crate::multicall::MulticallError;

/// Failures that abort a snapshot run.
///
/// Individual sub-call failures inside a batch never end up here: they are
/// defaulted where the batch is decoded.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Missing address: provide a wallet address or set MY_ADDRESS")]
    MissingAddress,
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),
    #[error("Unable to connect to RPC endpoint: {0}")]
    Connection(String),
    #[error("Batch call failed: {0}")]
    Multicall(#[from] MulticallError),
    #[error("Failed to read {what}: {reason}")]
    Bootstrap { what: &'static str, reason: String },
    #[error("Failed to read user account data: {0}")]
    AccountData(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl SnapshotError {
    pub fn bootstrap(what: &'static str, reason: impl ToString) -> Self {
        Self::Bootstrap {
            what,
            reason: reason.to_string(),
        }
    }
}

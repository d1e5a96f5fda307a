use thiserror::Error;

// Invariant violations detected while rendering the snapshot
// A balance, cap or supply can never be negative: if one is, the run must stop
// instead of emitting a corrupted document
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Unsigned integer cannot be negative: {0}")]
    NegativeUint(String),
}

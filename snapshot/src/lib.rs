//! Aave v3 health factor snapshot of a single wallet on Base.
//!
//! A run resolves the reserve list in one aggregated call, the user legs in
//! a second one, reads the pool account summary and renders everything into
//! a [`hf_common::snapshot::Snapshot`].

pub mod account;
pub mod assembler;
pub mod config;
pub mod contracts;
pub mod engine;
pub mod error;
pub mod multicall;
pub mod positions;
pub mod protocol;
pub mod reserves;
pub mod risk;
pub mod rpc_client;

pub use config::{ResolvedRequest, SnapshotRequest, ValidatedConfig};
pub use engine::{check_chain_id, connect, run, run_resolved, SnapshotEngine};
pub use error::SnapshotError;

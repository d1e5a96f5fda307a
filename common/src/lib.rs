//! Shared building blocks for the Aave v3 health factor snapshot.
//!
//! Nothing in this crate touches the network: it holds the protocol
//! constants, the packed reserve configuration decoder, the exact decimal
//! layer used for every financial quantity and the output schema.

pub mod config;
pub mod decimal;
pub mod error;
pub mod logger;
pub mod reserve_config;
pub mod snapshot;
pub mod time;

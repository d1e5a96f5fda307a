use alloy_primitives::{address, Address};

pub const VERSION: &str = env!("BUILD_VERSION");

// Version of the snapshot document layout, reported in `meta.version`
// It must follow the published JSON schema, not the crate version
pub const SNAPSHOT_SCHEMA_VERSION: &str = "2.1.2";

// Network identity
pub const NETWORK_NAME: &str = "base";
pub const CHAIN_ID: u64 = 8453;

// Aave v3 Pool on Base
pub const POOL_ADDRESS: Address = address!("A238Dd80C259a72e81d7e4664a9801593F98d1c5");
// Multicall3 is deployed at the same address on every EVM chain
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

pub const DATA_PROVIDER: &str = "aave-v3";
pub const ORACLE_SOURCE: &str = "aave-oracle";

// Scaling exponents used by the protocol
// Rates are expressed in ray (10^27)
pub const RAY_DECIMALS: u32 = 27;
// Health factor is expressed in wad (10^18)
pub const WAD_DECIMALS: u32 = 18;
// LTV, liquidation threshold and bonus are in basis points
pub const BPS_DECIMALS: u32 = 4;

// Oracle base currency unit used when BASE_CURRENCY_UNIT() is unreadable
// USD with 8 decimals
pub const DEFAULT_BASE_CURRENCY_DECIMALS: u32 = 8;

// Token decimals used when neither the configuration nor decimals() provide it
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

// Symbol reported for the base currency section
pub const BASE_CURRENCY_SYMBOL: &str = "ETH";
// Symbols (upper case) identifying the wrapped native asset reserve
pub const NATIVE_ASSET_ALIASES: [&str; 3] = ["WETH", "WETH.E", "WETH9"];

// Symbol with a higher static oracle confidence
pub const HIGH_CONFIDENCE_SYMBOL: &str = "USDC";

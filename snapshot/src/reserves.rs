//! First read phase: one batch with the configuration, price, caps, price
//! feed and metadata of every listed reserve.

use alloy_primitives::{Address, U256};
use bigdecimal::BigDecimal;
use hf_common::{
    config::{DEFAULT_TOKEN_DECIMALS, RAY_DECIMALS, UNKNOWN_SYMBOL},
    decimal::{from_u256, ten_pow, DecimalContext},
    reserve_config::{decode_config, ReserveConfig},
};
use log::{debug, warn};

use crate::{
    contracts::{IAaveOracle, IERC20Metadata, IPool, IPoolConfigurator},
    multicall::{BatchBuilder, BatchResults, CallDecodeError, Handle, Multicall, MulticallError},
    protocol::ProtocolAddresses,
    rpc_client::EthCall,
};

/// Sub-calls issued per reserve in the first phase
pub const RESERVE_CALL_STRIDE: usize = 6;

/// A reserve whose primary data was read successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct Reserve {
    pub address: Address,
    pub symbol: String,
    // Configuration decimals when set, decimals() otherwise
    pub decimals: u8,
    pub config: ReserveConfig,
    // Already descaled from ray
    pub variable_borrow_rate: BigDecimal,
    pub stable_borrow_rate: BigDecimal,
    // USD price: oracle price divided by the base currency unit
    pub price: BigDecimal,
    pub borrow_cap: U256,
    pub supply_cap: U256,
    pub a_token: Address,
    pub stable_debt_token: Address,
    pub variable_debt_token: Address,
    pub price_feed: Address,
}

/// Outcome of the first phase for one listed reserve
#[derive(Debug, Clone, PartialEq)]
pub struct ReserveEntry {
    pub asset: Address,
    // None when the reserve data call failed
    pub reserve: Option<Reserve>,
}

/// First phase result, in reserve list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedReserves {
    pub entries: Vec<ReserveEntry>,
}

impl ResolvedReserves {
    /// Reserves that survived the first phase
    pub fn resolved(&self) -> impl Iterator<Item = &Reserve> {
        self.entries.iter().filter_map(|entry| entry.reserve.as_ref())
    }

    pub fn listed_count(&self) -> usize {
        self.entries.len()
    }

    pub fn dropped_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.reserve.is_none()).count()
    }
}

struct ReserveCalls {
    reserve_data: Handle<IPool::getReserveDataCall>,
    price: Handle<IAaveOracle::getAssetPriceCall>,
    caps: Handle<IPoolConfigurator::getReserveCapsCall>,
    source: Handle<IAaveOracle::getSourceOfAssetCall>,
    symbol: Handle<IERC20Metadata::symbolCall>,
    decimals: Handle<IERC20Metadata::decimalsCall>,
}

impl ReserveCalls {
    // Always pushes exactly RESERVE_CALL_STRIDE slots
    fn push(batch: &mut BatchBuilder, protocol: &ProtocolAddresses, asset: Address) -> Self {
        Self {
            reserve_data: batch.push(protocol.pool, &IPool::getReserveDataCall { asset }),
            price: batch.push(protocol.oracle, &IAaveOracle::getAssetPriceCall { asset }),
            caps: batch.push(protocol.configurator, &IPoolConfigurator::getReserveCapsCall { asset }),
            source: batch.push(protocol.oracle, &IAaveOracle::getSourceOfAssetCall { asset }),
            symbol: batch.push(asset, &IERC20Metadata::symbolCall {}),
            decimals: batch.push(asset, &IERC20Metadata::decimalsCall {}),
        }
    }

    fn decode(
        &self,
        results: &BatchResults,
        asset: Address,
        base_unit: &BigDecimal,
        ctx: &DecimalContext,
    ) -> Option<Reserve> {
        let data = match results.decode(&self.reserve_data) {
            Ok(data) => data,
            Err(e) => {
                warn!("Dropping reserve {}: reserve data unavailable ({})", asset, e);
                return None;
            }
        };

        let price = results
            .decode(&self.price)
            .map(|r| r._0)
            .unwrap_or_else(|e| defaulted(asset, "price", e, U256::ZERO));
        let (borrow_cap, supply_cap) = results
            .decode(&self.caps)
            .map(|r| (r.borrowCap, r.supplyCap))
            .unwrap_or_else(|e| defaulted(asset, "caps", e, (U256::ZERO, U256::ZERO)));
        let price_feed = results
            .decode(&self.source)
            .map(|r| r._0)
            .unwrap_or_else(|e| defaulted(asset, "price feed", e, Address::ZERO));
        let symbol = results
            .decode(&self.symbol)
            .map(|r| r._0)
            .unwrap_or_else(|e| defaulted(asset, "symbol", e, UNKNOWN_SYMBOL.to_string()));
        let token_decimals = results
            .decode(&self.decimals)
            .map(|r| r._0)
            .unwrap_or_else(|e| defaulted(asset, "decimals", e, DEFAULT_TOKEN_DECIMALS));

        let config = decode_config(&data.configuration);
        let decimals = if config.decimals_bits > 0 {
            config.decimals_bits
        } else {
            token_decimals
        };

        Some(Reserve {
            address: asset,
            symbol,
            decimals,
            config,
            variable_borrow_rate: descale_ray(ctx, data.currentVariableBorrowRate),
            stable_borrow_rate: descale_ray(ctx, data.currentStableBorrowRate),
            price: ctx.div(&from_u256(&price), base_unit),
            borrow_cap,
            supply_cap,
            a_token: data.aTokenAddress,
            stable_debt_token: data.stableDebtTokenAddress,
            variable_debt_token: data.variableDebtTokenAddress,
            price_feed,
        })
    }
}

fn defaulted<T>(asset: Address, field: &str, error: CallDecodeError, default: T) -> T {
    debug!("Reserve {}: {} defaulted ({})", asset, field, error);
    default
}

fn descale_ray(ctx: &DecimalContext, rate: u128) -> BigDecimal {
    ctx.div(&from_u256(&U256::from(rate)), &ten_pow(RAY_DECIMALS))
}

/// Read every listed reserve in a single aggregated call.
///
/// A reserve whose reserve data cannot be read is kept as a dropped entry so
/// that later phases can keep their slots aligned with the reserve list.
pub async fn resolve_reserves<T: EthCall + ?Sized>(
    multicall: &Multicall<'_, T>,
    protocol: &ProtocolAddresses,
    assets: &[Address],
    base_unit: &BigDecimal,
    ctx: &DecimalContext,
) -> Result<ResolvedReserves, MulticallError> {
    let mut batch = multicall.batch(assets.len() * RESERVE_CALL_STRIDE);
    let calls: Vec<ReserveCalls> = assets
        .iter()
        .map(|asset| ReserveCalls::push(&mut batch, protocol, *asset))
        .collect();

    let results = multicall.try_aggregate(batch).await?;

    let entries: Vec<ReserveEntry> = assets
        .iter()
        .zip(calls.iter())
        .map(|(asset, calls)| ReserveEntry {
            asset: *asset,
            reserve: calls.decode(&results, *asset, base_unit, ctx),
        })
        .collect();

    let resolved = ResolvedReserves { entries };
    if log::log_enabled!(log::Level::Debug) {
        debug!(
            "Resolved {}/{} reserves",
            resolved.listed_count() - resolved.dropped_count(),
            resolved.listed_count()
        );
    }
    Ok(resolved)
}

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use bigdecimal::BigDecimal;
use hf_common::{config::DEFAULT_BASE_CURRENCY_DECIMALS, decimal::from_u256};
use log::{debug, warn};
use thiserror::Error;

use crate::{
    contracts::{IAaveOracle, IPool, IPoolAddressesProvider},
    error::SnapshotError,
    rpc_client::{EthCall, RpcError},
};

#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("abi decoding failed: {0}")]
    Decode(String),
}

/// Execute a single view call outside of any batch
pub async fn read<T, C>(client: &T, to: Address, call: &C) -> Result<C::Return, ReadError>
where
    T: EthCall + ?Sized,
    C: SolCall + Sync,
{
    let output = client.call(to, Bytes::from(call.abi_encode())).await?;
    C::abi_decode_returns(&output, true).map_err(|e| ReadError::Decode(e.to_string()))
}

/// Contracts every batch is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolAddresses {
    pub pool: Address,
    pub oracle: Address,
    pub configurator: Address,
}

/// Everything read before the first batch
#[derive(Debug, Clone)]
pub struct Bootstrap {
    pub addresses: ProtocolAddresses,
    // Divisor turning oracle prices into USD
    pub base_unit: BigDecimal,
    pub reserves: Vec<Address>,
}

pub fn default_base_unit() -> U256 {
    U256::from(10u64).pow(U256::from(DEFAULT_BASE_CURRENCY_DECIMALS))
}

/// Discover the oracle, the configurator and the reserve list from the pool.
///
/// Only the base currency unit is optional: an unreadable or zero unit falls
/// back to `10^8`.
pub async fn bootstrap<T: EthCall + ?Sized>(client: &T, pool: Address) -> Result<Bootstrap, SnapshotError> {
    let provider = read(client, pool, &IPool::ADDRESSES_PROVIDERCall {})
        .await
        .map_err(|e| SnapshotError::bootstrap("addresses provider", e))?
        ._0;
    debug!("Addresses provider: {}", provider);

    let oracle = read(client, provider, &IPoolAddressesProvider::getPriceOracleCall {})
        .await
        .map_err(|e| SnapshotError::bootstrap("price oracle", e))?
        ._0;
    let configurator = read(client, provider, &IPoolAddressesProvider::getPoolConfiguratorCall {})
        .await
        .map_err(|e| SnapshotError::bootstrap("pool configurator", e))?
        ._0;
    debug!("Price oracle: {}, pool configurator: {}", oracle, configurator);

    let base_unit = match read(client, oracle, &IAaveOracle::BASE_CURRENCY_UNITCall {}).await {
        Ok(unit) if !unit._0.is_zero() => unit._0,
        Ok(_) => {
            warn!("Oracle reported a zero base currency unit, using {}", default_base_unit());
            default_base_unit()
        }
        Err(e) => {
            warn!("Unable to read base currency unit ({}), using {}", e, default_base_unit());
            default_base_unit()
        }
    };

    let reserves = read(client, pool, &IPool::getReservesListCall {})
        .await
        .map_err(|e| SnapshotError::bootstrap("reserves list", e))?
        ._0;
    debug!("Pool lists {} reserves", reserves.len());

    Ok(Bootstrap {
        addresses: ProtocolAddresses {
            pool,
            oracle,
            configurator,
        },
        base_unit: from_u256(&base_unit),
        reserves,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_unit() {
        assert_eq!(default_base_unit(), U256::from(100_000_000u64));
    }
}

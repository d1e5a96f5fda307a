#![allow(dead_code)]
// In-memory chain answering the view calls of a snapshot run, including
// Multicall3 tryAggregate batches.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use alloy_primitives::{address, Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use hf_common::config::{CHAIN_ID, MULTICALL3_ADDRESS, POOL_ADDRESS};
use hf_snapshot::{
    contracts::{
        IAaveOracle, IAggregatorV3, IERC20Metadata, IMulticall3, IPool, IPoolAddressesProvider,
        IPoolConfigurator,
    },
    rpc_client::{EthCall, RpcError},
};

pub const PROVIDER: Address = address!("e20fCBdBfFC4Dd138cE8b2E6FBb6CB49777ad64D");
pub const ORACLE: Address = address!("2Cc0Fc26eD4563A5ce5e8bdcfe1A2878676Ae156");
pub const CONFIGURATOR: Address = address!("5731a04B1E775f0fdd454Bf70f3335886e9A96be");
pub const USER: Address = address!("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045");

pub const RAY: u128 = 1_000_000_000_000_000_000_000_000_000;

type Word = [u8; 32];

fn uint(value: U256) -> Word {
    value.to_be_bytes::<32>()
}

fn small(value: u128) -> Word {
    uint(U256::from(value))
}

fn addr(value: Address) -> Word {
    value.into_word().0
}

fn words(values: &[Word]) -> Vec<u8> {
    values.concat()
}

/// Address with a role prefix and a reserve index, so every token is distinct
pub fn mock_address(prefix: u8, index: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = prefix;
    bytes[19] = index;
    Address::from(bytes)
}

/// Packed reserve configuration word
pub fn packed_config(ltv: u64, liquidation_threshold: u64, liquidation_bonus: u64, decimals: u64) -> U256 {
    U256::from(ltv)
        | (U256::from(liquidation_threshold) << 16usize)
        | (U256::from(liquidation_bonus) << 32usize)
        | (U256::from(decimals) << 48usize)
}

/// Per-reserve first phase reads that can be made to revert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReserveRead {
    Price,
    Caps,
    Source,
    Symbol,
    Decimals,
}

#[derive(Debug, Clone)]
pub struct MockReserve {
    pub asset: Address,
    pub symbol: String,
    pub token_decimals: u8,
    pub configuration: U256,
    pub variable_rate: u128,
    pub stable_rate: u128,
    // Base currency units
    pub price: U256,
    pub borrow_cap: U256,
    pub supply_cap: U256,
    pub feed: Address,
    pub updated_at: u64,
    pub a_token: Address,
    pub stable_debt_token: Address,
    pub variable_debt_token: Address,
    pub reserve_data_reverts: bool,
    pub reverted_reads: HashSet<ReserveRead>,
}

impl MockReserve {
    /// Fully configured 6 decimals reserve priced at 1 USD
    pub fn new(index: u8, symbol: &str) -> Self {
        Self {
            asset: mock_address(0x10, index),
            symbol: symbol.to_string(),
            token_decimals: 6,
            configuration: packed_config(7500, 7800, 10500, 6),
            variable_rate: RAY / 20,
            stable_rate: 0,
            price: U256::from(100_000_000u64),
            borrow_cap: U256::ZERO,
            supply_cap: U256::ZERO,
            feed: mock_address(0xf0, index),
            updated_at: 1_700_000_000 + u64::from(index),
            a_token: mock_address(0xa0, index),
            stable_debt_token: mock_address(0xb0, index),
            variable_debt_token: mock_address(0xc0, index),
            reserve_data_reverts: false,
            reverted_reads: HashSet::new(),
        }
    }

    pub fn reverting(mut self) -> Self {
        self.reserve_data_reverts = true;
        self
    }

    pub fn reverting_reads(mut self, reads: &[ReserveRead]) -> Self {
        self.reverted_reads.extend(reads.iter().copied());
        self
    }

    fn answers(&self, read: ReserveRead) -> bool {
        !self.reverted_reads.contains(&read)
    }

    fn reserve_data(&self) -> Vec<u8> {
        words(&[
            uint(self.configuration),
            small(RAY),
            small(0),
            small(RAY),
            small(self.variable_rate),
            small(self.stable_rate),
            small(u128::from(self.updated_at)),
            small(0),
            addr(self.a_token),
            addr(self.stable_debt_token),
            addr(self.variable_debt_token),
            addr(Address::ZERO),
            small(0),
            small(0),
            small(0),
        ])
    }
}

/// Raw values returned by getUserAccountData
#[derive(Debug, Clone, Copy, Default)]
pub struct MockAccount {
    pub total_collateral_base: U256,
    pub total_debt_base: U256,
    pub available_borrows_base: U256,
    pub liquidation_threshold_bps: U256,
    pub ltv_bps: U256,
    pub health_factor: U256,
}

pub struct MockChain {
    pub chain_id: u64,
    pub pool: Address,
    pub multicall: Address,
    // None reverts the call
    pub base_unit: Option<U256>,
    pub reserves: Vec<MockReserve>,
    pub balances: HashMap<(Address, Address), U256>,
    pub supplies: HashMap<Address, U256>,
    pub account: Option<MockAccount>,
    pub pool_reachable: bool,
    pub chain_id_reachable: bool,
    // Number of sub-calls of every tryAggregate received
    pub aggregate_sizes: Mutex<Vec<usize>>,
}

impl MockChain {
    pub fn new(reserves: Vec<MockReserve>) -> Self {
        Self {
            chain_id: CHAIN_ID,
            pool: POOL_ADDRESS,
            multicall: MULTICALL3_ADDRESS,
            base_unit: Some(U256::from(100_000_000u64)),
            reserves,
            balances: HashMap::new(),
            supplies: HashMap::new(),
            account: Some(MockAccount::default()),
            pool_reachable: true,
            chain_id_reachable: true,
            aggregate_sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_balance(mut self, token: Address, holder: Address, amount: u128) -> Self {
        self.balances.insert((token, holder), U256::from(amount));
        self
    }

    pub fn with_supply(mut self, token: Address, amount: u128) -> Self {
        self.supplies.insert(token, U256::from(amount));
        self
    }

    pub fn with_account(mut self, account: MockAccount) -> Self {
        self.account = Some(account);
        self
    }

    pub fn aggregate_sizes(&self) -> Vec<usize> {
        self.aggregate_sizes.lock().unwrap().clone()
    }

    fn reserve(&self, asset: Address) -> Option<&MockReserve> {
        self.reserves.iter().find(|r| r.asset == asset)
    }

    fn is_token(&self, to: Address) -> bool {
        self.reserves.iter().any(|r| {
            r.a_token == to || r.stable_debt_token == to || r.variable_debt_token == to
        })
    }

    // None stands for a reverted call
    fn respond(&self, to: Address, data: &[u8]) -> Option<Vec<u8>> {
        let selector: [u8; 4] = data.get(..4)?.try_into().ok()?;

        if to == self.pool {
            if !self.pool_reachable {
                return None;
            }
            if selector == IPool::ADDRESSES_PROVIDERCall::SELECTOR {
                return Some(words(&[addr(PROVIDER)]));
            }
            if selector == IPool::getReservesListCall::SELECTOR {
                let list: Vec<Address> = self.reserves.iter().map(|r| r.asset).collect();
                return Some(IPool::getReservesListCall::abi_encode_returns(&(list,)));
            }
            if selector == IPool::getReserveDataCall::SELECTOR {
                let call = IPool::getReserveDataCall::abi_decode(data, true).ok()?;
                let reserve = self.reserve(call.asset)?;
                return (!reserve.reserve_data_reverts).then(|| reserve.reserve_data());
            }
            if selector == IPool::getUserAccountDataCall::SELECTOR {
                let account = self.account?;
                return Some(words(&[
                    uint(account.total_collateral_base),
                    uint(account.total_debt_base),
                    uint(account.available_borrows_base),
                    uint(account.liquidation_threshold_bps),
                    uint(account.ltv_bps),
                    uint(account.health_factor),
                ]));
            }
            return None;
        }

        if to == PROVIDER {
            if selector == IPoolAddressesProvider::getPriceOracleCall::SELECTOR {
                return Some(words(&[addr(ORACLE)]));
            }
            if selector == IPoolAddressesProvider::getPoolConfiguratorCall::SELECTOR {
                return Some(words(&[addr(CONFIGURATOR)]));
            }
            return None;
        }

        if to == ORACLE {
            if selector == IAaveOracle::BASE_CURRENCY_UNITCall::SELECTOR {
                return self.base_unit.map(|unit| words(&[uint(unit)]));
            }
            if selector == IAaveOracle::getAssetPriceCall::SELECTOR {
                let call = IAaveOracle::getAssetPriceCall::abi_decode(data, true).ok()?;
                let reserve = self.reserve(call.asset)?;
                return reserve.answers(ReserveRead::Price).then(|| words(&[uint(reserve.price)]));
            }
            if selector == IAaveOracle::getSourceOfAssetCall::SELECTOR {
                let call = IAaveOracle::getSourceOfAssetCall::abi_decode(data, true).ok()?;
                let reserve = self.reserve(call.asset)?;
                return reserve.answers(ReserveRead::Source).then(|| words(&[addr(reserve.feed)]));
            }
            return None;
        }

        if to == CONFIGURATOR && selector == IPoolConfigurator::getReserveCapsCall::SELECTOR {
            let call = IPoolConfigurator::getReserveCapsCall::abi_decode(data, true).ok()?;
            let reserve = self.reserve(call.asset)?;
            return reserve
                .answers(ReserveRead::Caps)
                .then(|| words(&[uint(reserve.borrow_cap), uint(reserve.supply_cap)]));
        }

        if let Some(reserve) = self.reserve(to) {
            if selector == IERC20Metadata::symbolCall::SELECTOR {
                return reserve
                    .answers(ReserveRead::Symbol)
                    .then(|| IERC20Metadata::symbolCall::abi_encode_returns(&(reserve.symbol.clone(),)));
            }
            if selector == IERC20Metadata::decimalsCall::SELECTOR {
                return reserve
                    .answers(ReserveRead::Decimals)
                    .then(|| words(&[small(u128::from(reserve.token_decimals))]));
            }
            return None;
        }

        if self.is_token(to) {
            if selector == IERC20Metadata::balanceOfCall::SELECTOR {
                let call = IERC20Metadata::balanceOfCall::abi_decode(data, true).ok()?;
                let balance = self.balances.get(&(to, call.account)).copied().unwrap_or_default();
                return Some(words(&[uint(balance)]));
            }
            if selector == IERC20Metadata::totalSupplyCall::SELECTOR {
                let supply = self.supplies.get(&to).copied().unwrap_or_default();
                return Some(words(&[uint(supply)]));
            }
            return None;
        }

        if selector == IAggregatorV3::latestRoundDataCall::SELECTOR {
            let reserve = self.reserves.iter().find(|r| r.feed == to)?;
            return Some(words(&[
                small(1),
                uint(reserve.price),
                small(u128::from(reserve.updated_at)),
                small(u128::from(reserve.updated_at)),
                small(1),
            ]));
        }

        None
    }

    fn aggregate(&self, data: &[u8]) -> Result<Bytes, RpcError> {
        let call = IMulticall3::tryAggregateCall::abi_decode(data, true)
            .map_err(|e| RpcError::Parse(e.to_string()))?;
        self.aggregate_sizes.lock().unwrap().push(call.calls.len());

        let results: Vec<IMulticall3::CallResult> = call
            .calls
            .iter()
            .map(|sub| match self.respond(sub.target, &sub.callData) {
                Some(output) => IMulticall3::CallResult {
                    success: true,
                    returnData: Bytes::from(output),
                },
                None => IMulticall3::CallResult {
                    success: false,
                    returnData: Bytes::new(),
                },
            })
            .collect();

        Ok(Bytes::from(IMulticall3::tryAggregateCall::abi_encode_returns(&(results,))))
    }
}

#[async_trait]
impl EthCall for MockChain {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        if !self.chain_id_reachable {
            return Err(RpcError::Connect("connection refused".to_string()));
        }
        Ok(self.chain_id)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        if to == self.multicall {
            return self.aggregate(&data);
        }
        self.respond(to, &data)
            .map(Bytes::from)
            .ok_or_else(|| RpcError::JsonRpc {
                code: 3,
                message: "execution reverted".to_string(),
            })
    }
}

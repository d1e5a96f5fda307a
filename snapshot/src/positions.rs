//! Second read phase: user balances, token supplies and the latest oracle
//! round of every reserve resolved in the first phase.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use log::debug;

use crate::{
    contracts::{IAggregatorV3, IERC20Metadata},
    multicall::{BatchBuilder, BatchResults, CallDecodeError, Handle, Multicall, MulticallError},
    reserves::{Reserve, ResolvedReserves},
    rpc_client::EthCall,
};

/// Sub-calls issued per reserve in the second phase
pub const POSITION_CALL_STRIDE: usize = 7;

/// Raw exposure of the user to one reserve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionLeg {
    pub collateral_balance: U256,
    pub collateral_supply: U256,
    pub stable_debt_balance: U256,
    pub stable_debt_supply: U256,
    pub variable_debt_balance: U256,
    pub variable_debt_supply: U256,
    // updatedAt of the latest oracle round, 0 when unknown
    pub last_update: u64,
}

type BalanceOf = Handle<IERC20Metadata::balanceOfCall>;
type TotalSupply = Handle<IERC20Metadata::totalSupplyCall>;

struct PositionCalls {
    collateral: (BalanceOf, TotalSupply),
    stable_debt: (BalanceOf, TotalSupply),
    variable_debt: (BalanceOf, TotalSupply),
    round: Handle<IAggregatorV3::latestRoundDataCall>,
}

impl PositionCalls {
    // Always pushes exactly POSITION_CALL_STRIDE slots
    fn push(batch: &mut BatchBuilder, reserve: &Reserve, user: Address) -> Self {
        let collateral = push_token(batch, reserve.a_token, user);
        let stable_debt = push_token(batch, reserve.stable_debt_token, user);
        let variable_debt = push_token(batch, reserve.variable_debt_token, user);
        let round = if reserve.price_feed.is_zero() {
            batch.push_placeholder()
        } else {
            batch.push(reserve.price_feed, &IAggregatorV3::latestRoundDataCall {})
        };

        Self {
            collateral,
            stable_debt,
            variable_debt,
            round,
        }
    }

    // Slots of a reserve dropped in the first phase
    fn placeholders(batch: &mut BatchBuilder) -> Self {
        Self {
            collateral: (batch.push_placeholder(), batch.push_placeholder()),
            stable_debt: (batch.push_placeholder(), batch.push_placeholder()),
            variable_debt: (batch.push_placeholder(), batch.push_placeholder()),
            round: batch.push_placeholder(),
        }
    }

    fn decode(&self, results: &BatchResults, asset: Address) -> PositionLeg {
        let amount = |handle: &BalanceOf, field: &str| {
            results
                .decode(handle)
                .map(|r| r._0)
                .unwrap_or_else(|e| defaulted(asset, field, e))
        };
        let supply = |handle: &TotalSupply, field: &str| {
            results
                .decode(handle)
                .map(|r| r._0)
                .unwrap_or_else(|e| defaulted(asset, field, e))
        };

        let last_update = results
            .decode(&self.round)
            .map(|round| u64::try_from(round.updatedAt).unwrap_or(0))
            .unwrap_or_else(|e| {
                debug!("Reserve {}: oracle round defaulted ({})", asset, e);
                0
            });

        PositionLeg {
            collateral_balance: amount(&self.collateral.0, "collateral balance"),
            collateral_supply: supply(&self.collateral.1, "collateral supply"),
            stable_debt_balance: amount(&self.stable_debt.0, "stable debt balance"),
            stable_debt_supply: supply(&self.stable_debt.1, "stable debt supply"),
            variable_debt_balance: amount(&self.variable_debt.0, "variable debt balance"),
            variable_debt_supply: supply(&self.variable_debt.1, "variable debt supply"),
            last_update,
        }
    }
}

// A zero token address keeps its two slots as placeholders
fn push_token(batch: &mut BatchBuilder, token: Address, user: Address) -> (BalanceOf, TotalSupply) {
    if token.is_zero() {
        (batch.push_placeholder(), batch.push_placeholder())
    } else {
        (
            batch.push(token, &IERC20Metadata::balanceOfCall { account: user }),
            batch.push(token, &IERC20Metadata::totalSupplyCall {}),
        )
    }
}

fn defaulted(asset: Address, field: &str, error: CallDecodeError) -> U256 {
    debug!("Reserve {}: {} defaulted ({})", asset, field, error);
    U256::ZERO
}

// One group of calls per listed reserve, dropped reserves included
fn plan(batch: &mut BatchBuilder, reserves: &ResolvedReserves, user: Address) -> Vec<(Address, Option<PositionCalls>)> {
    reserves
        .entries
        .iter()
        .map(|entry| match &entry.reserve {
            Some(reserve) => (entry.asset, Some(PositionCalls::push(batch, reserve, user))),
            None => {
                PositionCalls::placeholders(batch);
                (entry.asset, None)
            }
        })
        .collect()
}

/// Read the user legs of every resolved reserve in a single aggregated call.
///
/// The batch always carries `POSITION_CALL_STRIDE` slots per listed reserve,
/// dropped reserves are filled with placeholders and yield no leg.
pub async fn resolve_positions<T: EthCall + ?Sized>(
    multicall: &Multicall<'_, T>,
    reserves: &ResolvedReserves,
    user: Address,
) -> Result<HashMap<Address, PositionLeg>, MulticallError> {
    let mut batch = multicall.batch(reserves.listed_count() * POSITION_CALL_STRIDE);
    let planned = plan(&mut batch, reserves, user);

    let results = multicall.try_aggregate(batch).await?;

    Ok(planned
        .into_iter()
        .filter_map(|(asset, calls)| calls.map(|calls| (asset, calls.decode(&results, asset))))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reserves::ReserveEntry;
    use alloy_primitives::address;
    use bigdecimal::BigDecimal;
    use hf_common::reserve_config::decode_config;

    const MULTICALL: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");
    const USER: Address = address!("1111111111111111111111111111111111111111");

    fn reserve(asset: Address, stable_debt_token: Address, price_feed: Address) -> Reserve {
        Reserve {
            address: asset,
            symbol: "TKN".to_string(),
            decimals: 18,
            config: decode_config(&U256::ZERO),
            variable_borrow_rate: BigDecimal::from(0),
            stable_borrow_rate: BigDecimal::from(0),
            price: BigDecimal::from(1),
            borrow_cap: U256::ZERO,
            supply_cap: U256::ZERO,
            a_token: address!("00000000000000000000000000000000000000a1"),
            stable_debt_token,
            variable_debt_token: address!("00000000000000000000000000000000000000c1"),
            price_feed,
        }
    }

    #[test]
    fn test_dropped_reserves_keep_alignment() {
        let assets = [
            address!("0000000000000000000000000000000000000001"),
            address!("0000000000000000000000000000000000000002"),
            address!("0000000000000000000000000000000000000003"),
            address!("0000000000000000000000000000000000000004"),
        ];
        let feed = address!("00000000000000000000000000000000000000f1");
        let reserves = ResolvedReserves {
            entries: vec![
                ReserveEntry { asset: assets[0], reserve: None },
                ReserveEntry {
                    asset: assets[1],
                    reserve: Some(reserve(assets[1], Address::ZERO, feed)),
                },
                ReserveEntry { asset: assets[2], reserve: None },
                ReserveEntry {
                    asset: assets[3],
                    reserve: Some(reserve(assets[3], address!("00000000000000000000000000000000000000b1"), Address::ZERO)),
                },
            ],
        };

        let mut batch = BatchBuilder::new(MULTICALL);
        let planned = plan(&mut batch, &reserves, USER);

        assert_eq!(batch.len(), assets.len() * POSITION_CALL_STRIDE);
        assert_eq!(planned.len(), assets.len());
        assert!(planned[0].1.is_none() && planned[2].1.is_none());

        for (i, (asset, calls)) in planned.iter().enumerate() {
            assert_eq!(*asset, assets[i]);
            if let Some(calls) = calls {
                let base = i * POSITION_CALL_STRIDE;
                assert_eq!(calls.collateral.0.index(), base);
                assert_eq!(calls.collateral.1.index(), base + 1);
                assert_eq!(calls.stable_debt.0.index(), base + 2);
                assert_eq!(calls.stable_debt.1.index(), base + 3);
                assert_eq!(calls.variable_debt.0.index(), base + 4);
                assert_eq!(calls.variable_debt.1.index(), base + 5);
                assert_eq!(calls.round.index(), base + 6);
            }
        }
    }

    #[test]
    fn test_placeholders_decode_to_zero_leg() {
        let mut batch = BatchBuilder::new(MULTICALL);
        let calls = PositionCalls::placeholders(&mut batch);
        assert_eq!(batch.len(), POSITION_CALL_STRIDE);

        // Multicall3 has no fallback: every placeholder slot reverts
        let results = BatchResults::from_results(
            (0..POSITION_CALL_STRIDE)
                .map(|_| crate::contracts::IMulticall3::CallResult {
                    success: false,
                    returnData: Default::default(),
                })
                .collect(),
        );
        assert_eq!(calls.decode(&results, USER), PositionLeg::default());
    }
}

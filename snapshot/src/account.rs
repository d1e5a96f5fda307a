use alloy_primitives::{Address, U256};
use log::debug;

use crate::{contracts::IPool, error::SnapshotError, protocol::read, rpc_client::EthCall};

/// Pool level aggregate of a user position, in raw protocol units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountSummary {
    // Base currency units
    pub total_collateral_base: U256,
    pub total_debt_base: U256,
    pub available_borrows_base: U256,
    // Basis points
    pub liquidation_threshold_bps: U256,
    pub ltv_bps: U256,
    // Wad
    pub health_factor: U256,
}

impl From<IPool::getUserAccountDataReturn> for AccountSummary {
    fn from(data: IPool::getUserAccountDataReturn) -> Self {
        Self {
            total_collateral_base: data.totalCollateralBase,
            total_debt_base: data.totalDebtBase,
            available_borrows_base: data.availableBorrowsBase,
            liquidation_threshold_bps: data.currentLiquidationThreshold,
            ltv_bps: data.ltv,
            health_factor: data.healthFactor,
        }
    }
}

pub async fn read_account_summary<T: EthCall + ?Sized>(
    client: &T,
    pool: Address,
    user: Address,
) -> Result<AccountSummary, SnapshotError> {
    let data = read(client, pool, &IPool::getUserAccountDataCall { user })
        .await
        .map_err(|e| SnapshotError::AccountData(e.to_string()))?;

    let summary = AccountSummary::from(data);
    debug!("Account summary for {}: {:?}", user, summary);
    Ok(summary)
}

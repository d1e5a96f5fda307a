//! Run orchestration: bootstrap reads, the two batched phases, the account
//! summary and finally the assembled snapshot.

use std::time::Instant;

use alloy_primitives::Address;
use bigdecimal::{BigDecimal, Zero};
use hf_common::{
    config::{CHAIN_ID, MULTICALL3_ADDRESS, POOL_ADDRESS},
    decimal::DecimalContext,
    snapshot::Snapshot,
    time::get_current_time_in_seconds,
};
use log::{debug, info, warn};

use crate::{
    account::read_account_summary,
    assembler::{assemble, AssetView, BaseCurrencyQuote, SnapshotParts},
    config::{ResolvedRequest, SnapshotRequest, ValidatedConfig},
    error::SnapshotError,
    multicall::Multicall,
    positions::resolve_positions,
    protocol::bootstrap,
    reserves::resolve_reserves,
    risk::{account_metrics, asset_metrics, find_native_reserve},
    rpc_client::{EthCall, RpcClient, RpcClientConfig},
};

/// Read the chain id reported by `client`.
///
/// A failed read is a connectivity error. A chain other than Base is only
/// reported, the snapshot keeps the configured network identity.
pub async fn check_chain_id<T: EthCall + ?Sized>(client: &T, endpoint: &str) -> Result<u64, SnapshotError> {
    let chain_id = client
        .chain_id()
        .await
        .map_err(|e| SnapshotError::Connection(format!("{}: {}", endpoint, e)))?;

    if chain_id != CHAIN_ID {
        warn!(
            "Endpoint {} reports chain id {}, expected {}",
            endpoint, chain_id, CHAIN_ID
        );
    } else {
        debug!("Connected to {} (chain id {})", endpoint, chain_id);
    }
    Ok(chain_id)
}

/// Open a client on `rpc_url` and check its chain id once.
///
/// Any failure, including a malformed URL, is a connectivity error.
pub async fn connect(rpc_url: &str, config: RpcClientConfig) -> Result<RpcClient, SnapshotError> {
    let client = RpcClient::with_config(rpc_url, config)
        .map_err(|e| SnapshotError::Connection(format!("{}: {}", rpc_url, e)))?;

    check_chain_id(&client, client.url().as_str()).await?;
    Ok(client)
}

/// Builds snapshots against one pool deployment.
#[derive(Debug, Clone)]
pub struct SnapshotEngine {
    pool: Address,
    multicall: Address,
    ctx: DecimalContext,
}

impl Default for SnapshotEngine {
    fn default() -> Self {
        Self::new(POOL_ADDRESS, MULTICALL3_ADDRESS, DecimalContext::default())
    }
}

impl SnapshotEngine {
    pub fn new(pool: Address, multicall: Address, ctx: DecimalContext) -> Self {
        Self { pool, multicall, ctx }
    }

    pub async fn build_snapshot<T: EthCall + ?Sized>(
        &self,
        client: &T,
        user: Address,
    ) -> Result<Snapshot, SnapshotError> {
        self.build_snapshot_since(client, user, Instant::now()).await
    }

    /// Build the snapshot of `user`, reporting latency from `started`.
    ///
    /// Fatal failures abort with no partial output. A failing sub-call only
    /// zeroes or drops the fields it feeds.
    pub async fn build_snapshot_since<T: EthCall + ?Sized>(
        &self,
        client: &T,
        user: Address,
        started: Instant,
    ) -> Result<Snapshot, SnapshotError> {
        let protocol = bootstrap(client, self.pool).await?;
        let multicall = Multicall::new(client, self.multicall);

        let reserves = resolve_reserves(
            &multicall,
            &protocol.addresses,
            &protocol.reserves,
            &protocol.base_unit,
            &self.ctx,
        )
        .await?;
        if reserves.dropped_count() > 0 {
            warn!(
                "{} of {} reserves could not be read and are skipped",
                reserves.dropped_count(),
                reserves.listed_count()
            );
        }

        let legs = resolve_positions(&multicall, &reserves, user).await?;
        let summary = read_account_summary(client, self.pool, user).await?;

        let mut collateral_sum = BigDecimal::zero();
        let mut debt_sum = BigDecimal::zero();
        let mut assets = Vec::with_capacity(legs.len());
        for reserve in reserves.resolved() {
            let leg = legs.get(&reserve.address).copied().unwrap_or_default();
            let metrics = asset_metrics(&self.ctx, reserve, &leg);
            collateral_sum += &metrics.collateral_usd;
            debt_sum += &metrics.debt_usd;
            assets.push(AssetView { reserve, metrics });
        }

        let account = account_metrics(
            &self.ctx,
            &summary,
            &protocol.base_unit,
            &collateral_sum,
            &debt_sum,
        );

        let base_currency = find_native_reserve(&reserves)
            .map(|native| BaseCurrencyQuote {
                price_usd: native.price.clone(),
                last_update: legs.get(&native.address).map_or(0, |leg| leg.last_update),
            })
            .unwrap_or_default();

        let parts = SnapshotParts {
            user,
            timestamp: get_current_time_in_seconds(),
            latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            assets,
            account,
            base_currency,
        };
        let snapshot = assemble(&parts)?;

        if log::log_enabled!(log::Level::Info) {
            info!(
                "Snapshot of {} built in {} ms: health factor {} ({})",
                snapshot.address, snapshot.meta.latency_ms, snapshot.user.health_factor, snapshot.user.risk_class
            );
        }
        Ok(snapshot)
    }
}

/// Resolve the request, connect and build the snapshot with the default engine.
pub async fn run(request: &SnapshotRequest, config: &ValidatedConfig) -> Result<Snapshot, SnapshotError> {
    let resolved = request.resolve()?;
    run_resolved(&resolved, config).await
}

pub async fn run_resolved(request: &ResolvedRequest, config: &ValidatedConfig) -> Result<Snapshot, SnapshotError> {
    let started = Instant::now();
    info!("Building snapshot for {} via {}", request.checksum_address(), request.rpc_url);

    let client = connect(&request.rpc_url, config.to_rpc_client_config()).await?;
    SnapshotEngine::default()
        .build_snapshot_since(&client, request.address, started)
        .await
}

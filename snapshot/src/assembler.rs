use alloy_primitives::Address;
use bigdecimal::BigDecimal;
use hf_common::{
    config::{BASE_CURRENCY_SYMBOL, CHAIN_ID, DATA_PROVIDER, NETWORK_NAME, ORACLE_SOURCE, SNAPSHOT_SCHEMA_VERSION},
    decimal::{format_decimal, format_uint, from_u256},
    error::DomainError,
    snapshot::{
        BaseCurrency, CapsRow, CollateralRow, ConfigSection, DebtRow, EmodeSection, IsolationModeSection, Meta,
        OracleAsset, Oracles, Snapshot, StressTests, TokenInfo, Totals, UserSection,
    },
};

use crate::{
    reserves::Reserve,
    risk::{AccountMetrics, AssetMetrics},
};

/// One resolved reserve with its computed metrics
pub struct AssetView<'a> {
    pub reserve: &'a Reserve,
    pub metrics: AssetMetrics,
}

/// Price and freshness reported for the base currency
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseCurrencyQuote {
    pub price_usd: BigDecimal,
    pub last_update: u64,
}

pub struct SnapshotParts<'a> {
    pub user: Address,
    pub timestamp: u64,
    pub latency_ms: u64,
    // Reserve list order
    pub assets: Vec<AssetView<'a>>,
    pub account: AccountMetrics,
    pub base_currency: BaseCurrencyQuote,
}

fn token_info(reserve: &Reserve) -> TokenInfo {
    TokenInfo {
        symbol: reserve.symbol.clone(),
        address: reserve.address.to_checksum(None),
        decimals: reserve.decimals,
    }
}

fn collateral_row(view: &AssetView<'_>) -> CollateralRow {
    let (reserve, metrics) = (view.reserve, &view.metrics);
    CollateralRow {
        token: token_info(reserve),
        amount: format_decimal(&metrics.collateral_amount),
        amount_usd: format_decimal(&metrics.collateral_usd),
        price_usd: format_decimal(&reserve.price),
        usage_as_collateral_enabled: reserve.config.usage_as_collateral_enabled(),
        reserve_ltv: format_decimal(&metrics.reserve_ltv),
        reserve_liquidation_threshold: format_decimal(&metrics.reserve_liquidation_threshold),
        reserve_liquidation_bonus: format_decimal(&metrics.reserve_liquidation_bonus),
        emode_category: reserve.config.emode_category.map(|category| category.to_string()),
    }
}

fn debt_row(view: &AssetView<'_>) -> Result<DebtRow, DomainError> {
    let (reserve, metrics) = (view.reserve, &view.metrics);
    Ok(DebtRow {
        token: token_info(reserve),
        variable_debt: format_decimal(&metrics.variable_debt),
        stable_debt: format_decimal(&metrics.stable_debt),
        total_debt_usd: format_decimal(&metrics.debt_usd),
        variable_borrow_apy: format_decimal(&reserve.variable_borrow_rate),
        stable_borrow_apy: format_decimal(&reserve.stable_borrow_rate),
        reserve_utilization: format_decimal(&metrics.utilization),
        borrow_cap: format_uint(&from_u256(&reserve.borrow_cap))?,
        borrow_cap_used_percent: format_decimal(&metrics.borrow_cap_used_percent),
    })
}

fn oracle_asset(view: &AssetView<'_>) -> OracleAsset {
    OracleAsset {
        token: token_info(view.reserve),
        price_usd: format_decimal(&view.reserve.price),
        last_update: view.metrics.last_update,
        confidence_score: format_decimal(&view.metrics.confidence_score),
    }
}

fn caps_row(view: &AssetView<'_>) -> Result<CapsRow, DomainError> {
    let (reserve, metrics) = (view.reserve, &view.metrics);
    Ok(CapsRow {
        token: token_info(reserve),
        supply_cap: format_uint(&from_u256(&reserve.supply_cap))?,
        supply_cap_used_percent: format_decimal(&metrics.supply_cap_used_percent),
        borrow_cap: format_uint(&from_u256(&reserve.borrow_cap))?,
        borrow_cap_used_percent: format_decimal(&metrics.borrow_cap_used_percent),
    })
}

/// Render every computed value into the snapshot document.
///
/// Nothing is computed here: the only failure is a negative value reaching
/// an unsigned integer field.
pub fn assemble(parts: &SnapshotParts<'_>) -> Result<Snapshot, DomainError> {
    let account = &parts.account;

    let collateral = parts.assets.iter().map(collateral_row).collect();
    let debt = parts.assets.iter().map(debt_row).collect::<Result<Vec<_>, _>>()?;
    let assets = parts.assets.iter().map(oracle_asset).collect();
    let caps = parts.assets.iter().map(caps_row).collect::<Result<Vec<_>, _>>()?;

    Ok(Snapshot {
        network: NETWORK_NAME.to_string(),
        chain_id: CHAIN_ID,
        address: parts.user.to_checksum(None),
        timestamp: parts.timestamp,
        user: UserSection {
            health_factor: format_decimal(&account.health_factor),
            ltv: format_decimal(&account.ltv),
            liquidation_threshold: format_decimal(&account.liquidation_threshold),
            liquidation_buffer_usd: format_decimal(&account.liquidation_buffer_usd),
            available_borrows_usd: format_decimal(&account.available_borrows_usd),
            risk_class: account.risk_class,
            is_safe: account.is_safe,
            stress_tests: StressTests {
                hf_minus_1pct: format_decimal(&account.stress_tests.hf_minus_1pct),
                hf_minus_3pct: format_decimal(&account.stress_tests.hf_minus_3pct),
                hf_minus_5pct: format_decimal(&account.stress_tests.hf_minus_5pct),
            },
        },
        totals: Totals {
            total_collateral_usd: format_decimal(&account.total_collateral_usd),
            total_debt_usd: format_decimal(&account.total_debt_usd),
            net_equity_usd: format_decimal(&account.net_equity_usd),
            current_leverage_ratio: format_decimal(&account.current_leverage_ratio),
            max_leverage_at_current_hf: format_decimal(&account.max_leverage_at_current_hf),
        },
        collateral,
        debt,
        oracles: Oracles {
            base_currency: BaseCurrency {
                symbol: BASE_CURRENCY_SYMBOL.to_string(),
                price_usd: format_decimal(&parts.base_currency.price_usd),
                last_update: parts.base_currency.last_update,
            },
            assets,
        },
        config: ConfigSection {
            emode: EmodeSection::default(),
            isolation_mode: IsolationModeSection::default(),
            caps,
        },
        meta: Meta {
            data_provider: DATA_PROVIDER.to_string(),
            oracle_source: ORACLE_SOURCE.to_string(),
            latency_ms: parts.latency_ms,
            version: SNAPSHOT_SCHEMA_VERSION.to_string(),
        },
    })
}

//! Per-asset and account level risk metrics.
//!
//! Everything here is pure: inputs are the resolved reserves, the user legs
//! and the account summary, outputs are exact decimals ready to be rendered.

use bigdecimal::{BigDecimal, Zero};
use hf_common::{
    config::{BPS_DECIMALS, HIGH_CONFIDENCE_SYMBOL, NATIVE_ASSET_ALIASES, WAD_DECIMALS},
    decimal::{decimal, from_u256, ten_pow, to_units, DecimalContext},
    snapshot::RiskClass,
};
use log::{debug, warn};

use crate::{account::AccountSummary, positions::PositionLeg, reserves::{Reserve, ResolvedReserves}};

/// Derived figures of one reserve for the user
#[derive(Debug, Clone, PartialEq)]
pub struct AssetMetrics {
    pub collateral_amount: BigDecimal,
    pub collateral_usd: BigDecimal,
    pub variable_debt: BigDecimal,
    pub stable_debt: BigDecimal,
    pub debt_usd: BigDecimal,
    pub utilization: BigDecimal,
    pub borrow_cap_used_percent: BigDecimal,
    pub supply_cap_used_percent: BigDecimal,
    pub confidence_score: BigDecimal,
    pub last_update: u64,
    // Reserve parameters as fractions
    pub reserve_ltv: BigDecimal,
    pub reserve_liquidation_threshold: BigDecimal,
    pub reserve_liquidation_bonus: BigDecimal,
}

/// Health factor scaled by fixed shocks
#[derive(Debug, Clone, PartialEq)]
pub struct StressResults {
    pub hf_minus_1pct: BigDecimal,
    pub hf_minus_3pct: BigDecimal,
    pub hf_minus_5pct: BigDecimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountMetrics {
    pub health_factor: BigDecimal,
    pub ltv: BigDecimal,
    pub liquidation_threshold: BigDecimal,
    pub liquidation_buffer_usd: BigDecimal,
    pub available_borrows_usd: BigDecimal,
    pub risk_class: RiskClass,
    pub is_safe: bool,
    pub stress_tests: StressResults,
    pub total_collateral_usd: BigDecimal,
    pub total_debt_usd: BigDecimal,
    pub net_equity_usd: BigDecimal,
    pub current_leverage_ratio: BigDecimal,
    pub max_leverage_at_current_hf: BigDecimal,
}

/// Static source confidence of an oracle price.
pub fn confidence_score(symbol: &str) -> BigDecimal {
    if symbol.eq_ignore_ascii_case(HIGH_CONFIDENCE_SYMBOL) {
        decimal(999, 3)
    } else {
        decimal(99, 2)
    }
}

fn bps_fraction(ctx: &DecimalContext, bps: u16) -> BigDecimal {
    ctx.div(&BigDecimal::from(bps), &ten_pow(BPS_DECIMALS))
}

// 100 * used / cap, zero when no cap is set
fn cap_used_percent(ctx: &DecimalContext, used: &BigDecimal, cap: &BigDecimal) -> BigDecimal {
    if cap.is_zero() {
        return BigDecimal::zero();
    }
    ctx.mul(&ctx.div(used, cap), &BigDecimal::from(100))
}

pub fn asset_metrics(ctx: &DecimalContext, reserve: &Reserve, leg: &PositionLeg) -> AssetMetrics {
    let decimals = i64::from(reserve.decimals);

    let collateral_amount = to_units(&leg.collateral_balance, decimals);
    let stable_debt = to_units(&leg.stable_debt_balance, decimals);
    let variable_debt = to_units(&leg.variable_debt_balance, decimals);

    let collateral_total = to_units(&leg.collateral_supply, decimals);
    let debt_total = to_units(&leg.stable_debt_supply, decimals)
        + to_units(&leg.variable_debt_supply, decimals);

    let utilization = if collateral_total > BigDecimal::zero() {
        ctx.div(&debt_total, &collateral_total)
    } else {
        BigDecimal::zero()
    };

    let borrow_cap_used_percent = cap_used_percent(ctx, &debt_total, &to_units(&reserve.borrow_cap, decimals));
    let supply_cap_used_percent =
        cap_used_percent(ctx, &collateral_total, &to_units(&reserve.supply_cap, decimals));

    let collateral_usd = ctx.mul(&collateral_amount, &reserve.price);
    let debt_usd = ctx.mul(&(&stable_debt + &variable_debt), &reserve.price);

    AssetMetrics {
        collateral_amount,
        collateral_usd,
        variable_debt,
        stable_debt,
        debt_usd,
        utilization,
        borrow_cap_used_percent,
        supply_cap_used_percent,
        confidence_score: confidence_score(&reserve.symbol),
        last_update: leg.last_update,
        reserve_ltv: bps_fraction(ctx, reserve.config.ltv_bps),
        reserve_liquidation_threshold: bps_fraction(ctx, reserve.config.liq_thr_bps),
        reserve_liquidation_bonus: bps_fraction(ctx, reserve.config.liq_bonus_bps),
    }
}

/// `high` below 1.05, `moderate` below 1.25, `low` otherwise.
pub fn classify_risk(health_factor: &BigDecimal) -> RiskClass {
    if *health_factor < decimal(105, 2) {
        RiskClass::High
    } else if *health_factor < decimal(125, 2) {
        RiskClass::Moderate
    } else {
        RiskClass::Low
    }
}

// Strictly above 1.05: the boundary itself is not safe
pub fn is_safe(health_factor: &BigDecimal) -> bool {
    *health_factor > decimal(105, 2)
}

pub fn stress_tests(ctx: &DecimalContext, health_factor: &BigDecimal) -> StressResults {
    StressResults {
        hf_minus_1pct: ctx.mul(health_factor, &decimal(99, 2)),
        hf_minus_3pct: ctx.mul(health_factor, &decimal(97, 2)),
        hf_minus_5pct: ctx.mul(health_factor, &decimal(95, 2)),
    }
}

/// Leverage bound implied by the current position.
///
/// With collateral, debt and a liquidation threshold the bound is
/// `lt / (lt - debt / collateral)`, zero once the debt ratio reaches the
/// threshold. Without debt it falls back to `ltv / (1 - ltv)`, which has no
/// bound for an LTV of 1 or more: that case yields zero as well.
pub fn max_leverage(
    ctx: &DecimalContext,
    collateral_usd: &BigDecimal,
    debt_usd: &BigDecimal,
    liquidation_threshold: &BigDecimal,
    ltv: &BigDecimal,
) -> BigDecimal {
    let zero = BigDecimal::zero();
    if *collateral_usd > zero && *liquidation_threshold > zero && *debt_usd > zero {
        let debt_ratio = ctx.div(debt_usd, collateral_usd);
        let headroom = liquidation_threshold - debt_ratio;
        if headroom > zero {
            ctx.div(liquidation_threshold, &headroom)
        } else {
            zero
        }
    } else if *ltv > zero {
        let headroom = BigDecimal::from(1) - ltv;
        if headroom > zero {
            ctx.div(ltv, &headroom)
        } else {
            debug!("No leverage bound for LTV {}", ltv);
            zero
        }
    } else {
        zero
    }
}

/// Account level metrics.
///
/// Totals prefer the per-reserve sums and fall back, field by field, to the
/// account summary when a sum is zero.
pub fn account_metrics(
    ctx: &DecimalContext,
    summary: &AccountSummary,
    base_unit: &BigDecimal,
    collateral_sum: &BigDecimal,
    debt_sum: &BigDecimal,
) -> AccountMetrics {
    let zero = BigDecimal::zero();

    let health_factor = if summary.health_factor.is_zero() {
        zero.clone()
    } else {
        ctx.div(&from_u256(&summary.health_factor), &ten_pow(WAD_DECIMALS))
    };
    let ltv = ctx.div(&from_u256(&summary.ltv_bps), &ten_pow(BPS_DECIMALS));
    let liquidation_threshold =
        ctx.div(&from_u256(&summary.liquidation_threshold_bps), &ten_pow(BPS_DECIMALS));

    let collateral_api = ctx.div(&from_u256(&summary.total_collateral_base), base_unit);
    let debt_api = ctx.div(&from_u256(&summary.total_debt_base), base_unit);
    let available_borrows_usd = ctx.div(&from_u256(&summary.available_borrows_base), base_unit);

    let buffer = ctx.mul(&collateral_api, &liquidation_threshold) - &debt_api;
    let liquidation_buffer_usd = if buffer < zero { zero.clone() } else { buffer };

    let total_collateral_usd = if *collateral_sum > zero {
        collateral_sum.clone()
    } else {
        collateral_api
    };
    let total_debt_usd = if *debt_sum > zero {
        debt_sum.clone()
    } else {
        debt_api
    };

    let net_equity_usd = &total_collateral_usd - &total_debt_usd;
    let current_leverage_ratio = if net_equity_usd > zero {
        ctx.div(&total_collateral_usd, &net_equity_usd)
    } else {
        zero.clone()
    };
    let max_leverage_at_current_hf = max_leverage(
        ctx,
        &total_collateral_usd,
        &total_debt_usd,
        &liquidation_threshold,
        &ltv,
    );

    AccountMetrics {
        risk_class: classify_risk(&health_factor),
        is_safe: is_safe(&health_factor),
        stress_tests: stress_tests(ctx, &health_factor),
        health_factor,
        ltv,
        liquidation_threshold,
        liquidation_buffer_usd,
        available_borrows_usd,
        total_collateral_usd,
        total_debt_usd,
        net_equity_usd,
        current_leverage_ratio,
        max_leverage_at_current_hf,
    }
}

/// Reserve standing for the chain native asset.
///
/// The first reserve whose symbol is a wrapped native alias wins. Without
/// any match the first listed reserve is used, which is only a guess about
/// the list ordering, so it is reported. `None` when that reserve was
/// dropped or the list is empty.
pub fn find_native_reserve(reserves: &ResolvedReserves) -> Option<&Reserve> {
    let by_alias = reserves.resolved().find(|reserve| {
        NATIVE_ASSET_ALIASES
            .iter()
            .any(|alias| reserve.symbol.eq_ignore_ascii_case(alias))
    });
    if by_alias.is_some() {
        return by_alias;
    }

    let first = reserves.entries.first()?;
    warn!(
        "No wrapped native reserve found, using first listed reserve {} for the base currency",
        first.asset
    );
    first.reserve.as_ref()
}

//! Snapshot document layout.
//!
//! Every financial quantity is a plain decimal string, big counters (caps)
//! are integer strings. Only the chain id, timestamps and the latency are
//! JSON integers. Field names and nesting follow the published JSON schema
//! of the document, version [`SNAPSHOT_SCHEMA_VERSION`](crate::config::SNAPSHOT_SCHEMA_VERSION).

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub network: String,
    pub chain_id: u64,
    pub address: String,
    pub timestamp: u64,
    pub user: UserSection,
    pub totals: Totals,
    pub collateral: Vec<CollateralRow>,
    pub debt: Vec<DebtRow>,
    pub oracles: Oracles,
    pub config: ConfigSection,
    pub meta: Meta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskClass {
    Low,
    Moderate,
    High,
}

impl fmt::Display for RiskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskClass::Low => "low",
            RiskClass::Moderate => "moderate",
            RiskClass::High => "high",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSection {
    pub health_factor: String,
    pub ltv: String,
    pub liquidation_threshold: String,
    pub liquidation_buffer_usd: String,
    pub available_borrows_usd: String,
    pub risk_class: RiskClass,
    pub is_safe: bool,
    pub stress_tests: StressTests,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTests {
    pub hf_minus_1pct: String,
    pub hf_minus_3pct: String,
    pub hf_minus_5pct: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub total_collateral_usd: String,
    pub total_debt_usd: String,
    pub net_equity_usd: String,
    pub current_leverage_ratio: String,
    pub max_leverage_at_current_hf: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    // EIP-55 checksum form
    pub address: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralRow {
    pub token: TokenInfo,
    pub amount: String,
    pub amount_usd: String,
    pub price_usd: String,
    pub usage_as_collateral_enabled: bool,
    pub reserve_ltv: String,
    pub reserve_liquidation_threshold: String,
    pub reserve_liquidation_bonus: String,
    pub emode_category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtRow {
    pub token: TokenInfo,
    pub variable_debt: String,
    pub stable_debt: String,
    pub total_debt_usd: String,
    pub variable_borrow_apy: String,
    pub stable_borrow_apy: String,
    pub reserve_utilization: String,
    pub borrow_cap: String,
    pub borrow_cap_used_percent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Oracles {
    pub base_currency: BaseCurrency,
    pub assets: Vec<OracleAsset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseCurrency {
    pub symbol: String,
    pub price_usd: String,
    pub last_update: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleAsset {
    pub token: TokenInfo,
    pub price_usd: String,
    pub last_update: u64,
    pub confidence_score: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSection {
    pub emode: EmodeSection,
    pub isolation_mode: IsolationModeSection,
    pub caps: Vec<CapsRow>,
}

// User level efficiency mode is not resolved: always reported inactive
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmodeSection {
    pub active: bool,
    pub category: Option<String>,
    pub settings: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationModeSection {
    pub active: bool,
    pub debt_ceiling_remaining_usd: String,
}

impl Default for IsolationModeSection {
    fn default() -> Self {
        Self {
            active: false,
            debt_ceiling_remaining_usd: "0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapsRow {
    pub token: TokenInfo,
    pub supply_cap: String,
    pub supply_cap_used_percent: String,
    pub borrow_cap: String,
    pub borrow_cap_used_percent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub data_provider: String,
    pub oracle_source: String,
    pub latency_ms: u64,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_risk_class_serializes_lowercase() {
        assert_eq!(serde_json::to_value(RiskClass::Moderate).unwrap(), json!("moderate"));
        assert_eq!(RiskClass::High.to_string(), "high");
    }

    #[test]
    fn test_fixed_config_sections() {
        let config = ConfigSection {
            emode: EmodeSection::default(),
            isolation_mode: IsolationModeSection::default(),
            caps: Vec::new(),
        };
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({
                "emode": { "active": false, "category": null, "settings": null },
                "isolation_mode": { "active": false, "debt_ceiling_remaining_usd": "0" },
                "caps": []
            })
        );
    }

    #[test]
    fn test_emode_category_null_when_absent() {
        let row = CollateralRow {
            token: TokenInfo {
                symbol: "USDC".to_string(),
                address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
                decimals: 6,
            },
            amount: "1.000000".to_string(),
            amount_usd: "1.000000".to_string(),
            price_usd: "1".to_string(),
            usage_as_collateral_enabled: true,
            reserve_ltv: "0.75".to_string(),
            reserve_liquidation_threshold: "0.78".to_string(),
            reserve_liquidation_bonus: "1.05".to_string(),
            emode_category: None,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert!(value["emode_category"].is_null());
        assert_eq!(value["token"]["decimals"], json!(6));
    }
}

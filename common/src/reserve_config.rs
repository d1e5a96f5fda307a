use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

// Bit layout of the packed reserve configuration word
// Each entry is (offset, width), ranges never overlap
const LTV_BITS: (usize, usize) = (0, 16);
const LIQUIDATION_THRESHOLD_BITS: (usize, usize) = (16, 16);
const LIQUIDATION_BONUS_BITS: (usize, usize) = (32, 16);
const DECIMALS_BITS: (usize, usize) = (48, 8);
const EMODE_CATEGORY_BITS: (usize, usize) = (184, 8);

/// Risk parameters decoded from a reserve configuration word.
///
/// Percentages are kept in basis points as stored on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveConfig {
    pub ltv_bps: u16,
    pub liq_thr_bps: u16,
    pub liq_bonus_bps: u16,
    pub decimals_bits: u8,
    // None when the reserve is not part of any efficiency mode category
    pub emode_category: Option<u8>,
}

impl ReserveConfig {
    // A reserve can back borrows only if it has a non zero LTV
    pub fn usage_as_collateral_enabled(&self) -> bool {
        self.ltv_bps > 0
    }
}

// Extract `width` bits starting at `offset`
// width must not exceed 64 bits
#[inline]
fn bits(packed: &U256, (offset, width): (usize, usize)) -> u64 {
    let mask = U256::from(u64::MAX >> (64 - width));
    let field = (*packed >> offset) & mask;
    field.as_limbs()[0]
}

/// Decode the packed configuration of a reserve.
///
/// Decoding is total: bits outside the known fields are ignored.
pub fn decode_config(packed: &U256) -> ReserveConfig {
    let emode = bits(packed, EMODE_CATEGORY_BITS) as u8;
    ReserveConfig {
        ltv_bps: bits(packed, LTV_BITS) as u16,
        liq_thr_bps: bits(packed, LIQUIDATION_THRESHOLD_BITS) as u16,
        liq_bonus_bps: bits(packed, LIQUIDATION_BONUS_BITS) as u16,
        decimals_bits: bits(packed, DECIMALS_BITS) as u8,
        emode_category: if emode > 0 { Some(emode) } else { None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pack(ltv: u64, threshold: u64, bonus: u64, decimals: u64, emode: u64) -> U256 {
        U256::from(ltv)
            | (U256::from(threshold) << 16usize)
            | (U256::from(bonus) << 32usize)
            | (U256::from(decimals) << 48usize)
            | (U256::from(emode) << 184usize)
    }

    #[test]
    fn test_decode_typical_reserve() {
        // WETH-like reserve: 80% LTV, 83% threshold, 5% bonus, 18 decimals, emode 1
        let config = decode_config(&pack(8000, 8300, 10500, 18, 1));
        assert_eq!(config.ltv_bps, 8000);
        assert_eq!(config.liq_thr_bps, 8300);
        assert_eq!(config.liq_bonus_bps, 10500);
        assert_eq!(config.decimals_bits, 18);
        assert_eq!(config.emode_category, Some(1));
        assert!(config.usage_as_collateral_enabled());
    }

    #[test]
    fn test_decode_zero_word() {
        let config = decode_config(&U256::ZERO);
        assert_eq!(config.ltv_bps, 0);
        assert_eq!(config.decimals_bits, 0);
        assert_eq!(config.emode_category, None);
        assert!(!config.usage_as_collateral_enabled());
    }

    #[test]
    fn test_unlisted_bits_are_ignored() {
        // Set every flag bit between decimals and the emode category
        // plus the caps region above it
        let mut noise = U256::ZERO;
        for bit in 56..184usize {
            noise |= U256::from(1u64) << bit;
        }
        for bit in 192..256usize {
            noise |= U256::from(1u64) << bit;
        }
        let clean = pack(7500, 8000, 10750, 6, 0);
        assert_eq!(decode_config(&(clean | noise)), decode_config(&clean));
    }

    #[test]
    fn test_all_ones_saturates_each_field() {
        let config = decode_config(&U256::MAX);
        assert_eq!(config.ltv_bps, u16::MAX);
        assert_eq!(config.liq_thr_bps, u16::MAX);
        assert_eq!(config.liq_bonus_bps, u16::MAX);
        assert_eq!(config.decimals_bits, u8::MAX);
        assert_eq!(config.emode_category, Some(u8::MAX));
    }

    proptest! {
        #[test]
        fn prop_fields_match_their_bit_ranges(limbs in any::<[u64; 4]>()) {
            let packed = U256::from_limbs(limbs);
            let config = decode_config(&packed);

            prop_assert_eq!(config.ltv_bps as u64, limbs[0] & 0xFFFF);
            prop_assert_eq!(config.liq_thr_bps as u64, (limbs[0] >> 16) & 0xFFFF);
            prop_assert_eq!(config.liq_bonus_bps as u64, (limbs[0] >> 32) & 0xFFFF);
            prop_assert_eq!(config.decimals_bits as u64, (limbs[0] >> 48) & 0xFF);
            // bit 184 lives in the third limb at offset 56
            let emode = (limbs[2] >> 56) & 0xFF;
            prop_assert_eq!(config.emode_category.map(u64::from).unwrap_or(0), emode);
            prop_assert_eq!(config.usage_as_collateral_enabled(), config.ltv_bps > 0);
        }
    }
}

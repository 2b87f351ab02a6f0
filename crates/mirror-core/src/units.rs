//! Conversion between raw on-chain integer amounts and asset-scaled decimal strings.
//!
//! Scaling is done on the decimal digits of the integer, so no precision is lost
//! at this boundary; only the order-book arithmetic downstream works in `f64`.

use alloy_primitives::U256;

/// Decimal scale of one asset (`10^decimals` raw units per whole unit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetScale {
    decimals: u8,
}

impl AssetScale {
    pub fn new(decimals: u8) -> Self {
        Self { decimals }
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Raw units per whole unit
    pub fn multiplier(&self) -> U256 {
        U256::from(10u64).pow(U256::from(self.decimals))
    }

    /// `raw / 10^decimals` as a canonical decimal string
    pub fn normalize(&self, raw: U256) -> String {
        scale_down(raw, self.decimals)
    }
}

/// Format `raw / 10^decimals` without trailing zeros (`"12.5"`, `"3"`, `"0.001"`).
pub fn scale_down(raw: U256, decimals: u8) -> String {
    let digits = raw.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - digits.len() + 1), digits)
    } else {
        digits
    };

    let split = padded.len() - decimals;
    let (int_part, frac_part) = padded.split_at(split);
    let frac_part = frac_part.trim_end_matches('0');

    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

/// Parse an asset-scaled decimal string, treating garbage as zero
pub fn parse_amount(value: &str) -> f64 {
    value.trim().parse::<f64>().unwrap_or(0.0)
}

/// Format an `f64` amount the way amounts are stored (`"5"`, `"5.5"`)
pub fn format_amount(value: f64) -> String {
    if value == 0.0 {
        // collapses -0.0
        "0".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_down() {
        assert_eq!(scale_down(U256::from(10_000_000u64), 6), "10");
        assert_eq!(scale_down(U256::from(12_500_000u64), 6), "12.5");
        assert_eq!(scale_down(U256::from(1_000u64), 6), "0.001");
        assert_eq!(scale_down(U256::from(1u64), 18), "0.000000000000000001");
        assert_eq!(scale_down(U256::ZERO, 18), "0");
        assert_eq!(scale_down(U256::from(42u64), 0), "42");
    }

    #[test]
    fn test_asset_scale() {
        let scale = AssetScale::new(6);
        assert_eq!(scale.multiplier(), U256::from(1_000_000u64));
        assert_eq!(scale.normalize(U256::from(2_500_000u64)), "2.5");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(5.0), "5");
        assert_eq!(format_amount(-0.0), "0");
        assert_eq!(format_amount(0.25), "0.25");
        assert_eq!(parse_amount(" 1.5 "), 1.5);
        assert_eq!(parse_amount("abc"), 0.0);
    }
}

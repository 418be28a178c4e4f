use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

use crate::error::{AmountError, ValidationError};

/// USDC mint on mainnet.
pub const USDC_MINT: Pubkey = pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");

/// USDT mint on mainnet.
pub const USDT_MINT: Pubkey = pubkey!("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB");

/// Decimals of the native asset (lamports per SOL = 10^9).
pub const NATIVE_DECIMALS: u8 = 9;

/// Decimals shared by both stablecoins.
pub const STABLECOIN_DECIMALS: u8 = 6;

const _: () = assert!(LAMPORTS_PER_SOL == 10u64.pow(NATIVE_DECIMALS as u32));

/// Asset a user can move from the connected wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Sol,
    Usdc,
    Usdt,
}

impl Asset {
    pub const ALL: [Asset; 3] = [Asset::Sol, Asset::Usdc, Asset::Usdt];

    pub fn code(self) -> &'static str {
        match self {
            Asset::Sol => "SOL",
            Asset::Usdc => "USDC",
            Asset::Usdt => "USDT",
        }
    }

    pub fn decimals(self) -> u8 {
        match self {
            Asset::Sol => NATIVE_DECIMALS,
            Asset::Usdc | Asset::Usdt => STABLECOIN_DECIMALS,
        }
    }

    /// Token mint, or `None` for the native asset.
    pub fn mint(self) -> Option<Pubkey> {
        match self {
            Asset::Sol => None,
            Asset::Usdc => Some(USDC_MINT),
            Asset::Usdt => Some(USDT_MINT),
        }
    }

    pub fn is_native(self) -> bool {
        self.mint().is_none()
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Asset {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Asset::ALL
            .into_iter()
            .find(|asset| asset.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownAsset(s.to_string()))
    }
}

/// Parse a decimal string into smallest units (`amount × 10^decimals`).
///
/// Exact: no floating point is involved. Input with more fractional digits
/// than `decimals` is rejected rather than rounded.
pub fn parse_units(input: &str, decimals: u8) -> Result<u64, AmountError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }
    if s.starts_with('-') {
        return Err(AmountError::Negative);
    }

    let (whole, frac) = match s.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::Malformed(input.to_string()));
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(AmountError::Malformed(input.to_string()));
    }
    if frac.len() > decimals as usize {
        return Err(AmountError::TooPrecise { decimals });
    }

    let scale = 10u64
        .checked_pow(decimals as u32)
        .ok_or(AmountError::Overflow)?;
    let whole_units = digits_to_u64(whole)?
        .checked_mul(scale)
        .ok_or(AmountError::Overflow)?;

    // Right-pad the fraction to exactly `decimals` digits.
    let pad = 10u64
        .checked_pow((decimals as usize - frac.len()) as u32)
        .ok_or(AmountError::Overflow)?;
    let frac_units = digits_to_u64(frac)?
        .checked_mul(pad)
        .ok_or(AmountError::Overflow)?;

    whole_units
        .checked_add(frac_units)
        .ok_or(AmountError::Overflow)
}

fn digits_to_u64(digits: &str) -> Result<u64, AmountError> {
    digits.bytes().try_fold(0u64, |acc, b| {
        acc.checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(b - b'0')))
            .ok_or(AmountError::Overflow)
    })
}

/// Render smallest units as a whole-unit decimal string without trailing zeros.
pub fn format_units(units: u64, decimals: u8) -> String {
    let scale = 10u128.pow(decimals as u32);
    let units = units as u128;
    let whole = units / scale;
    let frac = units % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0width$}", width = decimals as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!(parse_units("2.5", 9).unwrap(), 2_500_000_000);
        assert_eq!(parse_units("1", 6).unwrap(), 1_000_000);
        assert_eq!(parse_units("0.000001", 6).unwrap(), 1);
        assert_eq!(parse_units(".5", 6).unwrap(), 500_000);
        assert_eq!(parse_units("3.", 6).unwrap(), 3_000_000);
        assert_eq!(parse_units(" 0.1 ", 9).unwrap(), 100_000_000);
    }

    #[test]
    fn decimal_inputs_that_floats_get_wrong_stay_exact() {
        // 0.1 + 0.2 style inputs must not drift by a unit.
        assert_eq!(parse_units("0.3", 9).unwrap(), 300_000_000);
        assert_eq!(parse_units("1.005", 6).unwrap(), 1_005_000);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse_units("", 6), Err(AmountError::Empty));
        assert_eq!(parse_units("-1", 6), Err(AmountError::Negative));
        assert!(matches!(parse_units(".", 6), Err(AmountError::Malformed(_))));
        assert!(matches!(parse_units("1e3", 6), Err(AmountError::Malformed(_))));
        assert!(matches!(parse_units("1.2.3", 6), Err(AmountError::Malformed(_))));
        assert_eq!(
            parse_units("0.0000001", 6),
            Err(AmountError::TooPrecise { decimals: 6 })
        );
        assert_eq!(parse_units("99999999999", 9), Err(AmountError::Overflow));
    }

    #[test]
    fn formats_without_trailing_zeros() {
        assert_eq!(format_units(2_500_000_000, 9), "2.5");
        assert_eq!(format_units(1_000_000, 6), "1");
        assert_eq!(format_units(1, 6), "0.000001");
        assert_eq!(format_units(0, 9), "0");
    }

    #[test]
    fn asset_codes_parse_case_insensitively() {
        assert_eq!("usdc".parse::<Asset>().unwrap(), Asset::Usdc);
        assert_eq!("SOL".parse::<Asset>().unwrap(), Asset::Sol);
        assert!("BTC".parse::<Asset>().is_err());
    }

    #[test]
    fn only_the_native_asset_has_no_mint() {
        assert!(Asset::Sol.is_native());
        assert_eq!(Asset::Usdc.mint(), Some(USDC_MINT));
        assert_eq!(Asset::Usdt.mint(), Some(USDT_MINT));
        assert_ne!(USDC_MINT, USDT_MINT);
    }
}

//! Tax-inclusive price derivation.
//!
//! All arithmetic is exact decimal. Rounding is half-up (midpoint away from
//! zero) everywhere.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{Result, SyncError};

/// Decimal places kept on unit prices.
pub const PRICE_DECIMALS: u32 = 2;

/// Decimal places kept on the displayed tax percentage.
pub const TAX_PERCENT_DECIMALS: u32 = 1;

/// `round(base * (1 + tax_rate), 2)`.
///
/// Fails with a conversion error when the product overflows the decimal
/// range, or when the rate cannot be shown as a percentage.
pub fn compute_inclusive_price(base: Decimal, tax_rate: Decimal) -> Result<Decimal> {
    tax_rate
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(|| SyncError::conversion("iva_tasa", tax_rate.to_string()))?;
    let factor = Decimal::ONE
        .checked_add(tax_rate)
        .ok_or_else(|| SyncError::conversion("iva_tasa", tax_rate.to_string()))?;
    let gross = base
        .checked_mul(factor)
        .ok_or_else(|| SyncError::conversion("precio_unitario", base.to_string()))?;
    Ok(round_half_up(gross, PRICE_DECIMALS))
}

/// Round `value` to `dp` places, midpoint away from zero.
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Parse decimal text such as `"110.5"`, `" 7 "` or `"1e-3"`.
pub fn parse_decimal(field: &'static str, raw: &str) -> Result<Decimal> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| SyncError::conversion(field, raw))
}

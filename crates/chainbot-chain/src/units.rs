//! Conversion between decimal amounts and integer base units.

use alloy::primitives::U256;
use chainbot_core::error::ChainError;
use rust_decimal::Decimal;

/// Largest mantissa a `Decimal` can hold (2^96 - 1).
const MAX_MANTISSA: u128 = (1u128 << 96) - 1;
const MAX_SCALE: u32 = 28;

/// `amount` expressed in the smallest unit of an asset with `decimals`
/// places. Fractions finer than one base unit are an error.
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<U256, ChainError> {
    if amount.is_sign_negative() {
        return Err(ChainError::InvalidAmount(format!("{amount} is negative")));
    }
    let amount = amount.normalize();
    let scale = amount.scale();
    let decimals = u32::from(decimals);
    if scale > decimals {
        return Err(ChainError::InvalidAmount(format!(
            "{amount} has more than {decimals} decimal places"
        )));
    }
    let mantissa = amount.mantissa().unsigned_abs();
    let factor = U256::from(10u8).pow(U256::from(decimals - scale));
    U256::from(mantissa)
        .checked_mul(factor)
        .ok_or_else(|| ChainError::InvalidAmount(format!("{amount} is too large")))
}

/// Base units back to a decimal amount. Values beyond `Decimal` precision
/// lose their lowest digits.
pub fn from_base_units(raw: U256, decimals: u8) -> Decimal {
    let mut raw = raw;
    let mut scale = u32::from(decimals);
    let ten = U256::from(10u8);
    while raw > U256::from(MAX_MANTISSA) || scale > MAX_SCALE {
        if scale == 0 {
            return Decimal::MAX;
        }
        raw /= ten;
        scale -= 1;
    }
    Decimal::from_i128_with_scale(raw.to::<u128>() as i128, scale).normalize()
}

/// Lamports to SOL.
pub fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(lamports), 9).normalize()
}

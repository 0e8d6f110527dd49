//! Fixed-point math helpers.
//!
//! All multiply-divide operations widen to U256 so intermediate products
//! never overflow; results are narrowed back with an explicit range check.
//!
//! Scales used across the protocol:
//! - Prices (`pf`, `p_r`, `px`) and collateral ratio: 1e9
//! - Oracle feed input: 1e6, converted once at ingestion
//! - Stability pool scale: 1e9 (`SCALE_FACTOR`)
//! - Stability pool reward index: 1e18
//! - Fees and bonuses: basis points (1e4)

use odra::casper_types::U256;

/// Internal price scale (1e9 = $1.00)
pub const PRICE_SCALE: u64 = 1_000_000_000;

/// Fixed fToken price ($1.00)
pub const PF: u64 = PRICE_SCALE;

/// Scale of prices submitted by oracle feeders (1e6 = $1.00)
pub const ORACLE_PRICE_SCALE: u64 = 1_000_000;

/// Conversion factor from oracle scale to internal price scale
pub const ORACLE_TO_INTERNAL: u64 = PRICE_SCALE / ORACLE_PRICE_SCALE;

/// Collateral ratio scale (1e9 = 100%)
pub const CR_SCALE: u64 = 1_000_000_000;

/// Stability pool scale factor (1e9)
pub const SCALE_FACTOR: u64 = 1_000_000_000;

/// Stability pool reward index scale (1e18)
pub const INDEX_SCALE: u128 = 1_000_000_000_000_000_000;

/// Basis points scale
pub const BPS_SCALE: u64 = 10_000;

/// `a * b / c`, rounded down. `None` on division by zero or if the result
/// does not fit in u64.
pub fn mul_div_down(a: u64, b: u64, c: u64) -> Option<u64> {
    if c == 0 {
        return None;
    }
    let result = U256::from(a) * U256::from(b) / U256::from(c);
    to_u64(result)
}

/// `a * b / c`, rounded up.
pub fn mul_div_up(a: u64, b: u64, c: u64) -> Option<u64> {
    if c == 0 {
        return None;
    }
    let product = U256::from(a) * U256::from(b);
    let divisor = U256::from(c);
    let mut result = product / divisor;
    if !(product % divisor).is_zero() {
        result += U256::one();
    }
    to_u64(result)
}

/// Wide `a * b / c`, rounded down. `None` on division by zero or overflow.
pub fn mul_div_wide(a: U256, b: U256, c: U256) -> Option<U256> {
    if c.is_zero() {
        return None;
    }
    a.checked_mul(b).map(|product| product / c)
}

/// Wide `a * b / c`, rounded up.
pub fn mul_div_wide_up(a: U256, b: U256, c: U256) -> Option<U256> {
    if c.is_zero() {
        return None;
    }
    let product = a.checked_mul(b)?;
    let result = product / c;
    if (product % c).is_zero() {
        Some(result)
    } else {
        result.checked_add(U256::one())
    }
}

/// Narrow a U256 to u64, `None` if out of range.
pub fn to_u64(value: U256) -> Option<u64> {
    if value > U256::from(u64::MAX) {
        None
    } else {
        Some(value.as_u64())
    }
}

/// Narrow a U256 to u64, clamping at `u64::MAX`.
pub fn saturating_u64(value: U256) -> u64 {
    to_u64(value).unwrap_or(u64::MAX)
}

/// Fee share of `amount` in basis points, rounded up (against the user).
pub fn bps_up(amount: u64, bps: u32) -> Option<u64> {
    mul_div_up(amount, bps as u64, BPS_SCALE)
}

/// Bonus share of `amount` in basis points, rounded down (in the user's favour).
pub fn bps_down(amount: u64, bps: u32) -> Option<u64> {
    mul_div_down(amount, bps as u64, BPS_SCALE)
}

/// USD value (1e9) of a reserve amount at `price` (1e9).
pub fn reserve_to_usd(amount_r: u64, price: u64) -> Option<u64> {
    mul_div_down(amount_r, price, PRICE_SCALE)
}

/// Convert an oracle price (1e6) to the internal price scale (1e9).
pub fn oracle_to_internal(price: u64) -> Option<u64> {
    price.checked_mul(ORACLE_TO_INTERNAL)
}

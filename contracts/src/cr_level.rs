//! Collateral-ratio level engine.
//!
//! Pure functions over the protocol balance sheet. Nothing here is cached:
//! callers re-evaluate on every operation so the level always reflects the
//! latest reserve, obligation and supply.
//!
//! CR = (reserve_r - sp_obligation_r) * p_r / (nf * pf), at 1e9.

use odra::casper_types::U256;
use crate::math::{self, CR_SCALE, PF, PRICE_SCALE};
use crate::types::CrLevel;

/// Normal mode threshold (130.6%)
pub const CR_T_L1: u64 = 1_306_000_000;

/// L1 / L2 boundary (120.6%)
pub const CR_T_L2: u64 = 1_206_000_000;

/// L2 / L3 boundary (114.4%)
pub const CR_T_L3: u64 = 1_144_000_000;

/// Reserve not owed to stability pool depositors.
pub fn net_reserve(reserve_r: u64, sp_obligation_r: u64) -> u64 {
    reserve_r.saturating_sub(sp_obligation_r)
}

/// Collateral ratio at 1e9. With no fToken outstanding the ratio is unbounded
/// and reported as `u64::MAX`.
pub fn collateral_ratio(reserve_r: u64, sp_obligation_r: u64, p_r: u64, nf: u64, pf: u64) -> u64 {
    if nf == 0 || pf == 0 {
        return u64::MAX;
    }
    let net = net_reserve(reserve_r, sp_obligation_r);
    let numerator = U256::from(net) * U256::from(p_r) * U256::from(CR_SCALE);
    let denominator = U256::from(nf) * U256::from(pf);
    math::saturating_u64(numerator / denominator)
}

/// Map a collateral ratio to its level.
pub fn level_for(cr: u64) -> CrLevel {
    if cr >= CR_T_L1 {
        CrLevel::Normal
    } else if cr >= CR_T_L2 {
        CrLevel::L1
    } else if cr >= CR_T_L3 {
        CrLevel::L2
    } else {
        CrLevel::L3
    }
}

/// Level of the given balance sheet.
pub fn current_level(reserve_r: u64, sp_obligation_r: u64, p_r: u64, nf: u64, pf: u64) -> CrLevel {
    level_for(collateral_ratio(reserve_r, sp_obligation_r, p_r, nf, pf))
}

/// xToken price implied by the balance sheet: the net reserve value left over
/// after fToken liabilities, per xToken. Returns `pf` while no xToken exists
/// and 0 once the reserve no longer covers the fToken liability.
pub fn x_price(reserve_r: u64, sp_obligation_r: u64, p_r: u64, nf: u64, nx: u64) -> u64 {
    if nx == 0 {
        return PF;
    }
    let net_usd = U256::from(net_reserve(reserve_r, sp_obligation_r)) * U256::from(p_r);
    let liability_usd = U256::from(nf) * U256::from(PF);
    if net_usd <= liability_usd {
        return 0;
    }
    // Both sides carry an extra PRICE_SCALE factor which the division by nx
    // (base units) leaves as the 1e9 price scale.
    math::saturating_u64((net_usd - liability_usd) / U256::from(nx))
}

/// fToken that must be retired, with the net reserve held constant, to bring
/// the ratio up to `target_cr`.
pub fn f_burn_needed_for_target(net_reserve_r: u64, p_r: u64, nf: u64, pf: u64, target_cr: u64) -> u64 {
    if target_cr == 0 || pf == 0 {
        return 0;
    }
    let numerator = U256::from(net_reserve_r) * U256::from(p_r) * U256::from(CR_SCALE);
    let denominator = U256::from(target_cr) * U256::from(pf);
    let nf_target = math::saturating_u64(numerator / denominator);
    nf.saturating_sub(nf_target)
}

/// Reserve units worth `f_amount` fToken at the reserve price.
pub fn f_to_reserve(f_amount: u64, p_r: u64) -> Option<u64> {
    math::mul_div_down(f_amount, PF, p_r)
}

/// Reserve value of `x_amount` xToken.
pub fn x_to_reserve(x_amount: u64, px: u64, p_r: u64) -> Option<u64> {
    math::mul_div_down(x_amount, px, p_r)
}

/// `units` whole tokens expressed in 9-decimal base units.
pub const fn whole(units: u64) -> u64 {
    units * PRICE_SCALE
}

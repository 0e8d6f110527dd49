//! CR-level fee and bonus schedule.
//!
//! Each level carries its own basis-point fee for the four user operations
//! and flags for which operations earn the stability bonus. Fees round up
//! (against the user), bonuses round down (in the user's favour).
//!
//! Default table:
//!
//! | Level  | mint_f     | mint_x            | redeem_f         | redeem_x |
//! |--------|------------|-------------------|------------------|----------|
//! | Normal | 50         | 50                | 50               | 50       |
//! | L1     | blocked    | 50 + 10 bonus     | 0                | 100      |
//! | L2, L3 | blocked    | 50 + 10 bonus     | 0 + 10 bonus     | 50       |

use crate::errors::LeafError;
use crate::math;
use crate::types::{CrLevel, FeeOp};

/// Upper bound for any configured fee (10%)
pub const MAX_FEE_BPS: u32 = 1_000;

/// Upper bound for the stability bonus (1%)
pub const MAX_BONUS_BPS: u32 = 100;

/// Default fee applied in Normal mode (0.5%)
const DEFAULT_FEE_BPS: u32 = 50;

/// Default stability bonus (0.1%)
const DEFAULT_BONUS_BPS: u32 = 10;

/// Fee schedule for a single CR level
#[odra::odra_type]
#[derive(Copy)]
pub struct LevelFees {
    pub mint_f_fee_bps: u32,
    pub mint_x_fee_bps: u32,
    pub redeem_f_fee_bps: u32,
    pub redeem_x_fee_bps: u32,
    /// xToken minting earns the stability bonus
    pub mint_x_bonus: bool,
    /// fToken redemption earns the stability bonus
    pub redeem_f_bonus: bool,
}

impl LevelFees {
    fn fee_bps(&self, op: FeeOp) -> u32 {
        match op {
            FeeOp::MintF => self.mint_f_fee_bps,
            FeeOp::MintX => self.mint_x_fee_bps,
            FeeOp::RedeemF => self.redeem_f_fee_bps,
            FeeOp::RedeemX => self.redeem_x_fee_bps,
        }
    }

    fn earns_bonus(&self, op: FeeOp) -> bool {
        match op {
            FeeOp::MintX => self.mint_x_bonus,
            FeeOp::RedeemF => self.redeem_f_bonus,
            FeeOp::MintF | FeeOp::RedeemX => false,
        }
    }

    fn is_valid(&self) -> bool {
        self.mint_f_fee_bps <= MAX_FEE_BPS
            && self.mint_x_fee_bps <= MAX_FEE_BPS
            && self.redeem_f_fee_bps <= MAX_FEE_BPS
            && self.redeem_x_fee_bps <= MAX_FEE_BPS
    }
}

/// Per-level fee table plus the single stability bonus rate
#[odra::odra_type]
pub struct FeeConfig {
    pub normal: LevelFees,
    pub l1: LevelFees,
    pub l2: LevelFees,
    pub l3: LevelFees,
    /// Bonus rate paid from the fee treasury on bonus-eligible operations
    pub stability_bonus_bps: u32,
}

impl Default for FeeConfig {
    fn default() -> Self {
        let stressed = LevelFees {
            mint_f_fee_bps: DEFAULT_FEE_BPS,
            mint_x_fee_bps: DEFAULT_FEE_BPS,
            redeem_f_fee_bps: 0,
            redeem_x_fee_bps: DEFAULT_FEE_BPS,
            mint_x_bonus: true,
            redeem_f_bonus: true,
        };
        Self {
            normal: LevelFees {
                mint_f_fee_bps: DEFAULT_FEE_BPS,
                mint_x_fee_bps: DEFAULT_FEE_BPS,
                redeem_f_fee_bps: DEFAULT_FEE_BPS,
                redeem_x_fee_bps: DEFAULT_FEE_BPS,
                mint_x_bonus: false,
                redeem_f_bonus: false,
            },
            l1: LevelFees {
                redeem_x_fee_bps: 100,
                redeem_f_bonus: false,
                ..stressed
            },
            l2: stressed,
            l3: stressed,
            stability_bonus_bps: DEFAULT_BONUS_BPS,
        }
    }
}

impl FeeConfig {
    /// Schedule for a level
    pub fn level(&self, level: CrLevel) -> &LevelFees {
        match level {
            CrLevel::Normal => &self.normal,
            CrLevel::L1 => &self.l1,
            CrLevel::L2 => &self.l2,
            CrLevel::L3 => &self.l3,
        }
    }

    pub fn fee_bps(&self, op: FeeOp, level: CrLevel) -> u32 {
        self.level(level).fee_bps(op)
    }

    pub fn bonus_bps(&self, op: FeeOp, level: CrLevel) -> u32 {
        if self.level(level).earns_bonus(op) {
            self.stability_bonus_bps
        } else {
            0
        }
    }

    /// Check every rate against its upper bound.
    pub fn validate(&self) -> Result<(), LeafError> {
        let levels_ok = [&self.normal, &self.l1, &self.l2, &self.l3]
            .iter()
            .all(|fees| fees.is_valid());
        if !levels_ok || self.stability_bonus_bps > MAX_BONUS_BPS {
            return Err(LeafError::InvalidConfig);
        }
        Ok(())
    }
}

/// Fee and bonus applied to a gross reserve amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeApplication {
    /// `gross - fee + bonus`
    pub net: u64,
    pub fee: u64,
    pub bonus: u64,
}

/// Price `gross` reserve units for `op` at `level`.
///
/// fToken minting is disabled outside Normal mode regardless of amount.
pub fn apply(config: &FeeConfig, op: FeeOp, level: CrLevel, gross: u64) -> Result<FeeApplication, LeafError> {
    if op == FeeOp::MintF && level != CrLevel::Normal {
        return Err(LeafError::ActionBlocked);
    }
    if gross == 0 {
        return Err(LeafError::InvalidAmount);
    }

    let fee = math::bps_up(gross, config.fee_bps(op, level)).ok_or(LeafError::MathOverflow)?;
    let bonus = math::bps_down(gross, config.bonus_bps(op, level)).ok_or(LeafError::MathOverflow)?;
    let net = gross
        .checked_sub(fee)
        .and_then(|after_fee| after_fee.checked_add(bonus))
        .ok_or(LeafError::MathOverflow)?;

    Ok(FeeApplication { net, fee, bonus })
}

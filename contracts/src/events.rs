//! On-chain events emitted by the protocol contracts.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::types::{CrLevel, FeeOp};

// ========== Protocol Core ==========

/// Initial 50/50 split mint
#[odra::event]
pub struct Bootstrapped {
    pub admin: Address,
    pub reserve_in: u64,
    pub f_minted: u64,
    pub x_minted: u64,
}

/// fToken or xToken minted against reserve
#[odra::event]
pub struct Minted {
    pub account: Address,
    pub op: FeeOp,
    pub level: CrLevel,
    pub reserve_in: u64,
    pub amount_out: u64,
    pub fee: u64,
    pub bonus: u64,
}

/// fToken or xToken redeemed for reserve
#[odra::event]
pub struct Redeemed {
    pub account: Address,
    pub op: FeeOp,
    pub level: CrLevel,
    pub amount_in: u64,
    pub reserve_out: u64,
    pub fee: u64,
    pub bonus: u64,
}

/// Reserve price accepted from a feeder
#[odra::event]
pub struct PriceUpdated {
    pub old_price: u64,
    pub new_price: u64,
    pub timestamp: u64,
}

/// L3 protocol rebalance executed
#[odra::event]
pub struct Rebalanced {
    pub keeper: Address,
    pub target_cr: u64,
    pub f_burned: u64,
    pub payout_r: u64,
    pub cr_after: u64,
}

/// External yield indexed into the stability pool
#[odra::event]
pub struct YieldHarvested {
    pub keeper: Address,
    pub yield_r: u64,
    pub bounty_r: u64,
    pub indexed_r: u64,
}

/// Reserve added without minting
#[odra::event]
pub struct Recapitalized {
    pub admin: Address,
    pub amount_r: u64,
    pub cr_after: u64,
}

/// Fee treasury withdrawal
#[odra::event]
pub struct TreasuryWithdrawn {
    pub recipient: Address,
    pub amount_r: u64,
}

/// Fee table replaced
#[odra::event]
pub struct FeeConfigUpdated {
    pub admin: Address,
}

/// Role granted or revoked
#[odra::event]
pub struct RoleChanged {
    pub role: u8,
    pub account: Address,
    pub granted: bool,
}

// ========== Stability Pool ==========

#[odra::event]
pub struct SpDeposited {
    pub depositor: Address,
    pub amount_f: u64,
    pub scaled: U256,
}

#[odra::event]
pub struct SpWithdrawn {
    pub depositor: Address,
    pub amount_f: u64,
    pub scaled: U256,
}

#[odra::event]
pub struct SpClaimed {
    pub depositor: Address,
    pub amount_r: u64,
}

/// Pro-rata burn with deferred reserve payout
#[odra::event]
pub struct SpRebalanced {
    pub f_burned: u64,
    pub payout_r: u64,
    pub new_scale: u64,
    pub new_index: U256,
}

#[odra::event]
pub struct SpRewardsIndexed {
    pub amount_r: u64,
    pub new_index: U256,
}

#[odra::event]
pub struct SpPositionClosed {
    pub depositor: Address,
}

// ========== Tokens ==========

#[odra::event]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub amount: U256,
}

#[odra::event]
pub struct Approval {
    pub owner: Address,
    pub spender: Address,
    pub amount: U256,
}

#[odra::event]
pub struct Mint {
    pub to: Address,
    pub amount: U256,
}

#[odra::event]
pub struct Burn {
    pub from: Address,
    pub amount: U256,
}

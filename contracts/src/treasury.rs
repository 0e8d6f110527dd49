//! Fee Treasury
//!
//! Tracks the reserve-denominated fee treasury inside the protocol core:
//! - Fees collected per operation type
//! - Stability bonuses paid out of collected fees
//! - Admin withdrawals
//!
//! The treasury is an accounting ledger only; the tokens themselves sit in
//! the protocol contract's reserve-token balance next to `reserve_r`.

use odra::prelude::*;
use crate::errors::LeafError;
use crate::types::FeeOp;

/// Fee treasury ledger (sub-module of the protocol core)
#[odra::module]
pub struct FeeTreasury {
    /// Current balance available for bonuses and withdrawals
    balance: Var<u64>,
    /// Total fees collected (all time)
    total_fees_collected: Var<u64>,
    /// Total bonuses paid (all time)
    total_bonuses_paid: Var<u64>,
    /// Total withdrawn by admin (all time)
    total_withdrawn: Var<u64>,
    /// Fee breakdown by operation
    mint_f_fees: Var<u64>,
    mint_x_fees: Var<u64>,
    redeem_f_fees: Var<u64>,
    redeem_x_fees: Var<u64>,
}

impl FeeTreasury {
    // ========== Fee Flows ==========

    /// Fail with `InsufficientBonusFunds` unless the current balance covers
    /// `bonus`. Checked before an operation mutates anything.
    pub fn ensure_bonus_covered(&self, bonus: u64) -> Result<(), LeafError> {
        if bonus > self.balance() {
            return Err(LeafError::InsufficientBonusFunds);
        }
        Ok(())
    }

    /// Book the fee and pay the bonus of a single operation.
    pub fn settle_operation(&mut self, op: FeeOp, fee: u64, bonus: u64) -> Result<(), LeafError> {
        self.ensure_bonus_covered(bonus)?;
        self.record_fee(op, fee)?;

        let balance = self.balance();
        // Covered above, and the fee only added to it
        self.balance.set(balance - bonus);
        let paid = self.get_total_bonuses_paid();
        self.total_bonuses_paid.set(paid.checked_add(bonus).ok_or(LeafError::MathOverflow)?);
        Ok(())
    }

    /// Remove `amount` for an admin withdrawal.
    pub fn withdraw(&mut self, amount: u64) -> Result<(), LeafError> {
        if amount == 0 {
            return Err(LeafError::InvalidAmount);
        }
        let balance = self.balance();
        if amount > balance {
            return Err(LeafError::InsufficientTreasury);
        }
        self.balance.set(balance - amount);
        let withdrawn = self.get_total_withdrawn();
        self.total_withdrawn.set(withdrawn.checked_add(amount).ok_or(LeafError::MathOverflow)?);
        Ok(())
    }

    // ========== View Functions ==========

    pub fn balance(&self) -> u64 {
        self.balance.get().unwrap_or(0)
    }

    pub fn get_total_fees_collected(&self) -> u64 {
        self.total_fees_collected.get().unwrap_or(0)
    }

    pub fn get_total_bonuses_paid(&self) -> u64 {
        self.total_bonuses_paid.get().unwrap_or(0)
    }

    pub fn get_total_withdrawn(&self) -> u64 {
        self.total_withdrawn.get().unwrap_or(0)
    }

    pub fn get_fee_breakdown(&self) -> FeeBreakdown {
        FeeBreakdown {
            mint_f: self.mint_f_fees.get().unwrap_or(0),
            mint_x: self.mint_x_fees.get().unwrap_or(0),
            redeem_f: self.redeem_f_fees.get().unwrap_or(0),
            redeem_x: self.redeem_x_fees.get().unwrap_or(0),
            bonuses_paid: self.get_total_bonuses_paid(),
            withdrawn: self.get_total_withdrawn(),
        }
    }

    // ========== Internal Functions ==========

    fn record_fee(&mut self, op: FeeOp, amount: u64) -> Result<(), LeafError> {
        if amount == 0 {
            return Ok(());
        }

        let balance = self.balance();
        self.balance.set(balance.checked_add(amount).ok_or(LeafError::MathOverflow)?);

        let total = self.get_total_fees_collected();
        self.total_fees_collected.set(total.checked_add(amount).ok_or(LeafError::MathOverflow)?);

        let bucket = match op {
            FeeOp::MintF => &mut self.mint_f_fees,
            FeeOp::MintX => &mut self.mint_x_fees,
            FeeOp::RedeemF => &mut self.redeem_f_fees,
            FeeOp::RedeemX => &mut self.redeem_x_fees,
        };
        let current = bucket.get().unwrap_or(0);
        bucket.set(current.checked_add(amount).ok_or(LeafError::MathOverflow)?);
        Ok(())
    }
}

/// Fee breakdown structure
#[odra::odra_type]
pub struct FeeBreakdown {
    /// Fees collected on fToken mints
    pub mint_f: u64,
    /// Fees collected on xToken mints
    pub mint_x: u64,
    /// Fees collected on fToken redemptions
    pub redeem_f: u64,
    /// Fees collected on xToken redemptions
    pub redeem_x: u64,
    /// Stability bonuses paid out
    pub bonuses_paid: u64,
    /// Withdrawn by admin
    pub withdrawn: u64,
}

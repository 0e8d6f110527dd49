//! Stability Pool Contract
//!
//! Depositors stake fToken to absorb under-collateralization. When the
//! protocol rebalances at L3, part of the pool's fToken is burned pro-rata and
//! the reserve owed for it is recorded as a deferred obligation, claimable by
//! depositors later.
//!
//! Key mechanics:
//! - Positions hold scaled shares; `actual = scaled * sp_scale / SCALE_FACTOR`
//! - A pro-rata burn shrinks `sp_scale`, so every depositor loses the same
//!   fraction without iterating positions
//! - Payouts accrue to a cumulative reward index (1e18 per scaled share);
//!   `pending = scaled * (index - snapshot) / 1e18`
//! - Every depositor action settles pending rewards into `claimable_r` first
//! - A single rebalance call burns at most 50% of the pool
//!
//! Only the controller (the protocol core) may rebalance or index rewards.
//! Claims are paid by the controller out of the protocol reserve.

use odra::prelude::*;
use odra::ContractRef;
use odra::casper_types::U256;
use crate::errors::{LeafError, OrRevert};
use crate::events::{
    SpClaimed, SpDeposited, SpPositionClosed, SpRebalanced, SpRewardsIndexed, SpWithdrawn,
};
use crate::interfaces::{self, Cep18TokenContractRef, ProtocolPayoutContractRef};
use crate::math::{self, BPS_SCALE, INDEX_SCALE, SCALE_FACTOR};
use crate::types::{PoolStats, SpPosition};

/// Maximum fraction of pool fToken burned per rebalance call (50%)
pub const SP_MAX_BURN_FRAC_BPS: u64 = 5_000;

/// Scale truncation may cost the remaining pool at most one part in this many
/// (or a single unit) beyond the burned fraction.
pub const SP_TRUNCATION_TOLERANCE: u64 = 1_000_000;

// ========== Pool Arithmetic ==========

/// fToken represented by `scaled` shares at `scale`.
pub fn scaled_to_f(scaled: U256, scale: u64) -> U256 {
    scaled * U256::from(scale) / U256::from(SCALE_FACTOR)
}

/// Shares minted for a deposit, rounded down.
pub fn f_to_scaled_down(amount: u64, scale: u64) -> Option<U256> {
    math::mul_div_wide(U256::from(amount), U256::from(SCALE_FACTOR), U256::from(scale))
}

/// Shares burned for a withdrawal, rounded up.
pub fn f_to_scaled_up(amount: u64, scale: u64) -> Option<U256> {
    math::mul_div_wide_up(U256::from(amount), U256::from(SCALE_FACTOR), U256::from(scale))
}

/// Reward accrued by `scaled` shares since `snapshot`.
pub fn pending_reward(scaled: U256, index: U256, snapshot: U256) -> U256 {
    scaled * index.saturating_sub(snapshot) / U256::from(INDEX_SCALE)
}

/// Largest burn a single rebalance may apply to a pool holding `f_total`.
pub fn burn_cap(f_total: u64) -> u64 {
    // 5_000 / 10_000 of a u64 always fits
    math::mul_div_down(f_total, SP_MAX_BURN_FRAC_BPS, BPS_SCALE).unwrap_or(0)
}

/// State change produced by one rebalance call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceOutcome {
    pub allowed_burn: u64,
    pub allowed_payout: u64,
    pub index_delta: U256,
    pub new_scale: u64,
}

impl RebalanceOutcome {
    fn none(scale: u64) -> Self {
        Self {
            allowed_burn: 0,
            allowed_payout: 0,
            index_delta: U256::zero(),
            new_scale: scale,
        }
    }
}

/// Clamp a burn request to the per-call cap, scale the payout down by the
/// same proportion and derive the new index delta and scale.
///
/// Returns the no-op outcome when the truncated scale would lose more than
/// `SP_TRUNCATION_TOLERANCE` allows.
pub fn compute_rebalance(
    scale: u64,
    scaled_total: U256,
    f_burn_requested: u64,
    payout_r_requested: u64,
) -> Result<RebalanceOutcome, LeafError> {
    let f_total_pre = math::to_u64(scaled_to_f(scaled_total, scale)).ok_or(LeafError::MathOverflow)?;
    if f_total_pre == 0 || f_burn_requested == 0 {
        return Ok(RebalanceOutcome::none(scale));
    }

    let allowed_burn = f_burn_requested.min(burn_cap(f_total_pre));
    if allowed_burn == 0 {
        return Ok(RebalanceOutcome::none(scale));
    }

    let allowed_payout = math::mul_div_down(payout_r_requested, allowed_burn, f_burn_requested)
        .ok_or(LeafError::MathOverflow)?;
    let index_delta = math::mul_div_wide(
        U256::from(allowed_payout),
        U256::from(INDEX_SCALE),
        scaled_total,
    )
    .ok_or(LeafError::MathOverflow)?;
    let f_after_target = f_total_pre - allowed_burn;
    let new_scale = math::mul_div_down(scale, f_after_target, f_total_pre)
        .ok_or(LeafError::MathOverflow)?;

    // A coarse scale would burn more than `allowed_burn` from every position
    let f_after = math::to_u64(scaled_to_f(scaled_total, new_scale)).ok_or(LeafError::MathOverflow)?;
    let loss = f_after_target.saturating_sub(f_after);
    if new_scale == 0 || (loss > 1 && loss > f_after_target / SP_TRUNCATION_TOLERANCE) {
        return Ok(RebalanceOutcome::none(scale));
    }

    Ok(RebalanceOutcome {
        allowed_burn,
        allowed_payout,
        index_delta,
        new_scale,
    })
}

// ========== Contract ==========

/// Stability Pool Contract
#[odra::module(events = [SpDeposited, SpWithdrawn, SpClaimed, SpRebalanced, SpRewardsIndexed, SpPositionClosed])]
pub struct StabilityPool {
    /// Deployer, allowed to wire the controller
    owner: Var<Address>,
    /// Protocol core contract address
    controller: Var<Address>,
    /// fToken contract address
    f_token: Var<Address>,

    // === Pool State ===
    /// Current scale (starts at SCALE_FACTOR, never increases)
    sp_scale: Var<u64>,
    /// Sum of all positions' scaled shares
    sp_scaled_total: Var<U256>,
    /// Cumulative reward per scaled share (1e18, never decreases)
    sp_index_r_scaled: Var<U256>,
    /// Reserve owed to depositors
    sp_obligation_r: Var<u64>,

    // === Depositor State ===
    positions: Mapping<Address, SpPosition>,
    open_positions: Mapping<Address, bool>,
    depositor_count: Var<u64>,

    // === Cumulative Stats ===
    total_burned_f: Var<u64>,
    total_indexed_r: Var<u64>,
    total_claimed_r: Var<u64>,
}

#[odra::module]
impl StabilityPool {
    /// Initialize the stability pool for an fToken
    pub fn init(&mut self, f_token: Address) {
        self.owner.set(self.env().caller());
        self.f_token.set(f_token);

        self.sp_scale.set(SCALE_FACTOR);
        self.sp_scaled_total.set(U256::zero());
        self.sp_index_r_scaled.set(U256::zero());
        self.sp_obligation_r.set(0);
        self.depositor_count.set(0);
    }

    /// Set the controller (post-deploy wiring, owner only)
    pub fn set_controller(&mut self, controller: Address) {
        if self.owner.get() != Some(self.env().caller()) {
            self.env().revert(LeafError::Unauthorized);
        }
        self.controller.set(controller);
    }

    // ========== Depositor Functions ==========

    /// Deposit fToken into the pool.
    /// Note: caller must have approved the pool to spend `amount` fToken.
    pub fn deposit_f(&mut self, amount: u64) {
        if amount == 0 {
            self.env().revert(LeafError::InvalidAmount);
        }
        let scale = self.get_scale();
        if scale == 0 {
            self.env().revert(LeafError::SpDepleted);
        }

        let depositor = self.env().caller();
        let mut position = self.settle_user(depositor);

        let scaled = f_to_scaled_down(amount, scale)
            .ok_or(LeafError::MathOverflow)
            .or_revert(&self.env());
        if scaled.is_zero() {
            self.env().revert(LeafError::InvalidAmount);
        }

        position.sp_scaled = position
            .sp_scaled
            .checked_add(scaled)
            .ok_or(LeafError::MathOverflow)
            .or_revert(&self.env());
        self.positions.set(&depositor, position);
        if !self.open_positions.get(&depositor).unwrap_or(false) {
            self.open_positions.set(&depositor, true);
            let count = self.depositor_count.get().unwrap_or(0);
            self.depositor_count.set(count.saturating_add(1));
        }

        let total = self
            .get_scaled_total()
            .checked_add(scaled)
            .ok_or(LeafError::MathOverflow)
            .or_revert(&self.env());
        self.sp_scaled_total.set(total);

        let pool = self.env().self_address();
        self.f_token()
            .transfer_from(depositor, pool, interfaces::to_token_amount(amount));

        self.env().emit_event(SpDeposited {
            depositor,
            amount_f: amount,
            scaled,
        });
    }

    /// Withdraw fToken from the pool
    pub fn withdraw_f(&mut self, amount: u64) {
        if amount == 0 {
            self.env().revert(LeafError::InvalidAmount);
        }

        let depositor = self.env().caller();
        let scale = self.get_scale();
        let mut position = self.settle_user(depositor);

        let actual = math::saturating_u64(scaled_to_f(position.sp_scaled, scale));
        if amount > actual {
            self.env().revert(LeafError::InsufficientSpBalance);
        }

        // Same scale as settlement; a full exit takes every share so no dust remains
        let scaled = if amount == actual {
            position.sp_scaled
        } else {
            let rounded = f_to_scaled_up(amount, scale)
                .ok_or(LeafError::MathOverflow)
                .or_revert(&self.env());
            rounded.min(position.sp_scaled)
        };

        position.sp_scaled -= scaled;
        self.positions.set(&depositor, position);

        let total = self.get_scaled_total();
        self.sp_scaled_total.set(total.saturating_sub(scaled));

        self.f_token()
            .transfer(depositor, interfaces::to_token_amount(amount));

        self.env().emit_event(SpWithdrawn {
            depositor,
            amount_f: amount,
            scaled,
        });
    }

    /// Claim settled reserve rewards. Returns the amount paid; 0 is a no-op.
    pub fn claim_rewards(&mut self) -> u64 {
        let depositor = self.env().caller();
        if self.positions.get(&depositor).is_none() {
            return 0;
        }

        let mut position = self.settle_user(depositor);
        let amount = position.claimable_r;
        position.claimable_r = 0;
        self.positions.set(&depositor, position);

        if amount == 0 {
            return 0;
        }

        let obligation = self.get_sp_obligation_amount();
        if amount > obligation {
            self.env().revert(LeafError::InvariantViolation);
        }
        self.sp_obligation_r.set(obligation - amount);
        let claimed = self.total_claimed_r.get().unwrap_or(0);
        self.total_claimed_r.set(claimed.saturating_add(amount));

        let controller = self.controller_address();
        ProtocolPayoutContractRef::new(self.env(), controller).pay_sp_claim(depositor, amount);

        self.env().emit_event(SpClaimed {
            depositor,
            amount_r: amount,
        });
        amount
    }

    /// Destroy an empty position
    pub fn close_position(&mut self) {
        let depositor = self.env().caller();
        if !self.open_positions.get(&depositor).unwrap_or(false) {
            self.env().revert(LeafError::SpNoPosition);
        }

        let position = self.settle_user(depositor);
        if !position.sp_scaled.is_zero() || position.claimable_r > 0 {
            self.env().revert(LeafError::SpPositionNotEmpty);
        }

        self.positions.set(&depositor, SpPosition::default());
        self.open_positions.set(&depositor, false);
        let count = self.depositor_count.get().unwrap_or(0);
        self.depositor_count.set(count.saturating_sub(1));

        self.env().emit_event(SpPositionClosed { depositor });
    }

    // ========== Controller Functions ==========

    /// Burn pool fToken pro-rata and record the reserve owed for it.
    ///
    /// The burn is clamped to 50% of the pool and the payout is scaled down
    /// in proportion. Returns `(allowed_burn, allowed_payout)`; `(0, 0)` when
    /// the pool is empty. The caller burns the returned fToken from the pool's
    /// token balance.
    pub fn controller_rebalance(&mut self, f_burn_requested: u64, payout_r_requested: u64) -> (u64, u64) {
        self.require_controller();

        let scale = self.get_scale();
        let outcome = compute_rebalance(
            scale,
            self.get_scaled_total(),
            f_burn_requested,
            payout_r_requested,
        )
        .or_revert(&self.env());
        if outcome.allowed_burn == 0 {
            return (0, 0);
        }

        let new_index = self
            .get_index()
            .checked_add(outcome.index_delta)
            .ok_or(LeafError::MathOverflow)
            .or_revert(&self.env());
        self.sp_index_r_scaled.set(new_index);

        let obligation = self.get_sp_obligation_amount();
        let new_obligation = obligation
            .checked_add(outcome.allowed_payout)
            .ok_or(LeafError::MathOverflow)
            .or_revert(&self.env());
        self.sp_obligation_r.set(new_obligation);
        self.sp_scale.set(outcome.new_scale);

        let burned = self.total_burned_f.get().unwrap_or(0);
        self.total_burned_f.set(burned.saturating_add(outcome.allowed_burn));
        let indexed = self.total_indexed_r.get().unwrap_or(0);
        self.total_indexed_r.set(indexed.saturating_add(outcome.allowed_payout));

        self.env().emit_event(SpRebalanced {
            f_burned: outcome.allowed_burn,
            payout_r: outcome.allowed_payout,
            new_scale: outcome.new_scale,
            new_index,
        });

        (outcome.allowed_burn, outcome.allowed_payout)
    }

    /// Index externally sourced reserve (harvested yield) as depositor rewards.
    /// Returns the amount indexed; 0 when the pool holds no shares.
    pub fn index_rewards(&mut self, amount_r: u64) -> u64 {
        self.require_controller();

        let scaled_total = self.get_scaled_total();
        if amount_r == 0 || scaled_total.is_zero() {
            return 0;
        }

        let delta = math::mul_div_wide(U256::from(amount_r), U256::from(INDEX_SCALE), scaled_total)
            .ok_or(LeafError::MathOverflow)
            .or_revert(&self.env());
        let new_index = self
            .get_index()
            .checked_add(delta)
            .ok_or(LeafError::MathOverflow)
            .or_revert(&self.env());
        self.sp_index_r_scaled.set(new_index);

        let obligation = self.get_sp_obligation_amount();
        let new_obligation = obligation
            .checked_add(amount_r)
            .ok_or(LeafError::MathOverflow)
            .or_revert(&self.env());
        self.sp_obligation_r.set(new_obligation);
        let indexed = self.total_indexed_r.get().unwrap_or(0);
        self.total_indexed_r.set(indexed.saturating_add(amount_r));

        self.env().emit_event(SpRewardsIndexed { amount_r, new_index });
        amount_r
    }

    // ========== Query Functions ==========

    /// Reserve currently owed to depositors
    pub fn get_sp_obligation_amount(&self) -> u64 {
        self.sp_obligation_r.get().unwrap_or(0)
    }

    /// fToken currently represented by all shares
    pub fn get_total_f(&self) -> u64 {
        math::saturating_u64(scaled_to_f(self.get_scaled_total(), self.get_scale()))
    }

    pub fn get_scale(&self) -> u64 {
        self.sp_scale.get().unwrap_or(SCALE_FACTOR)
    }

    pub fn get_index(&self) -> U256 {
        self.sp_index_r_scaled.get().unwrap_or(U256::zero())
    }

    pub fn get_scaled_total(&self) -> U256 {
        self.sp_scaled_total.get().unwrap_or(U256::zero())
    }

    /// Stored position, without unsettled rewards
    pub fn get_position(&self, depositor: Address) -> SpPosition {
        self.positions.get(&depositor).unwrap_or_default()
    }

    pub fn has_position(&self, depositor: Address) -> bool {
        self.open_positions.get(&depositor).unwrap_or(false)
    }

    /// Depositor's current fToken balance in the pool
    pub fn get_actual_balance(&self, depositor: Address) -> u64 {
        let position = self.get_position(depositor);
        math::saturating_u64(scaled_to_f(position.sp_scaled, self.get_scale()))
    }

    /// Claimable plus not-yet-settled rewards
    pub fn get_pending_rewards(&self, depositor: Address) -> u64 {
        let position = self.settle_user(depositor);
        position.claimable_r
    }

    /// Largest burn the next rebalance call would accept
    pub fn quote_burn_cap(&self) -> u64 {
        burn_cap(self.get_total_f())
    }

    /// Scaled shares a deposit of `amount` would mint at the current scale
    pub fn preview_deposit(&self, amount: u64) -> U256 {
        let scale = self.get_scale();
        if scale == 0 {
            return U256::zero();
        }
        f_to_scaled_down(amount, scale).unwrap_or_default()
    }

    pub fn get_pool_stats(&self) -> PoolStats {
        PoolStats {
            total_f: self.get_total_f(),
            scaled_total: self.get_scaled_total(),
            scale: self.get_scale(),
            index: self.get_index(),
            obligation_r: self.get_sp_obligation_amount(),
            depositor_count: self.depositor_count.get().unwrap_or(0),
            total_burned_f: self.total_burned_f.get().unwrap_or(0),
            total_indexed_r: self.total_indexed_r.get().unwrap_or(0),
            total_claimed_r: self.total_claimed_r.get().unwrap_or(0),
        }
    }

    pub fn get_controller(&self) -> Option<Address> {
        self.controller.get()
    }

    pub fn get_f_token(&self) -> Option<Address> {
        self.f_token.get()
    }

    // ========== Internal Functions ==========

    /// Move accrued rewards into `claimable_r` and advance the snapshot.
    /// Calling it twice without an index change adds nothing the second time.
    fn settle_user(&self, depositor: Address) -> SpPosition {
        let mut position = self.get_position(depositor);
        let index = self.get_index();
        let pending = pending_reward(position.sp_scaled, index, position.sp_index_snap);
        position.claimable_r = position
            .claimable_r
            .saturating_add(math::saturating_u64(pending));
        position.sp_index_snap = index;
        position
    }

    fn f_token(&self) -> Cep18TokenContractRef {
        match self.f_token.get() {
            Some(address) => Cep18TokenContractRef::new(self.env(), address),
            None => self.env().revert(LeafError::NotConfigured),
        }
    }

    fn controller_address(&self) -> Address {
        match self.controller.get() {
            Some(address) => address,
            None => self.env().revert(LeafError::NotConfigured),
        }
    }

    fn require_controller(&self) {
        if self.controller_address() != self.env().caller() {
            self.env().revert(LeafError::Unauthorized);
        }
    }
}

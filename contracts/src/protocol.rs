//! Leafsii Protocol Core
//!
//! Holds the reserve backing two tokens:
//! - fToken: stable leg, always priced at `pf` ($1.00)
//! - xToken: leveraged leg, priced at whatever reserve value is left after
//!   the fToken liability (`px`)
//!
//! ## Operations
//!
//! - Mint/redeem of either leg, priced by the fee policy at the level observed
//!   before the operation
//! - Oracle updates guarded by staleness and per-update step checks
//! - L3 rebalance: burn fToken from the stability pool, owe depositors reserve
//! - Yield harvest into the stability pool index
//!
//! The reserve owed to stability pool depositors (`sp_obligation_r`) is held in
//! `reserve_r` but excluded from the collateral ratio and from redemptions.

use odra::prelude::*;
use odra::ContractRef;
use odra::casper_types::U256;
use crate::access_control::AccessControl;
use crate::cr_level;
use crate::errors::{LeafError, OrRevert};
use crate::events::{
    Bootstrapped, FeeConfigUpdated, Minted, PriceUpdated, Rebalanced, Recapitalized, Redeemed,
    RoleChanged, TreasuryWithdrawn, YieldHarvested,
};
use crate::fee_policy::{self, FeeApplication, FeeConfig};
use crate::interfaces::{self, Cep18TokenContractRef, StabilityPoolControllerContractRef};
use crate::math::{self, BPS_SCALE, PF};
use crate::oracle_adapter::{OracleConfig, PriceFeed};
use crate::treasury::{FeeBreakdown, FeeTreasury};
use crate::types::{CrLevel, FeeOp, OperationQuote, OracleStatus, ProtocolState};

/// Maximum fraction of outstanding fToken burned by one rebalance (50%)
pub const MAX_F_BURN_FRACTION_BPS: u64 = 5_000;

/// Share of harvested yield kept by the harvesting keeper (1%)
pub const HARVEST_BOUNTY_BPS: u32 = 100;

const MILLIS_PER_SECOND: u64 = 1_000;

/// Mint or redeem priced against the current balance sheet
#[derive(Debug, Clone, Copy)]
struct PricedOperation {
    level: CrLevel,
    /// Reserve moved before fees (reserve in for mints, reserve value out for redeems)
    gross_r: u64,
    fees: FeeApplication,
    /// Tokens minted, or reserve paid out
    amount_out: u64,
}

/// Leafsii Protocol Core Contract
#[odra::module(events = [
    Bootstrapped, Minted, Redeemed, PriceUpdated, Rebalanced, YieldHarvested,
    Recapitalized, TreasuryWithdrawn, FeeConfigUpdated, RoleChanged
])]
pub struct LeafsiiProtocol {
    access: SubModule<AccessControl>,
    treasury: SubModule<FeeTreasury>,
    price_feed: SubModule<PriceFeed>,

    // === Wiring ===
    reserve_token: Var<Address>,
    f_token: Var<Address>,
    x_token: Var<Address>,
    stability_pool: Var<Address>,

    // === Balance Sheet ===
    /// Outstanding fToken
    nf: Var<u64>,
    /// Outstanding xToken
    nx: Var<u64>,
    /// Reserve backing both legs, including the stability pool obligation
    reserve_r: Var<u64>,

    fee_config: Var<FeeConfig>,
    bootstrapped: Var<bool>,
}

#[odra::module]
impl LeafsiiProtocol {
    /// Initialize the protocol; the deployer becomes the first admin.
    pub fn init(&mut self, reserve_token: Address, f_token: Address, x_token: Address) {
        let admin = self.env().caller();
        self.access.init(admin);
        self.price_feed.init(OracleConfig::default());

        self.reserve_token.set(reserve_token);
        self.f_token.set(f_token);
        self.x_token.set(x_token);

        self.nf.set(0);
        self.nx.set(0);
        self.reserve_r.set(0);
        self.fee_config.set(FeeConfig::default());
        self.bootstrapped.set(false);
    }

    // ========== Admin Functions ==========

    pub fn set_stability_pool(&mut self, pool: Address) {
        self.require_admin();
        self.stability_pool.set(pool);
    }

    pub fn grant_role(&mut self, role: u8, account: Address) {
        self.require_admin();
        let changed = self.access.grant(role, account).or_revert(&self.env());
        if changed {
            self.env().emit_event(RoleChanged { role, account, granted: true });
        }
    }

    pub fn revoke_role(&mut self, role: u8, account: Address) {
        self.require_admin();
        let changed = self.access.revoke(role, account).or_revert(&self.env());
        if changed {
            self.env().emit_event(RoleChanged { role, account, granted: false });
        }
    }

    /// Drop a role held by the caller.
    pub fn renounce_role(&mut self, role: u8) {
        let account = self.env().caller();
        let changed = self.access.revoke(role, account).or_revert(&self.env());
        if changed {
            self.env().emit_event(RoleChanged { role, account, granted: false });
        }
    }

    pub fn set_fee_config(&mut self, config: FeeConfig) {
        self.require_admin();
        config.validate().or_revert(&self.env());
        self.fee_config.set(config);
        self.env().emit_event(FeeConfigUpdated { admin: self.env().caller() });
    }

    pub fn set_oracle_config(&mut self, config: OracleConfig) {
        self.require_admin();
        self.price_feed.set_config(config).or_revert(&self.env());
    }

    /// Pay out of the fee treasury.
    pub fn withdraw_treasury(&mut self, recipient: Address, amount: u64) {
        self.require_admin();
        self.treasury.withdraw(amount).or_revert(&self.env());
        self.reserve_token()
            .transfer(recipient, interfaces::to_token_amount(amount));

        self.env().emit_event(TreasuryWithdrawn { recipient, amount_r: amount });
    }

    /// Add reserve without minting anything, raising the collateral ratio.
    pub fn recapitalize(&mut self, amount: u64) {
        self.require_admin();
        if amount == 0 {
            self.env().revert(LeafError::InvalidAmount);
        }
        let admin = self.env().caller();
        let reserve = self.add_reserve(amount);
        self.pull_reserve(admin, amount);

        let cr_after = cr_level::collateral_ratio(
            reserve,
            self.get_sp_obligation_amount(),
            self.price_feed.price(),
            self.get_nf(),
            PF,
        );
        self.env().emit_event(Recapitalized {
            admin,
            amount_r: amount,
            cr_after,
        });
    }

    /// Seed the protocol: the USD value of `initial_reserve` is split evenly
    /// between fToken and xToken at $1.00 each and minted to the caller.
    pub fn bootstrap(&mut self, initial_reserve: u64) {
        self.require_admin();
        if self.is_bootstrapped() {
            self.env().revert(LeafError::AlreadyBootstrapped);
        }
        if initial_reserve == 0 {
            self.env().revert(LeafError::InvalidAmount);
        }
        let p_r = self.price_feed.fresh_price(self.now()).or_revert(&self.env());

        let value = math::reserve_to_usd(initial_reserve, p_r)
            .ok_or(LeafError::MathOverflow)
            .or_revert(&self.env());
        let f_minted = value / 2;
        let x_minted = value - f_minted;
        if f_minted == 0 || x_minted == 0 {
            self.env().revert(LeafError::InvalidAmount);
        }

        let admin = self.env().caller();
        self.reserve_r.set(initial_reserve);
        self.nf.set(f_minted);
        self.nx.set(x_minted);
        self.bootstrapped.set(true);

        self.pull_reserve(admin, initial_reserve);
        self.f_token().mint(admin, interfaces::to_token_amount(f_minted));
        self.x_token().mint(admin, interfaces::to_token_amount(x_minted));

        self.env().emit_event(Bootstrapped {
            admin,
            reserve_in: initial_reserve,
            f_minted,
            x_minted,
        });
    }

    // ========== Oracle ==========

    /// Accept a reserve price (1e6 scale) observed at `timestamp` (seconds).
    /// A rejected update leaves the previous price in effect.
    pub fn update_price(&mut self, price: u64, timestamp: u64) {
        let caller = self.env().caller();
        self.access.require_oracle(caller).or_revert(&self.env());

        let now = self.now();
        let (old_price, new_price) = self
            .price_feed
            .submit(price, timestamp, now)
            .or_revert(&self.env());

        self.env().emit_event(PriceUpdated {
            old_price,
            new_price,
            timestamp,
        });
    }

    // ========== User Operations ==========

    /// Deposit reserve for fToken. Normal level only.
    pub fn mint_f(&mut self, reserve_in: u64, min_f_out: u64) -> u64 {
        self.execute_mint(FeeOp::MintF, reserve_in, min_f_out)
    }

    /// Deposit reserve for xToken.
    pub fn mint_x(&mut self, reserve_in: u64, min_x_out: u64) -> u64 {
        self.execute_mint(FeeOp::MintX, reserve_in, min_x_out)
    }

    /// Burn fToken for reserve at $1.00 per fToken.
    pub fn redeem_f(&mut self, f_in: u64, min_reserve_out: u64) -> u64 {
        self.execute_redeem(FeeOp::RedeemF, f_in, min_reserve_out)
    }

    /// Burn xToken for reserve at the current `px`.
    pub fn redeem_x(&mut self, x_in: u64, min_reserve_out: u64) -> u64 {
        self.execute_redeem(FeeOp::RedeemX, x_in, min_reserve_out)
    }

    // ========== Keeper Functions ==========

    /// Burn fToken held by the stability pool until the collateral ratio
    /// reaches `target_cr`, owing depositors the reserve value burned.
    ///
    /// Returns `(f_burned, payout_r)`; `(0, 0)` when the price is stale or
    /// unavailable, when the protocol is not at L3, or when nothing can burn.
    pub fn protocol_rebalance_l3_to_target(&mut self, target_cr: u64) -> (u64, u64) {
        let keeper = self.env().caller();
        self.access.require_keeper(keeper).or_revert(&self.env());
        if target_cr == 0 {
            self.env().revert(LeafError::InvalidAmount);
        }
        let pool_address = self.pool_address();

        let p_r = match self.price_feed.fresh_price(self.now()) {
            Ok(price) => price,
            Err(_) => return (0, 0),
        };
        let nf = self.get_nf();
        if nf == 0 {
            return (0, 0);
        }

        let mut pool = StabilityPoolControllerContractRef::new(self.env(), pool_address);
        let reserve = self.get_reserve_r();
        let obligation = pool.get_sp_obligation_amount();
        if cr_level::current_level(reserve, obligation, p_r, nf, PF) != CrLevel::L3 {
            return (0, 0);
        }

        let net = cr_level::net_reserve(reserve, obligation);
        let need = cr_level::f_burn_needed_for_target(net, p_r, nf, PF, target_cr);
        let protocol_cap = math::mul_div_down(nf, MAX_F_BURN_FRACTION_BPS, BPS_SCALE).unwrap_or(0);
        let f_burn = need.min(protocol_cap);
        if f_burn == 0 {
            return (0, 0);
        }
        let payout = cr_level::f_to_reserve(f_burn, p_r)
            .ok_or(LeafError::MathOverflow)
            .or_revert(&self.env())
            .min(net);

        let (f_burned, payout_r) = pool.controller_rebalance(f_burn, payout);
        if f_burned == 0 {
            return (0, 0);
        }

        let nf_after = nf - f_burned;
        self.nf.set(nf_after);
        self.f_token()
            .burn_from(pool_address, interfaces::to_token_amount(f_burned));

        let obligation_after = pool.get_sp_obligation_amount();
        if obligation_after > reserve {
            self.env().revert(LeafError::InsufficientReserve);
        }

        let cr_after = cr_level::collateral_ratio(reserve, obligation_after, p_r, nf_after, PF);
        self.env().emit_event(Rebalanced {
            keeper,
            target_cr,
            f_burned,
            payout_r,
            cr_after,
        });
        (f_burned, payout_r)
    }

    /// Index external yield into the stability pool. The keeper keeps
    /// `HARVEST_BOUNTY_BPS` of `yield_r`; the rest is pulled from the keeper
    /// into the reserve and owed to depositors. Returns the bounty, or 0 when
    /// the pool has no stake and nothing is pulled.
    pub fn harvest_yield(&mut self, yield_r: u64) -> u64 {
        let keeper = self.env().caller();
        self.access.require_keeper(keeper).or_revert(&self.env());
        if yield_r == 0 {
            self.env().revert(LeafError::InvalidAmount);
        }
        let pool_address = self.pool_address();

        let bounty = math::bps_down(yield_r, HARVEST_BOUNTY_BPS).unwrap_or(0);
        let to_pool = yield_r - bounty;
        if to_pool == 0 {
            return 0;
        }

        let indexed = StabilityPoolControllerContractRef::new(self.env(), pool_address)
            .index_rewards(to_pool);
        if indexed == 0 {
            return 0;
        }

        self.add_reserve(indexed);
        self.pull_reserve(keeper, indexed);

        self.env().emit_event(YieldHarvested {
            keeper,
            yield_r,
            bounty_r: bounty,
            indexed_r: indexed,
        });
        bounty
    }

    // ========== Stability Pool Hook ==========

    /// Release reserve for a stability pool claim. The pool has already
    /// reduced its obligation by `amount_r`.
    pub fn pay_sp_claim(&mut self, recipient: Address, amount_r: u64) {
        if Some(self.env().caller()) != self.stability_pool.get() {
            self.env().revert(LeafError::Unauthorized);
        }
        let reserve = self.get_reserve_r();
        if amount_r > reserve {
            self.env().revert(LeafError::InsufficientReserve);
        }
        self.reserve_r.set(reserve - amount_r);
        self.reserve_token()
            .transfer(recipient, interfaces::to_token_amount(amount_r));
    }

    // ========== View Functions ==========

    pub fn get_protocol_state(&self) -> ProtocolState {
        let nf = self.get_nf();
        let nx = self.get_nx();
        let reserve_r = self.get_reserve_r();
        let sp_obligation_r = self.get_sp_obligation_amount();
        let p_r = self.price_feed.price();
        let cr = cr_level::collateral_ratio(reserve_r, sp_obligation_r, p_r, nf, PF);

        ProtocolState {
            nf,
            nx,
            pf: PF,
            px: cr_level::x_price(reserve_r, sp_obligation_r, p_r, nf, nx),
            p_r,
            reserve_r,
            treasury_r: self.treasury.balance(),
            sp_obligation_r,
            last_oracle_ts: self.price_feed.last_update(),
            cr,
            level: cr_level::level_for(cr),
        }
    }

    /// Reserve currently owed to stability pool depositors.
    pub fn get_sp_obligation_amount(&self) -> u64 {
        match self.stability_pool.get() {
            Some(pool) => StabilityPoolControllerContractRef::new(self.env(), pool)
                .get_sp_obligation_amount(),
            None => 0,
        }
    }

    /// True when the reserve covers the pool obligation, token supplies match
    /// the ledger and the reserve-token balance covers reserve plus treasury.
    pub fn check_invariant(&self) -> bool {
        let reserve = self.get_reserve_r();
        if reserve < self.get_sp_obligation_amount() {
            return false;
        }
        if self.f_token().total_supply() != U256::from(self.get_nf())
            || self.x_token().total_supply() != U256::from(self.get_nx())
        {
            return false;
        }
        let held = self.reserve_token().balance_of(self.env().self_address());
        held >= U256::from(reserve) + U256::from(self.treasury.balance())
    }

    pub fn collateral_ratio(&self) -> u64 {
        self.get_protocol_state().cr
    }

    pub fn current_level(&self) -> CrLevel {
        self.get_protocol_state().level
    }

    /// Price an operation exactly as execution would, without executing it.
    pub fn quote(&self, op: FeeOp, amount: u64) -> OperationQuote {
        let priced = self.price_operation(op, amount).or_revert(&self.env());
        OperationQuote {
            amount_out: priced.amount_out,
            fee: priced.fees.fee,
            bonus: priced.fees.bonus,
            level: priced.level,
        }
    }

    pub fn get_oracle_status(&self) -> OracleStatus {
        self.price_feed.status(self.now())
    }

    pub fn get_oracle_config(&self) -> OracleConfig {
        self.price_feed.get_config()
    }

    pub fn get_fee_config(&self) -> FeeConfig {
        self.fee_config.get().unwrap_or_default()
    }

    pub fn get_fee_breakdown(&self) -> FeeBreakdown {
        self.treasury.get_fee_breakdown()
    }

    pub fn get_treasury_balance(&self) -> u64 {
        self.treasury.balance()
    }

    pub fn has_role(&self, role: u8, account: Address) -> bool {
        self.access.has_role(role, account)
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped.get().unwrap_or(false)
    }

    pub fn get_nf(&self) -> u64 {
        self.nf.get().unwrap_or(0)
    }

    pub fn get_nx(&self) -> u64 {
        self.nx.get().unwrap_or(0)
    }

    pub fn get_reserve_r(&self) -> u64 {
        self.reserve_r.get().unwrap_or(0)
    }

    /// Block time in seconds, the clock oracle timestamps are checked against
    pub fn get_block_time_secs(&self) -> u64 {
        self.now()
    }

    pub fn get_stability_pool(&self) -> Option<Address> {
        self.stability_pool.get()
    }

    pub fn get_reserve_token(&self) -> Option<Address> {
        self.reserve_token.get()
    }

    pub fn get_f_token(&self) -> Option<Address> {
        self.f_token.get()
    }

    pub fn get_x_token(&self) -> Option<Address> {
        self.x_token.get()
    }

    // ========== Internal Functions ==========

    fn execute_mint(&mut self, op: FeeOp, reserve_in: u64, min_out: u64) -> u64 {
        let account = self.env().caller();
        let priced = self.price_operation(op, reserve_in).or_revert(&self.env());
        if priced.amount_out < min_out {
            self.env().revert(LeafError::SlippageExceeded);
        }

        self.treasury
            .settle_operation(op, priced.fees.fee, priced.fees.bonus)
            .or_revert(&self.env());
        self.add_reserve(priced.fees.net);
        if op == FeeOp::MintF {
            let nf = self
                .get_nf()
                .checked_add(priced.amount_out)
                .ok_or(LeafError::MathOverflow)
                .or_revert(&self.env());
            self.nf.set(nf);
        } else {
            let nx = self
                .get_nx()
                .checked_add(priced.amount_out)
                .ok_or(LeafError::MathOverflow)
                .or_revert(&self.env());
            self.nx.set(nx);
        }

        self.pull_reserve(account, reserve_in);
        let minted = interfaces::to_token_amount(priced.amount_out);
        match op {
            FeeOp::MintF => self.f_token().mint(account, minted),
            _ => self.x_token().mint(account, minted),
        }

        self.env().emit_event(Minted {
            account,
            op,
            level: priced.level,
            reserve_in,
            amount_out: priced.amount_out,
            fee: priced.fees.fee,
            bonus: priced.fees.bonus,
        });
        priced.amount_out
    }

    fn execute_redeem(&mut self, op: FeeOp, amount_in: u64, min_out: u64) -> u64 {
        let account = self.env().caller();
        let priced = self.price_operation(op, amount_in).or_revert(&self.env());
        if priced.amount_out < min_out {
            self.env().revert(LeafError::SlippageExceeded);
        }

        self.treasury
            .settle_operation(op, priced.fees.fee, priced.fees.bonus)
            .or_revert(&self.env());
        // gross_r was checked against the free reserve while pricing
        let reserve = self.get_reserve_r() - priced.gross_r;
        self.reserve_r.set(reserve);
        let burned = interfaces::to_token_amount(amount_in);
        match op {
            FeeOp::RedeemF => {
                let nf = self.get_nf() - amount_in;
                self.nf.set(nf);
                self.f_token().burn_from(account, burned);
            }
            _ => {
                let nx = self.get_nx() - amount_in;
                self.nx.set(nx);
                self.x_token().burn_from(account, burned);
            }
        }

        self.reserve_token()
            .transfer(account, interfaces::to_token_amount(priced.amount_out));

        self.env().emit_event(Redeemed {
            account,
            op,
            level: priced.level,
            amount_in,
            reserve_out: priced.amount_out,
            fee: priced.fees.fee,
            bonus: priced.fees.bonus,
        });
        priced.amount_out
    }

    /// Shared pricing path for quotes and execution. Uses the level observed
    /// before the operation.
    fn price_operation(&self, op: FeeOp, amount: u64) -> Result<PricedOperation, LeafError> {
        if !self.is_bootstrapped() {
            return Err(LeafError::NotBootstrapped);
        }
        let p_r = self.price_feed.fresh_price(self.now())?;

        let nf = self.get_nf();
        let nx = self.get_nx();
        let reserve = self.get_reserve_r();
        let obligation = self.get_sp_obligation_amount();
        let level = cr_level::current_level(reserve, obligation, p_r, nf, PF);
        let px = cr_level::x_price(reserve, obligation, p_r, nf, nx);
        let config = self.get_fee_config();

        let (gross_r, fees, amount_out) = match op {
            FeeOp::MintF => {
                let fees = fee_policy::apply(&config, op, level, amount)?;
                let out = math::mul_div_down(fees.net, p_r, PF).ok_or(LeafError::MathOverflow)?;
                nf.checked_add(out).ok_or(LeafError::MathOverflow)?;
                (amount, fees, out)
            }
            FeeOp::MintX => {
                if px == 0 {
                    return Err(LeafError::ActionBlocked);
                }
                let fees = fee_policy::apply(&config, op, level, amount)?;
                let out = math::mul_div_down(fees.net, p_r, px).ok_or(LeafError::MathOverflow)?;
                nx.checked_add(out).ok_or(LeafError::MathOverflow)?;
                (amount, fees, out)
            }
            FeeOp::RedeemF | FeeOp::RedeemX => {
                let (supply, gross) = if op == FeeOp::RedeemF {
                    (nf, cr_level::f_to_reserve(amount, p_r))
                } else {
                    (nx, cr_level::x_to_reserve(amount, px, p_r))
                };
                if amount > supply {
                    return Err(LeafError::InsufficientTokenBalance);
                }
                let gross = gross.ok_or(LeafError::MathOverflow)?;
                let fees = fee_policy::apply(&config, op, level, gross)?;
                if gross > cr_level::net_reserve(reserve, obligation) {
                    return Err(LeafError::InsufficientReserve);
                }
                (gross, fees, fees.net)
            }
        };

        if amount_out == 0 {
            return Err(LeafError::InvalidAmount);
        }
        self.treasury.ensure_bonus_covered(fees.bonus)?;

        Ok(PricedOperation {
            level,
            gross_r,
            fees,
            amount_out,
        })
    }

    fn add_reserve(&mut self, amount: u64) -> u64 {
        let reserve = self
            .get_reserve_r()
            .checked_add(amount)
            .ok_or(LeafError::MathOverflow)
            .or_revert(&self.env());
        self.reserve_r.set(reserve);
        reserve
    }

    /// Pull reserve tokens from `owner`, who must have approved this contract.
    fn pull_reserve(&mut self, owner: Address, amount: u64) {
        let protocol = self.env().self_address();
        self.reserve_token()
            .transfer_from(owner, protocol, interfaces::to_token_amount(amount));
    }

    fn require_admin(&self) {
        let caller = self.env().caller();
        self.access.require_admin(caller).or_revert(&self.env());
    }

    fn now(&self) -> u64 {
        self.env().get_block_time() / MILLIS_PER_SECOND
    }

    fn pool_address(&self) -> Address {
        self.stability_pool
            .get()
            .ok_or(LeafError::NotConfigured)
            .or_revert(&self.env())
    }

    fn reserve_token(&self) -> Cep18TokenContractRef {
        self.token_ref(self.reserve_token.get())
    }

    fn f_token(&self) -> Cep18TokenContractRef {
        self.token_ref(self.f_token.get())
    }

    fn x_token(&self) -> Cep18TokenContractRef {
        self.token_ref(self.x_token.get())
    }

    fn token_ref(&self, address: Option<Address>) -> Cep18TokenContractRef {
        let address = address.ok_or(LeafError::NotConfigured).or_revert(&self.env());
        Cep18TokenContractRef::new(self.env(), address)
    }
}

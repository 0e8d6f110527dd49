//! Common types used across the protocol.

use odra::casper_types::U256;

/// Collateral-ratio level
#[odra::odra_type]
#[derive(Copy, Default, PartialOrd, Ord)]
pub enum CrLevel {
    /// CR >= CR_T_L1, every operation allowed
    #[default]
    Normal,
    /// CR_T_L2 <= CR < CR_T_L1
    L1,
    /// CR_T_L3 <= CR < CR_T_L2
    L2,
    /// CR < CR_T_L3, protocol rebalance enabled
    L3,
}

/// User operation priced by the fee policy
#[odra::odra_type]
#[derive(Copy)]
pub enum FeeOp {
    MintF,
    MintX,
    RedeemF,
    RedeemX,
}

/// Oracle price status
#[odra::odra_type]
#[derive(Copy)]
pub enum OracleStatus {
    /// Price is valid and fresh
    Ok,
    /// No price has been submitted yet
    Unavailable,
    /// Price age >= max staleness
    Stale,
    /// Price moved more than the max relative step
    Step,
}

/// Snapshot of the protocol balance sheet.
///
/// Prices and `cr` are at 1e9, amounts in base units.
#[odra::odra_type]
pub struct ProtocolState {
    /// Outstanding fToken supply
    pub nf: u64,
    /// Outstanding xToken supply
    pub nx: u64,
    /// fToken price (fixed $1.00)
    pub pf: u64,
    /// Derived xToken price
    pub px: u64,
    /// Latest reserve price
    pub p_r: u64,
    /// Reserve held for fToken/xToken holders
    pub reserve_r: u64,
    /// Fee treasury balance
    pub treasury_r: u64,
    /// Reserve owed to stability pool depositors
    pub sp_obligation_r: u64,
    /// Timestamp (seconds) of the last accepted price
    pub last_oracle_ts: u64,
    /// Collateral ratio
    pub cr: u64,
    /// Level derived from `cr`
    pub level: CrLevel,
}

/// Result of pricing a mint or redeem
#[odra::odra_type]
pub struct OperationQuote {
    /// Tokens (mint) or reserve (redeem) the user receives
    pub amount_out: u64,
    /// Fee charged, in reserve units
    pub fee: u64,
    /// Bonus paid from the fee treasury, in reserve units
    pub bonus: u64,
    /// Level the quote was priced at
    pub level: CrLevel,
}

/// Stability pool position
#[odra::odra_type]
#[derive(Default)]
pub struct SpPosition {
    /// Scaled share balance
    pub sp_scaled: U256,
    /// Reward index at last settlement
    pub sp_index_snap: U256,
    /// Settled, unclaimed reserve rewards
    pub claimable_r: u64,
}

/// Stability pool aggregate statistics
#[odra::odra_type]
pub struct PoolStats {
    /// Current fToken held on behalf of depositors
    pub total_f: u64,
    /// Sum of scaled shares
    pub scaled_total: U256,
    /// Current scale (1e9 at launch)
    pub scale: u64,
    /// Cumulative reward index (1e18)
    pub index: U256,
    /// Outstanding reserve obligation
    pub obligation_r: u64,
    /// Number of open positions
    pub depositor_count: u64,
    /// fToken burned by rebalances (all time)
    pub total_burned_f: u64,
    /// Reserve indexed as rewards (all time)
    pub total_indexed_r: u64,
    /// Reserve claimed by depositors (all time)
    pub total_claimed_r: u64,
}

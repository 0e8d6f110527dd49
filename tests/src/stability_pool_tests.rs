//! Stability pool deposits, L3 rebalance, reward claims and yield harvest.

use odra::casper_types::U256;
use odra::host::HostRef;
use odra::prelude::Addressable;
use pretty_assertions::assert_eq;

use leafsii_contracts::cr_level::{whole, CR_T_L1};
use leafsii_contracts::errors::LeafError;
use leafsii_contracts::types::CrLevel;

use crate::fixture::{Fixture, ACCOUNT_FUNDING, BOOTSTRAP_RESERVE};

const L3_PRICE_PATH: [u64; 4] = [1_650_000, 1_400_000, 1_180_000, 1_100_000];

const EXPECTED_BURN: u64 = 157_733_537_520;
const EXPECTED_PAYOUT: u64 = 143_394_125_018;
const EXPECTED_SCALE: u64 = 605_666_156;
const ALICE_REWARD: u64 = 107_545_593_763;
const BOB_REWARD: u64 = 35_848_531_254;

/// Alice stakes 300 fToken and Bob 100, then the price falls to $1.10 (L3).
fn staked_at_l3() -> Fixture {
    let mut fx = Fixture::setup();
    let (alice, bob) = (fx.alice, fx.bob);
    fx.deposit(alice, whole(300));
    fx.deposit(bob, whole(100));
    fx.walk_price(&L3_PRICE_PATH);
    assert_eq!(fx.protocol.current_level(), CrLevel::L3);
    fx
}

/// `staked_at_l3` after a keeper rebalance towards the L1 threshold.
fn rebalanced() -> Fixture {
    let mut fx = staked_at_l3();
    fx.env.set_caller(fx.keeper);
    fx.protocol.protocol_rebalance_l3_to_target(CR_T_L1);
    fx
}

#[test]
fn test_deposit_and_withdraw() {
    let mut fx = Fixture::setup();
    let alice = fx.alice;
    fx.deposit(alice, whole(300));

    assert_eq!(fx.pool.get_actual_balance(alice), whole(300));
    assert_eq!(fx.pool.get_total_f(), whole(300));
    assert!(fx.pool.has_position(alice));
    assert_eq!(fx.f_balance(fx.pool.address().clone()), whole(300));

    fx.env.set_caller(alice);
    fx.pool.withdraw_f(whole(100));
    assert_eq!(fx.pool.get_actual_balance(alice), whole(200));
    assert_eq!(fx.f_balance(alice), whole(100));
    fx.assert_invariant();
}

#[test]
fn test_deposit_and_withdraw_errors() {
    let mut fx = Fixture::setup();
    let alice = fx.alice;
    fx.deposit(alice, whole(10));

    fx.env.set_caller(alice);
    assert_eq!(fx.pool.try_deposit_f(0), Err(LeafError::InvalidAmount.into()));
    assert_eq!(fx.pool.try_withdraw_f(0), Err(LeafError::InvalidAmount.into()));
    assert_eq!(
        fx.pool.try_withdraw_f(whole(10) + 1),
        Err(LeafError::InsufficientSpBalance.into())
    );
    assert_eq!(
        fx.pool.try_close_position(),
        Err(LeafError::SpPositionNotEmpty.into())
    );

    fx.env.set_caller(fx.bob);
    assert_eq!(fx.pool.try_close_position(), Err(LeafError::SpNoPosition.into()));
}

#[test]
fn test_close_empty_position() {
    let mut fx = Fixture::setup();
    let alice = fx.alice;
    fx.deposit(alice, whole(10));

    fx.env.set_caller(alice);
    fx.pool.withdraw_f(whole(10));
    fx.pool.close_position();
    assert!(!fx.pool.has_position(alice));
    assert_eq!(fx.pool.get_pool_stats().depositor_count, 0);
}

#[test]
fn test_controller_entry_points_are_protected() {
    let mut fx = Fixture::setup();
    fx.env.set_caller(fx.alice);
    assert_eq!(
        fx.pool.try_controller_rebalance(whole(1), whole(1)),
        Err(LeafError::Unauthorized.into())
    );
    assert_eq!(
        fx.pool.try_index_rewards(whole(1)),
        Err(LeafError::Unauthorized.into())
    );
    assert_eq!(
        fx.pool.try_set_controller(fx.alice),
        Err(LeafError::Unauthorized.into())
    );
}

#[test]
fn test_rebalance_outside_l3_is_noop() {
    let mut fx = Fixture::setup();
    let alice = fx.alice;
    fx.deposit(alice, whole(300));

    fx.env.set_caller(fx.keeper);
    assert_eq!(fx.protocol.protocol_rebalance_l3_to_target(CR_T_L1), (0, 0));
    assert_eq!(fx.pool.get_scale(), 1_000_000_000);
    assert_eq!(fx.protocol.get_sp_obligation_amount(), 0);
}

#[test]
fn test_rebalance_requires_keeper() {
    let mut fx = staked_at_l3();
    fx.env.set_caller(fx.alice);
    assert_eq!(
        fx.protocol.try_protocol_rebalance_l3_to_target(CR_T_L1),
        Err(LeafError::Unauthorized.into())
    );

    fx.env.set_caller(fx.keeper);
    assert_eq!(
        fx.protocol.try_protocol_rebalance_l3_to_target(0),
        Err(LeafError::InvalidAmount.into())
    );
}

#[test]
fn test_rebalance_with_stale_price_is_noop() {
    let mut fx = staked_at_l3();
    fx.env.advance_block_time(3_601_000);

    fx.env.set_caller(fx.keeper);
    assert_eq!(fx.protocol.protocol_rebalance_l3_to_target(CR_T_L1), (0, 0));
    assert_eq!(fx.pool.get_total_f(), whole(400));
}

#[test]
fn test_rebalance_burns_pool_f_towards_target() {
    let mut fx = staked_at_l3();
    let cr_before = fx.protocol.collateral_ratio();

    fx.env.set_caller(fx.keeper);
    let (burned, payout) = fx.protocol.protocol_rebalance_l3_to_target(CR_T_L1);
    assert_eq!(burned, EXPECTED_BURN);
    assert_eq!(payout, EXPECTED_PAYOUT);

    let state = fx.protocol.get_protocol_state();
    assert_eq!(state.nf, whole(1_000) - EXPECTED_BURN);
    assert_eq!(state.sp_obligation_r, EXPECTED_PAYOUT);
    assert_eq!(state.reserve_r, BOOTSTRAP_RESERVE);
    assert!(state.cr > cr_before);

    assert_eq!(fx.pool.get_scale(), EXPECTED_SCALE);
    assert_eq!(
        fx.f_balance(fx.pool.address().clone()),
        whole(400) - EXPECTED_BURN
    );
    assert_eq!(fx.f_token.total_supply(), U256::from(state.nf));
    fx.assert_invariant();
}

#[test]
fn test_rebalance_clamped_by_pool_cap() {
    // 100 fToken staked: the pool burns at most 50 of the 157.73 needed
    let mut fx = Fixture::setup();
    let alice = fx.alice;
    fx.deposit(alice, whole(100));
    fx.walk_price(&L3_PRICE_PATH);

    fx.env.set_caller(fx.keeper);
    let (burned, payout) = fx.protocol.protocol_rebalance_l3_to_target(CR_T_L1);
    assert_eq!(burned, whole(50));
    // EXPECTED_PAYOUT scaled by 50 / 157.73
    assert_eq!(payout, 45_454_545_454);

    let state = fx.protocol.get_protocol_state();
    assert_eq!(state.nf, whole(950));
    assert_eq!(state.sp_obligation_r, 45_454_545_454);
    assert!(state.sp_obligation_r < EXPECTED_PAYOUT);
    assert_eq!(state.level, CrLevel::L3);

    assert_eq!(fx.pool.get_scale(), 500_000_000);
    assert_eq!(fx.pool.get_actual_balance(alice), whole(50));
    assert_eq!(fx.pool.get_pending_rewards(alice), 45_454_545_454);
    assert_eq!(fx.f_token.total_supply(), U256::from(whole(950)));
    fx.assert_invariant();
}

#[test]
fn test_rebalance_clamped_to_half_of_supply() {
    // Every fToken staked and a 10x target: need is 890, the burn stops at nf / 2
    let mut fx = Fixture::setup();
    let alice = fx.alice;
    fx.deposit(alice, whole(1_000));
    fx.walk_price(&L3_PRICE_PATH);

    fx.env.set_caller(fx.keeper);
    let (burned, payout) = fx.protocol.protocol_rebalance_l3_to_target(10_000_000_000);
    assert_eq!(burned, whole(500));
    // 500 fToken at $1.10
    assert_eq!(payout, 454_545_454_545);

    let state = fx.protocol.get_protocol_state();
    assert_eq!(state.nf, whole(500));
    assert_eq!(state.sp_obligation_r, 454_545_454_545);
    assert_eq!(state.cr, 1_200_000_000);
    assert_eq!(state.level, CrLevel::L2);

    assert_eq!(fx.pool.get_scale(), 500_000_000);
    assert_eq!(fx.pool.get_actual_balance(alice), whole(500));
    assert_eq!(fx.f_balance(fx.pool.address().clone()), whole(500));
    fx.assert_invariant();
}

#[test]
fn test_rebalance_is_pro_rata() {
    let fx = rebalanced();
    let (alice, bob) = (fx.alice, fx.bob);

    assert_eq!(fx.pool.get_actual_balance(alice), 181_699_846_800);
    assert_eq!(fx.pool.get_actual_balance(bob), 60_566_615_600);
    assert_eq!(fx.pool.get_pending_rewards(alice), ALICE_REWARD);
    assert_eq!(fx.pool.get_pending_rewards(bob), BOB_REWARD);
    assert!(ALICE_REWARD + BOB_REWARD <= fx.protocol.get_sp_obligation_amount());

    let stats = fx.pool.get_pool_stats();
    assert_eq!(stats.total_burned_f, EXPECTED_BURN);
    assert_eq!(stats.obligation_r, EXPECTED_PAYOUT);
    assert_eq!(stats.depositor_count, 2);
}

#[test]
fn test_claim_pays_from_reserve() {
    let mut fx = rebalanced();
    let alice = fx.alice;
    let before = fx.reserve_balance(alice);

    fx.env.set_caller(alice);
    let claimed = fx.pool.claim_rewards();
    assert_eq!(claimed, ALICE_REWARD);
    assert_eq!(fx.reserve_balance(alice) - before, ALICE_REWARD);

    let state = fx.protocol.get_protocol_state();
    assert_eq!(state.reserve_r, BOOTSTRAP_RESERVE - ALICE_REWARD);
    assert_eq!(state.sp_obligation_r, EXPECTED_PAYOUT - ALICE_REWARD);
    fx.assert_invariant();

    // Nothing left to claim
    assert_eq!(fx.pool.claim_rewards(), 0);
    assert_eq!(fx.reserve_balance(alice) - before, ALICE_REWARD);
}

#[test]
fn test_settlement_is_idempotent() {
    let mut fx = rebalanced();
    let bob = fx.bob;

    assert_eq!(fx.pool.get_pending_rewards(bob), BOB_REWARD);
    assert_eq!(fx.pool.get_pending_rewards(bob), BOB_REWARD);

    // Depositing settles the pending reward without changing it
    fx.deposit(bob, whole(50));
    assert_eq!(fx.pool.get_position(bob).claimable_r, BOB_REWARD);
    assert_eq!(fx.pool.get_pending_rewards(bob), BOB_REWARD);

    fx.env.set_caller(bob);
    fx.pool.withdraw_f(whole(10));
    assert_eq!(fx.pool.get_pending_rewards(bob), BOB_REWARD);
    fx.assert_invariant();
}

#[test]
fn test_round_trip_after_rebalance() {
    let mut fx = rebalanced();
    let carol = fx.carol;
    fx.deposit(carol, whole(50));

    let actual = fx.pool.get_actual_balance(carol);
    assert!(actual <= whole(50));
    assert!(whole(50) - actual <= 1);

    fx.env.set_caller(carol);
    fx.pool.withdraw_f(actual);
    assert!(whole(50) - fx.f_balance(carol) <= 1);
    assert_eq!(fx.pool.get_position(carol).sp_scaled, U256::zero());
    assert_eq!(fx.pool.get_pending_rewards(carol), 0);
}

#[test]
fn test_full_exit_after_rebalance_leaves_no_shares() {
    let mut fx = rebalanced();
    let alice = fx.alice;
    let actual = fx.pool.get_actual_balance(alice);

    fx.env.set_caller(alice);
    fx.pool.withdraw_f(actual);
    fx.pool.claim_rewards();
    fx.pool.close_position();

    assert!(!fx.pool.has_position(alice));
    assert_eq!(fx.f_balance(alice), actual);
    assert_eq!(fx.pool.get_actual_balance(fx.bob), 60_566_615_600);
    fx.assert_invariant();
}

#[test]
fn test_harvest_indexes_yield() {
    let mut fx = Fixture::setup();
    let (alice, bob) = (fx.alice, fx.bob);
    fx.deposit(alice, whole(300));
    fx.deposit(bob, whole(100));

    let keeper_before = fx.reserve_balance(fx.keeper);
    fx.env.set_caller(fx.keeper);
    let bounty = fx.protocol.harvest_yield(whole(10));
    assert_eq!(bounty, 100_000_000);
    assert_eq!(keeper_before - fx.reserve_balance(fx.keeper), 9_900_000_000);

    assert_eq!(fx.pool.get_pending_rewards(alice), 7_425_000_000);
    assert_eq!(fx.pool.get_pending_rewards(bob), 2_475_000_000);

    let state = fx.protocol.get_protocol_state();
    assert_eq!(state.reserve_r, BOOTSTRAP_RESERVE + 9_900_000_000);
    assert_eq!(state.sp_obligation_r, 9_900_000_000);
    fx.assert_invariant();
}

#[test]
fn test_harvest_with_empty_pool_is_noop() {
    let mut fx = Fixture::setup();
    fx.env.set_caller(fx.keeper);
    assert_eq!(fx.protocol.harvest_yield(whole(10)), 0);
    assert_eq!(fx.reserve_balance(fx.keeper), ACCOUNT_FUNDING);
    assert_eq!(fx.protocol.get_protocol_state().reserve_r, BOOTSTRAP_RESERVE);
}

//! Protocol core: bootstrap, mint/redeem pricing, levels and administration.

use odra::casper_types::U256;
use odra::host::HostRef;
use odra::prelude::Addressable;
use pretty_assertions::assert_eq;

use leafsii_contracts::access_control::ROLE_ADMIN;
use leafsii_contracts::cr_level::whole;
use leafsii_contracts::errors::LeafError;
use leafsii_contracts::fee_policy::FeeConfig;
use leafsii_contracts::types::{CrLevel, FeeOp, OperationQuote};

use crate::fixture::{Fixture, ACCOUNT_FUNDING, BOOTSTRAP_RESERVE};

#[test]
fn test_bootstrap_splits_value_evenly() {
    let fx = Fixture::setup();

    let state = fx.protocol.get_protocol_state();
    assert_eq!(state.nf, whole(1_000));
    assert_eq!(state.nx, whole(1_000));
    assert_eq!(state.reserve_r, BOOTSTRAP_RESERVE);
    assert_eq!(state.p_r, 2_000_000_000);
    assert_eq!(state.px, 1_000_000_000);
    assert_eq!(state.cr, 2_000_000_000);
    assert_eq!(state.level, CrLevel::Normal);
    assert_eq!(state.treasury_r, 0);

    assert_eq!(fx.f_balance(fx.admin), whole(1_000));
    assert_eq!(fx.x_balance(fx.admin), whole(1_000));
    fx.assert_invariant();
}

#[test]
fn test_bootstrap_only_once() {
    let mut fx = Fixture::setup();
    fx.env.set_caller(fx.admin);
    assert_eq!(
        fx.protocol.try_bootstrap(whole(10)),
        Err(LeafError::AlreadyBootstrapped.into())
    );
}

#[test]
fn test_operations_require_bootstrap() {
    let mut fx = Fixture::deploy();
    fx.env.set_caller(fx.alice);
    assert_eq!(
        fx.protocol.try_mint_f(whole(10), 0),
        Err(LeafError::NotBootstrapped.into())
    );
    assert_eq!(
        fx.protocol.try_mint_x(whole(10), 0),
        Err(LeafError::NotBootstrapped.into())
    );
}

#[test]
fn test_mint_f_at_normal() {
    let mut fx = Fixture::setup();
    fx.env.set_caller(fx.alice);

    let quote = fx.protocol.quote(FeeOp::MintF, whole(100));
    assert_eq!(
        quote,
        OperationQuote {
            amount_out: whole(199),
            fee: 500_000_000,
            bonus: 0,
            level: CrLevel::Normal,
        }
    );

    let minted = fx.protocol.mint_f(whole(100), whole(199));
    assert_eq!(minted, whole(199));
    assert_eq!(fx.f_balance(fx.alice), whole(199));
    assert_eq!(fx.reserve_balance(fx.alice), ACCOUNT_FUNDING - whole(100));

    let state = fx.protocol.get_protocol_state();
    assert_eq!(state.nf, whole(1_199));
    assert_eq!(state.reserve_r, 1_099_500_000_000);
    assert_eq!(state.treasury_r, 500_000_000);
    fx.assert_invariant();
}

#[test]
fn test_mint_slippage_guard() {
    let mut fx = Fixture::setup();
    fx.env.set_caller(fx.alice);
    assert_eq!(
        fx.protocol.try_mint_f(whole(100), whole(200)),
        Err(LeafError::SlippageExceeded.into())
    );
    assert_eq!(fx.f_balance(fx.alice), 0);
    fx.assert_invariant();
}

#[test]
fn test_zero_amounts_rejected() {
    let mut fx = Fixture::setup();
    fx.env.set_caller(fx.alice);
    assert_eq!(fx.protocol.try_mint_x(0, 0), Err(LeafError::InvalidAmount.into()));
    assert_eq!(fx.protocol.try_redeem_f(0, 0), Err(LeafError::InvalidAmount.into()));
}

#[test]
fn test_mint_x_and_redeem_x_at_normal() {
    let mut fx = Fixture::setup();
    fx.env.set_caller(fx.bob);

    let minted = fx.protocol.mint_x(whole(100), 0);
    assert_eq!(minted, whole(199));
    assert_eq!(fx.x_balance(fx.bob), whole(199));
    fx.assert_invariant();

    // (1099.5 * 2 - 1000) / 1199: minting at px leaves px unchanged
    let px = fx.protocol.get_protocol_state().px;
    assert_eq!(px, 1_000_000_000);

    let before = fx.reserve_balance(fx.bob);
    let out = fx.protocol.redeem_x(whole(199), 0);
    // 199 xToken at $1.00 is 99.5 reserve, less the 0.5% fee rounded up
    assert_eq!(out, 99_002_500_000);
    assert_eq!(fx.reserve_balance(fx.bob) - before, out);
    assert_eq!(fx.x_balance(fx.bob), 0);
    fx.assert_invariant();
}

#[test]
fn test_redeem_more_than_supply() {
    let mut fx = Fixture::setup();
    fx.env.set_caller(fx.admin);
    assert_eq!(
        fx.protocol.try_redeem_f(whole(1_001), 0),
        Err(LeafError::InsufficientTokenBalance.into())
    );
}

#[test]
fn test_levels_follow_price() {
    let mut fx = Fixture::setup();

    fx.walk_price(&[1_650_000, 1_400_000]);
    assert_eq!(fx.protocol.current_level(), CrLevel::Normal);

    fx.set_price(1_250_000);
    assert_eq!(fx.protocol.current_level(), CrLevel::L1);

    fx.set_price(1_180_000);
    assert_eq!(fx.protocol.current_level(), CrLevel::L2);

    fx.set_price(1_100_000);
    assert_eq!(fx.protocol.current_level(), CrLevel::L3);
    assert_eq!(fx.protocol.collateral_ratio(), 1_100_000_000);
}

#[test]
fn test_mint_f_blocked_outside_normal() {
    let mut fx = Fixture::setup();
    fx.walk_price(&[1_650_000, 1_400_000, 1_250_000]);

    fx.env.set_caller(fx.alice);
    assert_eq!(
        fx.protocol.try_mint_f(whole(100), 0),
        Err(LeafError::ActionBlocked.into())
    );
    assert_eq!(
        fx.protocol.try_mint_f(1, 0),
        Err(LeafError::ActionBlocked.into())
    );
    assert_eq!(
        fx.protocol.try_quote(FeeOp::MintF, whole(1)),
        Err(LeafError::ActionBlocked.into())
    );
}

#[test]
fn test_mint_x_earns_bonus_at_l1() {
    let mut fx = Fixture::setup();
    // Fund the treasury at Normal first
    fx.env.set_caller(fx.bob);
    fx.protocol.mint_x(whole(100), 0);
    fx.walk_price(&[1_650_000, 1_400_000, 1_150_000]);
    assert_eq!(fx.protocol.current_level(), CrLevel::L1);

    fx.env.set_caller(fx.alice);
    let quote = fx.protocol.quote(FeeOp::MintX, whole(10));
    assert_eq!(quote.fee, 50_000_000);
    assert_eq!(quote.bonus, 10_000_000);
    assert_eq!(quote.level, CrLevel::L1);

    let minted = fx.protocol.mint_x(whole(10), 0);
    assert_eq!(minted, quote.amount_out);
    assert_eq!(fx.protocol.get_treasury_balance(), 540_000_000);
    fx.assert_invariant();
}

#[test]
fn test_redeem_f_bonus_needs_treasury() {
    let mut fx = Fixture::setup();
    fx.walk_price(&[1_650_000, 1_400_000, 1_180_000]);
    assert_eq!(fx.protocol.current_level(), CrLevel::L2);
    assert_eq!(fx.protocol.get_treasury_balance(), 0);

    fx.env.set_caller(fx.admin);
    assert_eq!(
        fx.protocol.try_redeem_f(whole(10), 0),
        Err(LeafError::InsufficientBonusFunds.into())
    );
    assert_eq!(fx.protocol.get_protocol_state().nf, whole(1_000));
}

#[test]
fn test_redeem_f_pays_bonus_at_l2() {
    let mut fx = Fixture::setup();
    fx.env.set_caller(fx.bob);
    fx.protocol.mint_x(whole(100), 0);
    assert_eq!(fx.protocol.get_treasury_balance(), 500_000_000);

    fx.walk_price(&[1_650_000, 1_400_000, 1_150_000, 1_070_000]);
    assert_eq!(fx.protocol.current_level(), CrLevel::L2);

    fx.env.set_caller(fx.admin);
    let before = fx.reserve_balance(fx.admin);
    let out = fx.protocol.redeem_f(whole(10), 9_355_140_186);

    // gross 10 / 1.07 = 9.345794392, no fee, 10 bps bonus
    assert_eq!(out, 9_355_140_186);
    assert_eq!(fx.reserve_balance(fx.admin) - before, 9_355_140_186);
    assert_eq!(fx.protocol.get_treasury_balance(), 490_654_206);

    let state = fx.protocol.get_protocol_state();
    assert_eq!(state.nf, whole(990));
    assert_eq!(state.reserve_r, 1_099_500_000_000 - 9_345_794_392);
    let breakdown = fx.protocol.get_fee_breakdown();
    assert_eq!(breakdown.bonuses_paid, 9_345_794);
    fx.assert_invariant();
}

#[test]
fn test_level_checked_before_operation() {
    let mut fx = Fixture::setup();
    fx.walk_price(&[1_650_000, 1_400_000, 1_250_000]);
    assert_eq!(fx.protocol.current_level(), CrLevel::L1);

    // px = 0.25, so 600 xToken redeem 120 reserve less the 1% L1 fee
    fx.env.set_caller(fx.admin);
    let out = fx.protocol.redeem_x(whole(600), 0);
    assert_eq!(out, 118_800_000_000);

    // Allowed at L1 even though it leaves the protocol at L3
    let state = fx.protocol.get_protocol_state();
    assert_eq!(state.reserve_r, whole(880));
    assert_eq!(state.treasury_r, 1_200_000_000);
    assert_eq!(state.level, CrLevel::L3);
    fx.assert_invariant();

    fx.env.set_caller(fx.alice);
    assert_eq!(
        fx.protocol.try_mint_f(whole(10), 0),
        Err(LeafError::ActionBlocked.into())
    );
}

#[test]
fn test_recapitalize_restores_normal() {
    let mut fx = Fixture::setup();
    fx.walk_price(&[1_650_000, 1_400_000, 1_250_000]);
    fx.env.set_caller(fx.admin);
    fx.protocol.redeem_x(whole(600), 0);
    assert_eq!(fx.protocol.current_level(), CrLevel::L3);

    fx.protocol.recapitalize(whole(200));
    let state = fx.protocol.get_protocol_state();
    assert_eq!(state.reserve_r, whole(1_080));
    assert_eq!(state.level, CrLevel::Normal);
    fx.assert_invariant();

    fx.env.set_caller(fx.alice);
    assert!(fx.protocol.try_mint_f(whole(10), 0).is_ok());
    fx.assert_invariant();
}

#[test]
fn test_treasury_withdrawal() {
    let mut fx = Fixture::setup();
    fx.env.set_caller(fx.alice);
    fx.protocol.mint_f(whole(100), 0);

    fx.env.set_caller(fx.admin);
    assert_eq!(
        fx.protocol.try_withdraw_treasury(fx.carol, 600_000_000),
        Err(LeafError::InsufficientTreasury.into())
    );

    fx.protocol.withdraw_treasury(fx.carol, 500_000_000);
    assert_eq!(fx.reserve_balance(fx.carol), ACCOUNT_FUNDING + 500_000_000);
    assert_eq!(fx.protocol.get_treasury_balance(), 0);
    assert_eq!(fx.protocol.get_fee_breakdown().withdrawn, 500_000_000);
    fx.assert_invariant();

    fx.env.set_caller(fx.alice);
    assert_eq!(
        fx.protocol.try_withdraw_treasury(fx.alice, 1),
        Err(LeafError::Unauthorized.into())
    );
}

#[test]
fn test_fee_config_administration() {
    let mut fx = Fixture::setup();

    let mut config = FeeConfig::default();
    config.normal.mint_f_fee_bps = 100;

    fx.env.set_caller(fx.alice);
    assert_eq!(
        fx.protocol.try_set_fee_config(config.clone()),
        Err(LeafError::Unauthorized.into())
    );

    fx.env.set_caller(fx.admin);
    let mut invalid = config.clone();
    invalid.l2.redeem_x_fee_bps = 2_000;
    assert_eq!(
        fx.protocol.try_set_fee_config(invalid),
        Err(LeafError::InvalidConfig.into())
    );

    fx.protocol.set_fee_config(config.clone());
    assert_eq!(fx.protocol.get_fee_config(), config);
    assert_eq!(fx.protocol.quote(FeeOp::MintF, whole(100)).fee, whole(1));
}

#[test]
fn test_role_management() {
    let mut fx = Fixture::setup();

    fx.env.set_caller(fx.alice);
    assert_eq!(
        fx.protocol.try_grant_role(ROLE_ADMIN, fx.alice),
        Err(LeafError::Unauthorized.into())
    );

    fx.env.set_caller(fx.admin);
    assert_eq!(
        fx.protocol.try_revoke_role(ROLE_ADMIN, fx.admin),
        Err(LeafError::LastAdmin.into())
    );

    fx.protocol.grant_role(ROLE_ADMIN, fx.bob);
    assert!(fx.protocol.has_role(ROLE_ADMIN, fx.bob));
    fx.protocol.renounce_role(ROLE_ADMIN);
    assert!(!fx.protocol.has_role(ROLE_ADMIN, fx.admin));

    fx.env.set_caller(fx.bob);
    assert_eq!(
        fx.protocol.try_renounce_role(ROLE_ADMIN),
        Err(LeafError::LastAdmin.into())
    );
}

#[test]
fn test_sp_claim_hook_is_pool_only() {
    let mut fx = Fixture::setup();
    fx.env.set_caller(fx.admin);
    assert_eq!(
        fx.protocol.try_pay_sp_claim(fx.admin, 1),
        Err(LeafError::Unauthorized.into())
    );
}

#[test]
fn test_token_supplies_track_ledger() {
    let mut fx = Fixture::setup();
    fx.env.set_caller(fx.alice);
    fx.protocol.mint_f(whole(50), 0);
    fx.env.set_caller(fx.bob);
    fx.protocol.mint_x(whole(50), 0);
    fx.env.set_caller(fx.alice);
    fx.protocol.redeem_f(whole(20), 0);

    let state = fx.protocol.get_protocol_state();
    assert_eq!(fx.f_token.total_supply(), U256::from(state.nf));
    assert_eq!(fx.x_token.total_supply(), U256::from(state.nx));
    let held = fx.reserve_balance(fx.protocol.address().clone());
    assert_eq!(held, state.reserve_r + state.treasury_r);
    fx.assert_invariant();
}

#[test]
fn test_supply_overflow_is_rejected() {
    let mut fx = Fixture::setup();
    let alice = fx.alice;
    fx.env.set_caller(fx.admin);
    fx.reserve.mint(alice, U256::from(11_000_000_000_000_000_000u64));
    fx.walk_price(&[2_300_000, 2_600_000]);

    // Deep xToken collateral keeps the protocol at Normal while nf grows
    fx.env.set_caller(alice);
    fx.protocol.mint_x(7_000_000_000_000_000_000, 0);
    let minted = fx.protocol.mint_f(3_600_000_000_000_000_000, 0);
    assert_eq!(fx.protocol.current_level(), CrLevel::Normal);

    // A second mint of the same size would take nf past u64::MAX
    let before = fx.protocol.get_protocol_state();
    assert!(before.nf.checked_add(minted).is_none());
    assert_eq!(
        fx.protocol.try_quote(FeeOp::MintF, 3_600_000_000_000_000_000),
        Err(LeafError::MathOverflow.into())
    );
    assert_eq!(
        fx.protocol.try_mint_f(3_600_000_000_000_000_000, 0),
        Err(LeafError::MathOverflow.into())
    );

    let after = fx.protocol.get_protocol_state();
    assert_eq!(after.nf, before.nf);
    assert_eq!(after.reserve_r, before.reserve_r);
    assert_eq!(fx.f_token.total_supply(), U256::from(after.nf));
    fx.assert_invariant();
}

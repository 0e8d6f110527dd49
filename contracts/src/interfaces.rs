//! Cross-contract interfaces.
//!
//! The protocol core, the stability pool and the three tokens are separate
//! contracts. These traits describe the entry points each one calls on the
//! others, plus the u64 to U256 conversion at the CEP-18 boundary.

use odra::prelude::*;
use odra::casper_types::U256;

/// CEP-18 token (reserve asset, fToken, xToken)
#[odra::external_contract]
pub trait Cep18Token {
    fn balance_of(&self, account: Address) -> U256;
    fn total_supply(&self) -> U256;
    fn transfer(&mut self, recipient: Address, amount: U256) -> bool;
    fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool;
    fn mint(&mut self, to: Address, amount: U256);
    fn burn_from(&mut self, from: Address, amount: U256);
}

/// Stability pool entry points reserved for its controller (the protocol core)
#[odra::external_contract]
pub trait StabilityPoolController {
    fn controller_rebalance(&mut self, f_burn_requested: u64, payout_r_requested: u64) -> (u64, u64);
    fn index_rewards(&mut self, amount_r: u64) -> u64;
    fn get_sp_obligation_amount(&self) -> u64;
    fn get_total_f(&self) -> u64;
}

/// Protocol core entry point used by the stability pool to release claims
#[odra::external_contract]
pub trait ProtocolPayout {
    fn pay_sp_claim(&mut self, recipient: Address, amount_r: u64);
}

/// Token amount (u64 base units) to the CEP-18 representation
pub fn to_token_amount(amount: u64) -> U256 {
    U256::from(amount)
}

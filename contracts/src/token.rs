//! Leaf Token Contract
//!
//! CEP-18 compatible token with owner-managed minters. One instance is
//! deployed for the fToken and one for the xToken; the protocol core is the
//! only minter of both. Minters may also burn from any account, which the
//! core uses to retire redeemed tokens and the stability pool's burned share.
//!
//! Balances and allowances are mirrored into the standard CEP-18 named keys
//! and dictionaries so wallets and explorers can read them.

use odra::prelude::*;
use odra::casper_types::{U256, Key};
use odra::casper_types::bytesrepr::ToBytes;
use crate::errors::LeafError;
use crate::events::{Approval, Burn, Mint, Transfer};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

const CEP18_NAME_KEY: &str = "name";
const CEP18_SYMBOL_KEY: &str = "symbol";
const CEP18_DECIMALS_KEY: &str = "decimals";
const CEP18_TOTAL_SUPPLY_KEY: &str = "total_supply";
const CEP18_BALANCES_DICT: &str = "balances";
const CEP18_ALLOWANCES_DICT: &str = "allowances";

/// Leaf Token Contract
#[odra::module(events = [Transfer, Approval, Mint, Burn])]
pub struct LeafToken {
    /// Token name
    name: Var<String>,
    /// Token symbol
    symbol: Var<String>,
    /// Decimals
    decimals: Var<u8>,
    /// Total supply
    total_supply: Var<U256>,
    /// Balance mapping
    balances: Mapping<Address, U256>,
    /// Allowance mapping (owner, spender) -> amount
    allowances: Mapping<(Address, Address), U256>,
    /// Account allowed to manage minters
    owner: Var<Address>,
    /// Authorized minters (protocol contracts)
    authorized_minters: Mapping<Address, bool>,
}

#[odra::module]
impl LeafToken {
    /// Initialize the token; the deployer becomes owner.
    pub fn init(&mut self, name: String, symbol: String, decimals: u8) {
        self.name.set(name.clone());
        self.symbol.set(symbol.clone());
        self.decimals.set(decimals);
        self.total_supply.set(U256::zero());
        self.owner.set(self.env().caller());
        self.env().init_dictionary(CEP18_BALANCES_DICT);
        self.env().init_dictionary(CEP18_ALLOWANCES_DICT);
        self.env().set_named_value(CEP18_NAME_KEY, name);
        self.env().set_named_value(CEP18_SYMBOL_KEY, symbol);
        self.env().set_named_value(CEP18_DECIMALS_KEY, decimals);
        self.env().set_named_value(CEP18_TOTAL_SUPPLY_KEY, U256::zero());
    }

    // ========== CEP-18 Standard Functions ==========

    pub fn name(&self) -> String {
        self.name.get().unwrap_or_default()
    }

    pub fn symbol(&self) -> String {
        self.symbol.get().unwrap_or_default()
    }

    pub fn decimals(&self) -> u8 {
        self.decimals.get().unwrap_or(9)
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply.get().unwrap_or(U256::zero())
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).unwrap_or(U256::zero())
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances.get(&(owner, spender)).unwrap_or(U256::zero())
    }

    /// Transfer tokens to recipient
    pub fn transfer(&mut self, recipient: Address, amount: U256) -> bool {
        let sender = self.env().caller();
        self.transfer_internal(sender, recipient, amount);
        true
    }

    /// Approve spender to spend tokens
    pub fn approve(&mut self, spender: Address, amount: U256) -> bool {
        let owner = self.env().caller();
        self.approve_internal(owner, spender, amount);
        true
    }

    /// Transfer tokens from owner to recipient (requires allowance)
    pub fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool {
        let spender = self.env().caller();

        let current_allowance = self.allowance(owner, spender);
        if current_allowance < amount {
            self.env().revert(LeafError::InsufficientAllowance);
        }

        self.transfer_internal(owner, recipient, amount);
        self.approve_internal(owner, spender, current_allowance - amount);
        true
    }

    // ========== Minter Functions ==========

    /// Mint new tokens (only authorized minters)
    pub fn mint(&mut self, to: Address, amount: U256) {
        self.require_authorized_minter();

        let new_balance = self.balance_of(to) + amount;
        self.balances.set(&to, new_balance);
        self.set_balance_cep18(to, new_balance);

        let new_supply = self.total_supply() + amount;
        self.total_supply.set(new_supply);
        self.set_total_supply_cep18(new_supply);

        self.env().emit_event(Mint { to, amount });
    }

    /// Burn tokens from caller
    pub fn burn(&mut self, amount: U256) {
        let caller = self.env().caller();
        self.burn_from_internal(caller, amount);
    }

    /// Burn tokens from any account (only authorized minters)
    pub fn burn_from(&mut self, from: Address, amount: U256) {
        self.require_authorized_minter();
        self.burn_from_internal(from, amount);
    }

    // ========== Owner Functions ==========

    pub fn add_minter(&mut self, minter: Address) {
        self.require_owner();
        self.authorized_minters.set(&minter, true);
    }

    pub fn remove_minter(&mut self, minter: Address) {
        self.require_owner();
        self.authorized_minters.set(&minter, false);
    }

    pub fn is_minter(&self, account: Address) -> bool {
        self.authorized_minters.get(&account).unwrap_or(false)
    }

    pub fn get_owner(&self) -> Option<Address> {
        self.owner.get()
    }

    /// Hand over minter management
    pub fn transfer_ownership(&mut self, new_owner: Address) {
        self.require_owner();
        self.owner.set(new_owner);
    }

    // ========== Internal Functions ==========

    fn transfer_internal(&mut self, from: Address, to: Address, amount: U256) {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            self.env().revert(LeafError::InsufficientTokenBalance);
        }

        let new_from_balance = from_balance - amount;
        self.balances.set(&from, new_from_balance);
        self.set_balance_cep18(from, new_from_balance);

        let new_to_balance = self.balance_of(to) + amount;
        self.balances.set(&to, new_to_balance);
        self.set_balance_cep18(to, new_to_balance);

        self.env().emit_event(Transfer { from, to, amount });
    }

    fn approve_internal(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances.set(&(owner, spender), amount);
        self.set_allowance_cep18(owner, spender, amount);
        self.env().emit_event(Approval { owner, spender, amount });
    }

    fn burn_from_internal(&mut self, from: Address, amount: U256) {
        let current_balance = self.balance_of(from);
        if current_balance < amount {
            self.env().revert(LeafError::InsufficientTokenBalance);
        }

        let new_balance = current_balance - amount;
        self.balances.set(&from, new_balance);
        self.set_balance_cep18(from, new_balance);

        let new_supply = self.total_supply() - amount;
        self.total_supply.set(new_supply);
        self.set_total_supply_cep18(new_supply);

        self.env().emit_event(Burn { from, amount });
    }

    fn set_balance_cep18(&self, owner: Address, amount: U256) {
        let key = Self::cep18_balance_key(owner);
        self.env().set_dictionary_value(CEP18_BALANCES_DICT, key.as_bytes(), amount);
    }

    fn set_allowance_cep18(&self, owner: Address, spender: Address, amount: U256) {
        let key = Self::cep18_allowance_key(owner, spender);
        self.env().set_dictionary_value(CEP18_ALLOWANCES_DICT, key.as_bytes(), amount);
    }

    fn set_total_supply_cep18(&self, amount: U256) {
        self.env().set_named_value(CEP18_TOTAL_SUPPLY_KEY, amount);
    }

    fn cep18_balance_key(owner: Address) -> String {
        let key = Key::from(owner);
        let bytes = key.to_bytes().unwrap_or_default();
        BASE64_STANDARD.encode(bytes)
    }

    fn cep18_allowance_key(owner: Address, spender: Address) -> String {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&Key::from(owner).to_bytes().unwrap_or_default());
        bytes.extend_from_slice(&Key::from(spender).to_bytes().unwrap_or_default());
        BASE64_STANDARD.encode(bytes)
    }

    fn require_authorized_minter(&self) {
        let caller = self.env().caller();
        if !self.is_minter(caller) {
            self.env().revert(LeafError::Unauthorized);
        }
    }

    fn require_owner(&self) {
        if self.owner.get() != Some(self.env().caller()) {
            self.env().revert(LeafError::Unauthorized);
        }
    }
}

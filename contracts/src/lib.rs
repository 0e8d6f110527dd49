//! Leafsii Contracts
//!
//! Two-token synthetic protocol on Casper. A single reserve asset backs a
//! stable fToken ($1.00) and a leveraged xToken that absorbs reserve price
//! moves.
//!
//! ## Architecture
//!
//! - **LeafsiiProtocol**: Reserve ledger, mint/redeem, oracle, L3 rebalance
//! - **StabilityPool**: fToken deposits burned pro-rata at L3 in exchange for
//!   deferred reserve claims
//! - **LeafToken**: CEP-18 token used for fToken and xToken
//! - **FeePolicy / CrLevel**: Pure pricing and collateral-ratio logic
//! - **AccessControl / FeeTreasury / PriceFeed**: Protocol core sub-modules
//!
//! ## Collateral Levels
//!
//! The collateral ratio `CR = net_reserve * p_r / (nf * pf)` selects one of
//! four levels:
//! - Normal: every operation allowed
//! - L1/L2: fToken minting blocked, stabilizing operations earn a bonus
//! - L3: keepers may burn stability pool fToken back towards a target CR

#![cfg_attr(target_arch = "wasm32", no_std)]

#[cfg(target_arch = "wasm32")]
extern crate alloc;

// Re-export odra for downstream usage
pub use odra;

// Core module declarations
pub mod types;
pub mod errors;
pub mod math;
pub mod events;
pub mod interfaces;

// Pricing logic
pub mod cr_level;
pub mod fee_policy;

// Protocol core sub-modules
pub mod access_control;
pub mod treasury;
pub mod oracle_adapter;

// Contract modules
pub mod token;
pub mod stability_pool;
pub mod protocol;

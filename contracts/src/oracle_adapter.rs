//! Reserve Price Feed
//!
//! Holds the last accepted reserve/USD price for the protocol core.
//! Implements:
//! - Ingestion of feeder prices at 1e6, stored at the internal 1e9 scale
//! - Staleness check: `now - timestamp < max_staleness_sec`
//! - Step check: `|new / old - 1| < max_rel_step_bps`, skipped for the first price
//! - Rejected updates leave the previous price in effect

use odra::prelude::*;
use crate::errors::LeafError;
use crate::math::{self, BPS_SCALE};
use crate::types::OracleStatus;

/// Default maximum price age in seconds (1 hour)
pub const DEFAULT_MAX_STALENESS_SEC: u64 = 3600;

/// Default maximum relative price step per update (20% = 2000 bps)
pub const DEFAULT_MAX_REL_STEP_BPS: u32 = 2000;

/// Oracle configuration
#[odra::odra_type]
pub struct OracleConfig {
    /// Maximum price age in seconds before considered stale
    pub max_staleness_sec: u64,
    /// Maximum relative move from the previous price in bps
    pub max_rel_step_bps: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            max_staleness_sec: DEFAULT_MAX_STALENESS_SEC,
            max_rel_step_bps: DEFAULT_MAX_REL_STEP_BPS,
        }
    }
}

impl OracleConfig {
    pub fn validate(&self) -> Result<(), LeafError> {
        if self.max_staleness_sec == 0
            || self.max_rel_step_bps == 0
            || self.max_rel_step_bps as u64 >= BPS_SCALE
        {
            return Err(LeafError::InvalidConfig);
        }
        Ok(())
    }
}

/// Staleness of a price observed at `timestamp` (seconds) as of `now`.
/// Timestamps from the future are treated as stale.
pub fn check_staleness(now: u64, timestamp: u64, max_staleness_sec: u64) -> OracleStatus {
    if timestamp > now || now - timestamp >= max_staleness_sec {
        OracleStatus::Stale
    } else {
        OracleStatus::Ok
    }
}

/// Relative step between two prices. A zero reference means no previous
/// price and always passes.
pub fn check_step(new_price: u64, reference_price: u64, max_rel_step_bps: u32) -> OracleStatus {
    if reference_price == 0 {
        return OracleStatus::Ok;
    }

    let diff = new_price.abs_diff(reference_price) as u128;
    // diff / reference < max_bps / 10000, kept in integers
    if diff * BPS_SCALE as u128 >= max_rel_step_bps as u128 * reference_price as u128 {
        OracleStatus::Step
    } else {
        OracleStatus::Ok
    }
}

/// Reserve price feed (sub-module of the protocol core)
#[odra::module]
pub struct PriceFeed {
    /// Last accepted price (1e9, USD per reserve token)
    price: Var<u64>,
    /// Timestamp (seconds) carried by the last accepted price
    last_update_ts: Var<u64>,
    /// Oracle configuration
    config: Var<OracleConfig>,
}

impl PriceFeed {
    pub fn init(&mut self, config: OracleConfig) {
        self.config.set(config);
        self.price.set(0);
        self.last_update_ts.set(0);
    }

    // ========== Price Update ==========

    /// Validate and accept a feeder price.
    ///
    /// `raw_price` is at 1e6, `timestamp` in seconds. Returns the previous
    /// and new internal prices.
    pub fn submit(&mut self, raw_price: u64, timestamp: u64, now: u64) -> Result<(u64, u64), LeafError> {
        if raw_price == 0 {
            return Err(LeafError::InvalidAmount);
        }
        let price = math::oracle_to_internal(raw_price).ok_or(LeafError::MathOverflow)?;
        let config = self.get_config();

        if check_staleness(now, timestamp, config.max_staleness_sec) != OracleStatus::Ok {
            return Err(LeafError::OracleStale);
        }
        // Accepted timestamps never move backwards
        if timestamp < self.last_update() {
            return Err(LeafError::OracleStale);
        }

        let previous = self.price();
        if check_step(price, previous, config.max_rel_step_bps) != OracleStatus::Ok {
            return Err(LeafError::OracleStep);
        }

        self.price.set(price);
        self.last_update_ts.set(timestamp);
        Ok((previous, price))
    }

    // ========== Queries ==========

    /// Last accepted price, 0 if none
    pub fn price(&self) -> u64 {
        self.price.get().unwrap_or(0)
    }

    pub fn last_update(&self) -> u64 {
        self.last_update_ts.get().unwrap_or(0)
    }

    pub fn status(&self, now: u64) -> OracleStatus {
        if self.price() == 0 {
            return OracleStatus::Unavailable;
        }
        check_staleness(now, self.last_update(), self.get_config().max_staleness_sec)
    }

    /// Price usable for pricing user operations.
    pub fn fresh_price(&self, now: u64) -> Result<u64, LeafError> {
        match self.status(now) {
            OracleStatus::Ok => Ok(self.price()),
            OracleStatus::Unavailable => Err(LeafError::OraclePriceUnavailable),
            OracleStatus::Stale | OracleStatus::Step => Err(LeafError::OracleStale),
        }
    }

    // ========== Configuration ==========

    pub fn get_config(&self) -> OracleConfig {
        self.config.get().unwrap_or_default()
    }

    pub fn set_config(&mut self, config: OracleConfig) -> Result<(), LeafError> {
        config.validate()?;
        self.config.set(config);
        Ok(())
    }
}

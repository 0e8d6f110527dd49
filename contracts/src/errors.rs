//! Protocol error definitions.

use odra::prelude::*;
use odra::ContractEnv;

/// Leafsii protocol errors
#[repr(u16)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LeafError {
    // Operation errors (1xx)
    InvalidAmount = 100,
    ActionBlocked = 101,
    SlippageExceeded = 102,
    NotBootstrapped = 103,
    AlreadyBootstrapped = 104,

    // Oracle errors (2xx)
    OracleStale = 200,
    OracleStep = 201,
    OraclePriceUnavailable = 202,

    // Reserve and treasury errors (3xx)
    InsufficientReserve = 300,
    InsufficientBonusFunds = 301,
    InsufficientTreasury = 302,
    InvariantViolation = 303,

    // Access control errors (4xx)
    Unauthorized = 400,
    LastAdmin = 401,

    // Token errors (5xx)
    InsufficientTokenBalance = 500,
    InsufficientAllowance = 501,

    // Stability pool errors (6xx)
    InsufficientSpBalance = 600,
    SpPositionNotEmpty = 601,
    SpDepleted = 602,
    SpNoPosition = 603,

    // Configuration and math errors (9xx)
    InvalidConfig = 900,
    MathOverflow = 901,
    NotConfigured = 902,
}

impl LeafError {
    pub const fn message(&self) -> &'static str {
        match self {
            // Operation
            LeafError::InvalidAmount => "Invalid amount",
            LeafError::ActionBlocked => "Action blocked at current CR level",
            LeafError::SlippageExceeded => "Output below minimum received",
            LeafError::NotBootstrapped => "Protocol not bootstrapped",
            LeafError::AlreadyBootstrapped => "Protocol already bootstrapped",

            // Oracle
            LeafError::OracleStale => "Oracle price stale",
            LeafError::OracleStep => "Oracle price step too large",
            LeafError::OraclePriceUnavailable => "Oracle price unavailable",

            // Reserve / treasury
            LeafError::InsufficientReserve => "Insufficient free reserve",
            LeafError::InsufficientBonusFunds => "Fee treasury cannot cover bonus",
            LeafError::InsufficientTreasury => "Insufficient treasury balance",
            LeafError::InvariantViolation => "Solvency invariant violated",

            // Access control
            LeafError::Unauthorized => "Unauthorized",
            LeafError::LastAdmin => "Cannot remove the last admin",

            // Token
            LeafError::InsufficientTokenBalance => "Insufficient token balance",
            LeafError::InsufficientAllowance => "Insufficient allowance",

            // Stability pool
            LeafError::InsufficientSpBalance => "Stability pool: insufficient balance",
            LeafError::SpPositionNotEmpty => "Stability pool: position not empty",
            LeafError::SpDepleted => "Stability pool: scale depleted",
            LeafError::SpNoPosition => "Stability pool: no position",

            // Config / math
            LeafError::InvalidConfig => "Invalid configuration parameter",
            LeafError::MathOverflow => "Arithmetic overflow",
            LeafError::NotConfigured => "Contract address not configured",
        }
    }
}

impl core::fmt::Display for LeafError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

impl From<LeafError> for OdraError {
    fn from(error: LeafError) -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            OdraError::user(error as u16)
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            OdraError::user(error as u16, error.message())
        }
    }
}

/// Revert the current call with the carried error.
pub trait OrRevert<T> {
    fn or_revert(self, env: &ContractEnv) -> T;
}

impl<T> OrRevert<T> for Result<T, LeafError> {
    fn or_revert(self, env: &ContractEnv) -> T {
        match self {
            Ok(value) => value,
            Err(error) => env.revert(error),
        }
    }
}

//! Deploy the Leafsii contracts to Casper livenet/testnet using the Odra
//! livenet environment.
//!
//! Usage:
//!   cargo run --bin deploy_livenet --release
//!
//! Requires .env file with:
//!   ODRA_CASPER_LIVENET_SECRET_KEY_PATH=/path/to/secret_key.pem
//!   ODRA_CASPER_LIVENET_NODE_ADDRESS=https://node.testnet.casper.network
//!   ODRA_CASPER_LIVENET_CHAIN_NAME=casper-test
//!   ODRA_CASPER_LIVENET_PAYMENT_AMOUNT=200000000000
//!
//! Optional:
//!   LEAFSII_DEPLOY_CONFIG=deploy.json   protocol parameters (see `DeployConfig`)

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use odra::host::{Deployer, HostEnv, HostRef};
use odra::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use leafsii_contracts::access_control::{ROLE_KEEPER, ROLE_ORACLE};
use leafsii_contracts::protocol::{LeafsiiProtocol, LeafsiiProtocolInitArgs};
use leafsii_contracts::stability_pool::{StabilityPool, StabilityPoolInitArgs};
use leafsii_contracts::token::{LeafToken, LeafTokenHostRef, LeafTokenInitArgs};

const CONFIG_ENV_VAR: &str = "LEAFSII_DEPLOY_CONFIG";
const DEFAULT_PAYMENT_AMOUNT: u64 = 200_000_000_000;

#[derive(Debug, Error)]
enum DeployError {
    #[error("failed to read {path}: {source}")]
    ReadConfig {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    WriteOutput {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
}

/// Deployment parameters, every field optional in the JSON file
#[derive(Debug, Deserialize)]
#[serde(default)]
struct DeployConfig {
    /// Existing CEP-18 reserve token; a LeafToken is deployed when absent
    reserve_token: Option<String>,
    reserve_name: String,
    reserve_symbol: String,
    f_name: String,
    f_symbol: String,
    x_name: String,
    x_symbol: String,
    /// Accounts granted the keeper and oracle roles
    keeper: Option<String>,
    oracle: Option<String>,
    /// First reserve price at the oracle's 1e6 scale, published by the deployer
    initial_price: Option<u64>,
    /// Where the deployed addresses are written
    output_path: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            reserve_token: None,
            reserve_name: "Leafsii Reserve".to_string(),
            reserve_symbol: "lRSV".to_string(),
            f_name: "Leafsii Dollar".to_string(),
            f_symbol: "fUSD".to_string(),
            x_name: "Leafsii Lever".to_string(),
            x_symbol: "xLEV".to_string(),
            keeper: None,
            oracle: None,
            initial_price: None,
            output_path: "deployed.json".to_string(),
        }
    }
}

impl DeployConfig {
    fn load() -> Result<Self, DeployError> {
        let Ok(path) = std::env::var(CONFIG_ENV_VAR) else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(&path)
            .map_err(|source| DeployError::ReadConfig { path, source })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Serialize)]
struct DeployedAddresses {
    reserve_token: String,
    f_token: String,
    x_token: String,
    protocol: String,
    stability_pool: String,
}

fn parse_address(value: &str) -> Result<Address, DeployError> {
    Address::from_str(value).map_err(|_| DeployError::InvalidAddress(value.to_string()))
}

fn deploy_token(env: &HostEnv, name: &str, symbol: &str) -> LeafTokenHostRef {
    println!("Deploying {} ({})...", name, symbol);
    let token = LeafToken::deploy(
        env,
        LeafTokenInitArgs {
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals: 9,
        },
    );
    println!("{} deployed at: {:?}", symbol, token.address().clone());
    token
}

fn main() -> Result<(), DeployError> {
    // Load environment from .env file
    dotenv::dotenv().ok();

    println!("=== Leafsii Livenet Deployment ===");
    println!();

    let config = DeployConfig::load()?;
    let keeper = config.keeper.as_deref().map(parse_address).transpose()?;
    let oracle = config.oracle.as_deref().map(parse_address).transpose()?;
    let existing_reserve = config.reserve_token.as_deref().map(parse_address).transpose()?;

    let env = odra_casper_livenet_env::env();

    let payment_amount: u64 = std::env::var("ODRA_CASPER_LIVENET_PAYMENT_AMOUNT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PAYMENT_AMOUNT);
    env.set_gas(payment_amount);

    let deployer = env.caller();
    println!("Deployer: {:?}", deployer);
    println!();

    // ==================== Phase 1: Tokens ====================
    println!("=== Phase 1: Deploying Tokens ===");
    println!();

    let reserve_addr = match existing_reserve {
        Some(address) => {
            println!("Using existing reserve token at: {:?}", address);
            address
        }
        None => deploy_token(&env, &config.reserve_name, &config.reserve_symbol)
            .address()
            .clone(),
    };
    let mut f_token = deploy_token(&env, &config.f_name, &config.f_symbol);
    let mut x_token = deploy_token(&env, &config.x_name, &config.x_symbol);
    let f_token_addr = f_token.address().clone();
    let x_token_addr = x_token.address().clone();
    println!();

    // ==================== Phase 2: Protocol ====================
    println!("=== Phase 2: Deploying Protocol ===");
    println!();

    println!("Deploying LeafsiiProtocol...");
    let mut protocol = LeafsiiProtocol::deploy(
        &env,
        LeafsiiProtocolInitArgs {
            reserve_token: reserve_addr,
            f_token: f_token_addr,
            x_token: x_token_addr,
        },
    );
    let protocol_addr = protocol.address().clone();
    println!("LeafsiiProtocol deployed at: {:?}", protocol_addr);

    println!("Deploying StabilityPool...");
    let mut stability_pool = StabilityPool::deploy(
        &env,
        StabilityPoolInitArgs {
            f_token: f_token_addr,
        },
    );
    let stability_pool_addr = stability_pool.address().clone();
    println!("StabilityPool deployed at: {:?}", stability_pool_addr);
    println!();

    // ==================== Phase 3: Wiring ====================
    println!("=== Phase 3: Cross-contract Configuration ===");
    println!();

    println!("Configuring LeafsiiProtocol <-> StabilityPool link...");
    protocol.set_stability_pool(stability_pool_addr);
    stability_pool.set_controller(protocol_addr);
    println!("Done.");

    println!("Authorizing LeafsiiProtocol as fToken/xToken minter...");
    f_token.add_minter(protocol_addr);
    x_token.add_minter(protocol_addr);
    println!("Done.");

    if let Some(keeper) = keeper {
        println!("Granting keeper role to {:?}...", keeper);
        protocol.grant_role(ROLE_KEEPER, keeper);
    }
    if let Some(oracle) = oracle {
        println!("Granting oracle role to {:?}...", oracle);
        protocol.grant_role(ROLE_ORACLE, oracle);
    }

    if let Some(price) = config.initial_price {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        println!("Publishing initial price {}...", price);
        protocol.update_price(price, now);
        println!("Done.");
    }
    println!();

    // ==================== Output ====================
    let deployed = DeployedAddresses {
        reserve_token: reserve_addr.to_formatted_string(),
        f_token: f_token_addr.to_formatted_string(),
        x_token: x_token_addr.to_formatted_string(),
        protocol: protocol_addr.to_formatted_string(),
        stability_pool: stability_pool_addr.to_formatted_string(),
    };
    let json = serde_json::to_string_pretty(&deployed)?;
    std::fs::write(&config.output_path, &json).map_err(|source| DeployError::WriteOutput {
        path: config.output_path.clone(),
        source,
    })?;

    println!("=== Deployment Complete ===");
    println!();
    println!("Contract Addresses:");
    println!("  ReserveToken:    {:?}", reserve_addr);
    println!("  fToken:          {:?}", f_token_addr);
    println!("  xToken:          {:?}", x_token_addr);
    println!("  LeafsiiProtocol: {:?}", protocol_addr);
    println!("  StabilityPool:   {:?}", stability_pool_addr);
    println!();
    println!("Addresses written to {}", config.output_path);
    println!("Bootstrap with `bootstrap(initial_reserve)` once the reserve is approved.");
    Ok(())
}

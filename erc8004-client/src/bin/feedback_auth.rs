//! Issue a feedback authorization as the agent owner
//!
//! Usage: feedback_auth <agent_id> <client_address> [validity_seconds]
//!
//! Reads the registry configuration from ERC8004_* variables (a `.env` file is
//! loaded first) and the signing key from ERC8004_SIGNER_PRIVATE_KEY. Prints the
//! envelope hex to pass to the client, and the signed record as JSON.

use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use erc8004_client::abi::common::{parse_address, parse_uint256};
use erc8004_client::{Eip8004Config, FeedbackClient, LocalWalletSigner, RpcIdentityRegistry, RpcReputationRegistry};

const DEFAULT_VALIDITY_SECS: u64 = 3600;

async fn run(args: &[String]) -> Result<(), String> {
    if args.len() < 3 {
        return Err(format!(
            "Usage: {} <agent_id> <client_address> [validity_seconds]",
            args.first().map(String::as_str).unwrap_or("feedback_auth")
        ));
    }

    let agent_id = parse_uint256(&args[1]).map_err(|e| e.to_string())?;
    let client_address = parse_address(&args[2]).map_err(|e| e.to_string())?;
    let validity_secs = match args.get(3) {
        Some(s) => s
            .parse::<u64>()
            .map_err(|e| format!("Invalid validity_seconds '{}': {}", s, e))?,
        None => DEFAULT_VALIDITY_SECS,
    };

    let config = Eip8004Config::from_env();
    if !config.is_reputation_deployed() {
        return Err(format!(
            "No reputation registry configured for {} (set ERC8004_REPUTATION_REGISTRY)",
            config.chain_name
        ));
    }
    log::info!(
        "[ERC8004] Using {} (chain {}) via {}",
        config.chain_name,
        config.chain_id,
        config.rpc_endpoint
    );

    let signer = Arc::new(LocalWalletSigner::from_env()?);
    let registry = Arc::new(RpcReputationRegistry::read_only(&config).map_err(|e| e.to_string())?);
    let identity = Arc::new(RpcIdentityRegistry::new(&config).map_err(|e| e.to_string())?);
    let deployment = config.deployment().map_err(|e| e.to_string())?;

    let client = FeedbackClient::new(registry, signer, deployment).with_authority(identity);
    let authorization = client
        .authorize(agent_id, client_address, Duration::from_secs(validity_secs))
        .await
        .map_err(|e| e.to_string())?;

    let record_json = serde_json::to_string_pretty(&authorization.record)
        .map_err(|e| format!("Failed to serialize record: {}", e))?;

    println!("{}", authorization.envelope.to_hex());
    println!("{}", record_json);
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args).await {
        log::error!("[ERC8004] {}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

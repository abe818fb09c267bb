//! ERC-8004 Configuration
//!
//! Contract addresses and chain configuration for ERC-8004 registries.

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::abi::common::parse_address;
use crate::auth::Deployment;
use crate::error::Result;

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

pub mod env_vars {
    pub const CHAIN_ID: &str = "ERC8004_CHAIN_ID";
    pub const IDENTITY_REGISTRY: &str = "ERC8004_IDENTITY_REGISTRY";
    pub const REPUTATION_REGISTRY: &str = "ERC8004_REPUTATION_REGISTRY";
    pub const RPC_ENDPOINT: &str = "ERC8004_RPC_ENDPOINT";
}

/// ERC-8004 registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Eip8004Config {
    /// Identity Registry contract address
    pub identity_registry: String,
    /// Reputation Registry contract address
    pub reputation_registry: String,
    /// Chain ID
    pub chain_id: u64,
    /// Chain name for display
    pub chain_name: String,
    /// JSON-RPC endpoint
    pub rpc_endpoint: String,
    /// Block explorer URL
    pub explorer_url: String,
}

impl Eip8004Config {
    /// Base Mainnet configuration
    pub fn base_mainnet() -> Self {
        Self {
            identity_registry: "0xa23a42D266653846e05d8f356a52298844537472".to_string(),
            reputation_registry: ZERO_ADDRESS.to_string(),
            chain_id: 8453,
            chain_name: "Base".to_string(),
            rpc_endpoint: "https://mainnet.base.org".to_string(),
            explorer_url: "https://basescan.org".to_string(),
        }
    }

    /// Base Sepolia testnet configuration (for development)
    pub fn base_sepolia() -> Self {
        Self {
            identity_registry: ZERO_ADDRESS.to_string(),
            reputation_registry: ZERO_ADDRESS.to_string(),
            chain_id: 84532,
            chain_name: "Base Sepolia".to_string(),
            rpc_endpoint: "https://sepolia.base.org".to_string(),
            explorer_url: "https://sepolia.basescan.org".to_string(),
        }
    }

    /// Load from environment or use defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Preset chosen by `ERC8004_CHAIN_ID`, then per-field overrides
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let chain_id = lookup(env_vars::CHAIN_ID)
            .and_then(|s| s.parse().ok())
            .unwrap_or(8453);

        let mut config = match chain_id {
            84532 => Self::base_sepolia(),
            _ => Self::base_mainnet(),
        };
        config.chain_id = chain_id;

        if let Some(addr) = lookup(env_vars::IDENTITY_REGISTRY) {
            config.identity_registry = addr;
        }
        if let Some(addr) = lookup(env_vars::REPUTATION_REGISTRY) {
            config.reputation_registry = addr;
        }
        if let Some(rpc) = lookup(env_vars::RPC_ENDPOINT) {
            config.rpc_endpoint = rpc;
        }

        config
    }

    /// Check if contracts are deployed (not zero address)
    pub fn is_identity_deployed(&self) -> bool {
        !self.identity_registry.eq_ignore_ascii_case(ZERO_ADDRESS)
    }

    pub fn is_reputation_deployed(&self) -> bool {
        !self.reputation_registry.eq_ignore_ascii_case(ZERO_ADDRESS)
    }

    pub fn identity_registry_address(&self) -> Result<Address> {
        parse_address(&self.identity_registry)
    }

    pub fn reputation_registry_address(&self) -> Result<Address> {
        parse_address(&self.reputation_registry)
    }

    /// Chain + identity registry that authorizations must be bound to
    pub fn deployment(&self) -> Result<Deployment> {
        Ok(Deployment {
            chain_id: U256::from(self.chain_id),
            identity_registry: self.identity_registry_address()?,
        })
    }

    /// Get block explorer URL for a transaction
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, tx_hash)
    }

    /// Get block explorer URL for an address
    pub fn address_url(&self, address: &str) -> String {
        format!("{}/address/{}", self.explorer_url, address)
    }

    /// Format agent registry string
    pub fn agent_registry_string(&self) -> String {
        format!("eip155:{}:{}", self.chain_id, self.identity_registry.to_lowercase())
    }
}

impl Default for Eip8004Config {
    fn default() -> Self {
        Self::from_env()
    }
}

//! In-process signer backed by an ethers `LocalWallet`

use async_trait::async_trait;
use ethers::core::k256::ecdsa::SigningKey;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Signature};

use super::{FeedbackSigner, SIGNER_PRIVATE_KEY_ENV};

/// Signer that holds its private key in memory
pub struct LocalWalletSigner {
    wallet: LocalWallet,
}

impl LocalWalletSigner {
    /// Create signer from environment variable
    ///
    /// Requires: ERC8004_SIGNER_PRIVATE_KEY
    pub fn from_env() -> Result<Self, String> {
        let private_key = std::env::var(SIGNER_PRIVATE_KEY_ENV)
            .map_err(|_| format!("{} not set", SIGNER_PRIVATE_KEY_ENV))?;

        Self::from_private_key(&private_key)
    }

    /// Create signer from a private key string (hex, with or without 0x prefix)
    pub fn from_private_key(private_key: &str) -> Result<Self, String> {
        let key_hex = private_key.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let key_bytes = hex::decode(key_hex)
            .map_err(|e| format!("Invalid private key hex: {}", e))?;

        if key_bytes.len() != 32 {
            return Err(format!("Private key must be 32 bytes, got {}", key_bytes.len()));
        }

        let signing_key = SigningKey::from_bytes(key_bytes.as_slice().into())
            .map_err(|e| format!("Invalid private key: {}", e))?;

        Ok(Self {
            wallet: LocalWallet::from(signing_key),
        })
    }

    /// Underlying wallet, e.g. for sending transactions as this address
    pub fn wallet(&self) -> &LocalWallet {
        &self.wallet
    }
}

#[async_trait]
impl FeedbackSigner for LocalWalletSigner {
    async fn sign_personal_message(&self, message: &[u8]) -> Result<Signature, String> {
        self.wallet
            .sign_message(message)
            .await
            .map_err(|e| format!("Local wallet signing failed: {}", e))
    }

    fn address(&self) -> Address {
        self.wallet.address()
    }

    fn mode_name(&self) -> &'static str {
        "local"
    }
}

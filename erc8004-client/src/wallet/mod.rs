//! Signing capability abstraction
//!
//! Authorizations are signed by whoever holds the agent owner's (or operator's)
//! key. This crate never owns that key: callers inject a [`FeedbackSigner`],
//! which may wrap a local key, a hardware wallet, or a remote signing service.
//!
//! - [`LocalWalletSigner`]: in-process key loaded from `ERC8004_SIGNER_PRIVATE_KEY`

mod local;

pub use local::LocalWalletSigner;

use async_trait::async_trait;
use ethers::types::{Address, Signature};

/// Environment variable holding the signer key for [`LocalWalletSigner::from_env`]
pub const SIGNER_PRIVATE_KEY_ENV: &str = "ERC8004_SIGNER_PRIVATE_KEY";

/// A capability that produces EIP-191 personal-message signatures
#[async_trait]
pub trait FeedbackSigner: Send + Sync {
    /// Sign `message` with the `"\x19Ethereum Signed Message:\n" + len` prefix applied.
    /// May suspend on external approval (hardware device, remote service).
    async fn sign_personal_message(&self, message: &[u8]) -> Result<Signature, String>;

    /// Address whose signature this capability produces
    fn address(&self) -> Address;

    /// Get the mode name for logging
    fn mode_name(&self) -> &'static str;
}

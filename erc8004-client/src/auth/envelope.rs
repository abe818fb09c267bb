//! Authorization envelope: canonical record bytes followed by the signature
//!
//! ```text
//! envelope = abi.encode(record)   (224 bytes)
//!         ++ r(32) ++ s(32) ++ v(1)
//! ```

use ethers::types::{Address, Signature};

use super::record::{AuthorizationRecord, RECORD_ENCODED_LEN};
use crate::error::{FeedbackAuthError, RejectionReason, Result};

/// Length of a secp256k1 signature (r ++ s ++ v)
pub const SIGNATURE_LEN: usize = 65;

/// Total envelope length
pub const ENVELOPE_LEN: usize = RECORD_ENCODED_LEN + SIGNATURE_LEN;

/// The byte blob submitted on-chain as `feedbackAuth`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationEnvelope(Vec<u8>);

impl AuthorizationEnvelope {
    pub fn build(record: &AuthorizationRecord, signature: &Signature) -> Self {
        let mut bytes = record.encode();
        bytes.extend_from_slice(&signature.to_vec());
        Self(bytes)
    }

    /// Wrap bytes received from elsewhere. Nothing is validated until [`Self::split`].
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let trimmed = hex_str.trim();
        let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        hex::decode(hex_part)
            .map(Self)
            .map_err(|e| FeedbackAuthError::validation(format!("Invalid envelope hex: {}", e)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }

    /// Cut at the fixed record boundary and parse both halves.
    pub fn split(&self) -> std::result::Result<(AuthorizationRecord, Signature), RejectionReason> {
        if self.0.len() != ENVELOPE_LEN {
            return Err(RejectionReason::Malformed(format!(
                "expected {} bytes, got {}",
                ENVELOPE_LEN,
                self.0.len()
            )));
        }

        let (record_bytes, sig_bytes) = self.0.split_at(RECORD_ENCODED_LEN);
        let record = AuthorizationRecord::decode(record_bytes)
            .map_err(|e| RejectionReason::Malformed(e.to_string()))?;
        let signature = Signature::try_from(sig_bytes).map_err(|_| RejectionReason::BadSignature)?;

        Ok((record, signature))
    }

    /// Recover the address that signed this envelope's record digest.
    pub fn recover_signer(&self) -> std::result::Result<Address, RejectionReason> {
        let (record, signature) = self.split()?;
        recover_digest_signer(&record.digest(), &signature)
    }
}

/// Recover the EIP-191 personal-message signer of a record digest
pub fn recover_digest_signer(
    digest: &[u8; 32],
    signature: &Signature,
) -> std::result::Result<Address, RejectionReason> {
    // Vec<u8> becomes RecoveryMessage::Data, which applies the personal prefix.
    // A bare [u8; 32] would be treated as an already-prefixed hash.
    signature
        .recover(digest.to_vec())
        .map_err(|_| RejectionReason::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::common::parse_address;
    use crate::wallet::{FeedbackSigner, LocalWalletSigner};
    use ethers::types::U256;

    const OWNER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn record_for(signer: Address) -> AuthorizationRecord {
        AuthorizationRecord {
            agent_id: U256::from(1),
            client_address: parse_address("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap(),
            index_limit: 1,
            expiry: U256::from(4_000_000_000u64),
            chain_id: U256::from(8453),
            identity_registry: parse_address("0xa23a42d266653846e05d8f356a52298844537472").unwrap(),
            signer_address: signer,
        }
    }

    async fn signed_envelope() -> (AuthorizationRecord, AuthorizationEnvelope) {
        let signer = LocalWalletSigner::from_private_key(OWNER_KEY).unwrap();
        let record = record_for(signer.address());
        let sig = signer.sign_personal_message(&record.digest()).await.unwrap();
        let envelope = AuthorizationEnvelope::build(&record, &sig);
        (record, envelope)
    }

    #[tokio::test]
    async fn test_envelope_is_encoding_then_signature() {
        let (record, envelope) = signed_envelope().await;
        assert_eq!(envelope.as_bytes().len(), ENVELOPE_LEN);
        assert_eq!(&envelope.as_bytes()[..RECORD_ENCODED_LEN], record.encode().as_slice());

        let v = envelope.as_bytes()[ENVELOPE_LEN - 1];
        assert!(v == 27 || v == 28);
    }

    #[tokio::test]
    async fn test_split_and_recover() {
        let (record, envelope) = signed_envelope().await;
        let (parsed, _sig) = envelope.split().unwrap();
        assert_eq!(parsed, record);
        assert_eq!(envelope.recover_signer().unwrap(), record.signer_address);
    }

    #[tokio::test]
    async fn test_repeat_signing_recovers_same_signer() {
        let signer = LocalWalletSigner::from_private_key(OWNER_KEY).unwrap();
        let record = record_for(signer.address());
        let digest = record.digest();

        let first = signer.sign_personal_message(&digest).await.unwrap();
        let second = signer.sign_personal_message(&digest).await.unwrap();

        assert_eq!(recover_digest_signer(&digest, &first).unwrap(), signer.address());
        assert_eq!(recover_digest_signer(&digest, &second).unwrap(), signer.address());
    }

    #[tokio::test]
    async fn test_hex_roundtrip() {
        let (_, envelope) = signed_envelope().await;
        let parsed = AuthorizationEnvelope::from_hex(&envelope.to_hex()).unwrap();
        assert_eq!(parsed, envelope);
        assert!(AuthorizationEnvelope::from_hex("0xzz").is_err());
    }

    #[tokio::test]
    async fn test_truncated_envelope_is_malformed() {
        let (_, envelope) = signed_envelope().await;
        let mut bytes = envelope.into_bytes();
        bytes.truncate(ENVELOPE_LEN - 1);
        let err = AuthorizationEnvelope::from_bytes(bytes).split().unwrap_err();
        assert!(matches!(err, RejectionReason::Malformed(_)));
    }

    #[tokio::test]
    async fn test_tampered_record_changes_signer() {
        let (record, envelope) = signed_envelope().await;
        let mut bytes = envelope.into_bytes();
        // bump indexLimit from 1 to 2
        bytes[95] = 2;
        let tampered = AuthorizationEnvelope::from_bytes(bytes);
        let recovered = tampered.recover_signer();
        assert!(recovered.map(|a| a != record.signer_address).unwrap_or(true));
    }
}

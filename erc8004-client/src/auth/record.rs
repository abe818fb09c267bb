//! The signed authorization record and its canonical encoding
//!
//! The record is encoded exactly like Solidity's
//! `abi.encode(uint256, address, uint64, uint256, uint256, address, address)`:
//! seven 32-byte big-endian words, addresses left-padded with 12 zero bytes.
//! The reputation registry re-derives the same bytes, so this layout is
//! part of the wire protocol.

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::abi::common::keccak256;
use crate::error::{FeedbackAuthError, Result};

/// Length of the canonical record encoding (7 words)
pub const RECORD_ENCODED_LEN: usize = 7 * 32;

/// Authorization granted by an agent's owner to one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRecord {
    pub agent_id: U256,
    pub client_address: Address,
    /// Feedback index this authorization permits
    pub index_limit: u64,
    /// Unix seconds after which the authorization is void
    pub expiry: U256,
    pub chain_id: U256,
    pub identity_registry: Address,
    pub signer_address: Address,
}

impl AuthorizationRecord {
    fn param_types() -> [ParamType; 7] {
        [
            ParamType::Uint(256),
            ParamType::Address,
            ParamType::Uint(64),
            ParamType::Uint(256),
            ParamType::Uint(256),
            ParamType::Address,
            ParamType::Address,
        ]
    }

    /// Canonical tuple encoding, always [`RECORD_ENCODED_LEN`] bytes
    pub fn encode(&self) -> Vec<u8> {
        abi::encode(&[
            Token::Uint(self.agent_id),
            Token::Address(self.client_address),
            Token::Uint(U256::from(self.index_limit)),
            Token::Uint(self.expiry),
            Token::Uint(self.chain_id),
            Token::Address(self.identity_registry),
            Token::Address(self.signer_address),
        ])
    }

    /// keccak256 over [`Self::encode`]; this is what gets personal-signed
    pub fn digest(&self) -> [u8; 32] {
        keccak256(&self.encode())
    }

    /// Parse a canonical encoding back into a record.
    ///
    /// Strict about layout: exact length, zeroed address padding, and an
    /// `indexLimit` that fits in 64 bits.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != RECORD_ENCODED_LEN {
            return Err(FeedbackAuthError::validation(format!(
                "Authorization record must be {} bytes, got {}",
                RECORD_ENCODED_LEN,
                data.len()
            )));
        }

        for (slot, name) in [(1, "clientAddress"), (5, "identityRegistry"), (6, "signerAddress")] {
            let word = &data[slot * 32..slot * 32 + 12];
            if word.iter().any(|b| *b != 0) {
                return Err(FeedbackAuthError::validation(format!(
                    "Dirty padding in {} slot",
                    name
                )));
            }
        }

        let tokens = abi::decode(&Self::param_types(), data)
            .map_err(|e| FeedbackAuthError::validation(format!("Invalid record encoding: {}", e)))?;

        match tokens.as_slice() {
            [
                Token::Uint(agent_id),
                Token::Address(client_address),
                Token::Uint(index_limit),
                Token::Uint(expiry),
                Token::Uint(chain_id),
                Token::Address(identity_registry),
                Token::Address(signer_address),
            ] => {
                if *index_limit > U256::from(u64::MAX) {
                    return Err(FeedbackAuthError::validation(format!(
                        "indexLimit {} exceeds uint64",
                        index_limit
                    )));
                }
                Ok(Self {
                    agent_id: *agent_id,
                    client_address: *client_address,
                    index_limit: index_limit.as_u64(),
                    expiry: *expiry,
                    chain_id: *chain_id,
                    identity_registry: *identity_registry,
                    signer_address: *signer_address,
                })
            }
            _ => Err(FeedbackAuthError::validation("Unexpected record layout")),
        }
    }

    /// True once `now` has reached the expiry
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expiry <= U256::from(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::common::parse_address;

    fn sample_record() -> AuthorizationRecord {
        AuthorizationRecord {
            agent_id: U256::from(1),
            client_address: parse_address("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap(),
            index_limit: 1,
            expiry: U256::from(1_700_003_600u64),
            chain_id: U256::from(8453),
            identity_registry: parse_address("0xa23a42d266653846e05d8f356a52298844537472").unwrap(),
            signer_address: parse_address("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266").unwrap(),
        }
    }

    #[test]
    fn test_encoding_layout() {
        let record = sample_record();
        let encoded = record.encode();
        assert_eq!(encoded.len(), RECORD_ENCODED_LEN);

        // agentId word
        assert_eq!(encoded[31], 1);
        assert!(encoded[..31].iter().all(|b| *b == 0));
        // clientAddress: 12 zero bytes then the address
        assert!(encoded[32..44].iter().all(|b| *b == 0));
        assert_eq!(&encoded[44..64], record.client_address.as_bytes());
        // indexLimit: uint64 right-aligned in its word
        assert_eq!(&encoded[88..96], &1u64.to_be_bytes());
        // chainId
        assert_eq!(&encoded[156..160], &8453u32.to_be_bytes());
        // signerAddress is the last word
        assert_eq!(&encoded[204..224], record.signer_address.as_bytes());
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let record = sample_record();
        assert_eq!(record.encode(), record.encode());
        assert_eq!(record.digest(), record.clone().digest());
    }

    #[test]
    fn test_every_field_changes_digest() {
        let base = sample_record();
        let other = parse_address("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap();

        let variants = vec![
            AuthorizationRecord { agent_id: U256::from(2), ..base.clone() },
            AuthorizationRecord { client_address: other, ..base.clone() },
            AuthorizationRecord { index_limit: 2, ..base.clone() },
            AuthorizationRecord { expiry: base.expiry + U256::one(), ..base.clone() },
            AuthorizationRecord { chain_id: U256::from(84532), ..base.clone() },
            AuthorizationRecord { identity_registry: other, ..base.clone() },
            AuthorizationRecord { signer_address: other, ..base.clone() },
        ];

        let mut digests = vec![base.digest()];
        for variant in &variants {
            let digest = variant.digest();
            assert!(!digests.contains(&digest), "digest collision for {:?}", variant);
            digests.push(digest);
        }
    }

    #[test]
    fn test_decode_roundtrip() {
        let record = sample_record();
        assert_eq!(AuthorizationRecord::decode(&record.encode()).unwrap(), record);
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        let mut encoded = sample_record().encode();
        assert!(AuthorizationRecord::decode(&encoded[..200]).is_err());

        // dirty address padding
        encoded[32] = 0x01;
        assert!(AuthorizationRecord::decode(&encoded).is_err());

        // indexLimit wider than 64 bits
        let mut encoded = sample_record().encode();
        encoded[64 + 23] = 0x01;
        assert!(AuthorizationRecord::decode(&encoded).is_err());
    }

    #[test]
    fn test_expiry_check() {
        let record = sample_record();
        assert!(!record.is_expired_at(1_700_003_599));
        assert!(record.is_expired_at(1_700_003_600));
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert!(json.get("indexLimit").is_some());
        assert!(json.get("identityRegistry").is_some());
    }
}

//! Index and expiry policy for new authorizations
//!
//! An authorization permits exactly the next unused feedback slot for its
//! (agent, client) pair. Once the client consumes that slot, every older
//! authorization for the pair is obsolete. There is no other revocation.
//!
//! Issuance is not locked: two authorizations built from the same index read
//! carry the same `indexLimit`, and the registry accepts only the first one
//! submitted. Callers issuing concurrently for one pair must serialize.

use std::time::Duration;

use ethers::types::{Address, U256};

use super::record::AuthorizationRecord;
use crate::error::{FeedbackAuthError, Result};

/// Deployment the authorization is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub chain_id: U256,
    pub identity_registry: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuancePolicy {
    validity: Duration,
}

impl IssuancePolicy {
    /// `validity` is caller-chosen; there is no default window.
    pub fn new(validity: Duration) -> Result<Self> {
        if validity.as_secs() == 0 {
            return Err(FeedbackAuthError::validation(
                "Validity window must be at least one second",
            ));
        }
        Ok(Self { validity })
    }

    pub fn from_secs(seconds: u64) -> Result<Self> {
        Self::new(Duration::from_secs(seconds))
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// The only index an authorization may permit after `last_used`
    pub fn next_index(last_used: u64) -> Result<u64> {
        last_used.checked_add(1).ok_or_else(|| {
            FeedbackAuthError::validation("Feedback index space exhausted for this client")
        })
    }

    pub fn expiry_at(&self, now: u64) -> U256 {
        U256::from(now) + U256::from(self.validity.as_secs())
    }

    /// Build the record for the next slot, valid from `now` for the policy window.
    pub fn draft(
        &self,
        agent_id: U256,
        client_address: Address,
        last_used: u64,
        now: u64,
        deployment: Deployment,
        signer_address: Address,
    ) -> Result<AuthorizationRecord> {
        Ok(AuthorizationRecord {
            agent_id,
            client_address,
            index_limit: Self::next_index(last_used)?,
            expiry: self.expiry_at(now),
            chain_id: deployment.chain_id,
            identity_registry: deployment.identity_registry,
            signer_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::common::parse_address;

    fn deployment() -> Deployment {
        Deployment {
            chain_id: U256::from(8453),
            identity_registry: parse_address("0xa23a42d266653846e05d8f356a52298844537472").unwrap(),
        }
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(matches!(
            IssuancePolicy::from_secs(0),
            Err(FeedbackAuthError::LocalValidation(_))
        ));
    }

    #[test]
    fn test_next_index() {
        assert_eq!(IssuancePolicy::next_index(0).unwrap(), 1);
        assert_eq!(IssuancePolicy::next_index(41).unwrap(), 42);
        assert!(IssuancePolicy::next_index(u64::MAX).is_err());
    }

    #[test]
    fn test_draft() {
        let policy = IssuancePolicy::from_secs(3600).unwrap();
        let client = parse_address("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
        let signer = parse_address("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266").unwrap();

        let record = policy
            .draft(U256::from(1), client, 0, 1_700_000_000, deployment(), signer)
            .unwrap();

        assert_eq!(record.index_limit, 1);
        assert_eq!(record.expiry, U256::from(1_700_003_600u64));
        assert_eq!(record.chain_id, U256::from(8453));
        assert_eq!(record.client_address, client);
        assert_eq!(record.signer_address, signer);
        assert!(!record.is_expired_at(1_700_000_000));
    }
}

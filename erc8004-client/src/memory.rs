//! In-memory registry that enforces the same rules as the deployed contracts
//!
//! Used as the registry double in tests and for dry runs. Verification goes
//! through [`EnvelopeVerifier`], then signer authority and self-feedback are
//! checked against the owners and operators registered here.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use parking_lot::Mutex;

use crate::abi::common::{decode_tag, keccak256};
use crate::auth::{Deployment, EnvelopeVerifier, IndexRule, SubmissionContext};
use crate::error::{FeedbackAuthError, RejectionReason, Result};
use crate::registry::{AgentAuthority, ReputationRegistry};
use crate::types::{FeedbackEntry, FeedbackReceipt, FeedbackSubmission, MAX_SCORE};

#[derive(Debug, Clone)]
struct StoredFeedback {
    score: u8,
    tag1: [u8; 32],
    tag2: [u8; 32],
    revoked: bool,
}

#[derive(Default)]
struct RegistryState {
    owners: HashMap<U256, Address>,
    operators: HashMap<U256, HashSet<Address>>,
    /// Contract wallet -> key its `isValidSignature` accepts
    contract_wallets: HashMap<Address, Address>,
    last_index: HashMap<(U256, Address), u64>,
    feedback: HashMap<(U256, Address, u64), StoredFeedback>,
    block_number: u64,
}

pub struct InMemoryRegistry {
    verifier: EnvelopeVerifier,
    /// Fixed clock; `None` reads the system time
    clock: Mutex<Option<u64>>,
    state: Mutex<RegistryState>,
    calls: AtomicUsize,
}

impl InMemoryRegistry {
    pub fn new(deployment: Deployment) -> Self {
        Self {
            verifier: EnvelopeVerifier::new(deployment),
            clock: Mutex::new(None),
            state: Mutex::new(RegistryState::default()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_index_rule(mut self, rule: IndexRule) -> Self {
        self.verifier = self.verifier.with_index_rule(rule);
        self
    }

    pub fn deployment(&self) -> Deployment {
        self.verifier.deployment()
    }

    /// Mint (or transfer) an agent to `owner`
    pub fn register_agent(&self, agent_id: U256, owner: Address) {
        self.state.lock().owners.insert(agent_id, owner);
    }

    pub fn add_operator(&self, agent_id: U256, operator: Address) {
        self.state
            .lock()
            .operators
            .entry(agent_id)
            .or_default()
            .insert(operator);
    }

    /// Treat `wallet` as an ERC-1271 contract whose signatures come from `controller`
    pub fn register_contract_wallet(&self, wallet: Address, controller: Address) {
        self.state.lock().contract_wallets.insert(wallet, controller);
    }

    pub fn set_time(&self, now: Option<u64>) {
        *self.clock.lock() = now;
    }

    pub fn now(&self) -> u64 {
        match *self.clock.lock() {
            Some(now) => now,
            None => chrono::Utc::now().timestamp().max(0) as u64,
        }
    }

    /// Boundary calls served so far (reads and submissions)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn read_feedback(&self, agent_id: U256, client_address: Address, index: u64) -> Option<FeedbackEntry> {
        let state = self.state.lock();
        state
            .feedback
            .get(&(agent_id, client_address, index))
            .map(|stored| FeedbackEntry {
                agent_id,
                client_address,
                feedback_index: index,
                score: stored.score,
                tag1: decode_tag(&stored.tag1),
                tag2: decode_tag(&stored.tag2),
                is_revoked: stored.revoked,
            })
    }

    /// Only the client that gave the feedback may revoke it
    pub fn revoke_feedback(&self, agent_id: U256, client_address: Address, index: u64) -> Result<()> {
        let mut state = self.state.lock();
        let stored = state
            .feedback
            .get_mut(&(agent_id, client_address, index))
            .ok_or_else(|| {
                FeedbackAuthError::Rejected(RejectionReason::Reverted(format!(
                    "no feedback {} from {:?}",
                    index, client_address
                )))
            })?;
        stored.revoked = true;
        Ok(())
    }

    fn is_authorized(state: &RegistryState, agent_id: U256, signer: Address) -> bool {
        state.owners.get(&agent_id) == Some(&signer)
            || state
                .operators
                .get(&agent_id)
                .map(|ops| ops.contains(&signer))
                .unwrap_or(false)
    }

    fn accept(
        &self,
        state: &mut RegistryState,
        submission: &FeedbackSubmission,
    ) -> std::result::Result<u64, RejectionReason> {
        if i64::from(submission.score) > MAX_SCORE {
            return Err(RejectionReason::ScoreOutOfRange);
        }

        let owner = *state
            .owners
            .get(&submission.agent_id)
            .ok_or_else(|| RejectionReason::Reverted("agent does not exist".to_string()))?;

        if owner == submission.client_address
            || Self::is_authorized(state, submission.agent_id, submission.client_address)
        {
            return Err(RejectionReason::SelfFeedback);
        }

        let key = (submission.agent_id, submission.client_address);
        let last_used = state.last_index.get(&key).copied().unwrap_or(0);
        let ctx = SubmissionContext {
            agent_id: submission.agent_id,
            client_address: submission.client_address,
            last_used_index: last_used,
            now: self.now(),
        };
        let wallets = &state.contract_wallets;
        let record = self.verifier.verify_with(&submission.envelope, &ctx, |signer, recovered| {
            signer == recovered || wallets.get(&signer) == Some(&recovered)
        })?;

        if !Self::is_authorized(state, record.agent_id, record.signer_address) {
            return Err(RejectionReason::UnauthorizedSigner);
        }

        let index = last_used
            .checked_add(1)
            .ok_or(RejectionReason::IndexExhausted)?;
        state.last_index.insert(key, index);
        state.feedback.insert(
            (submission.agent_id, submission.client_address, index),
            StoredFeedback {
                score: submission.score,
                tag1: submission.tag1,
                tag2: submission.tag2,
                revoked: false,
            },
        );
        Ok(index)
    }
}

#[async_trait]
impl ReputationRegistry for InMemoryRegistry {
    async fn last_index(&self, agent_id: U256, client_address: Address) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state
            .lock()
            .last_index
            .get(&(agent_id, client_address))
            .copied()
            .unwrap_or(0))
    }

    async fn submit_feedback(&self, submission: &FeedbackSubmission) -> Result<FeedbackReceipt> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock();
        let index = self.accept(&mut state, submission).map_err(|reason| {
            log::warn!("[ERC8004] In-memory registry rejected feedback: {}", reason);
            FeedbackAuthError::Rejected(reason)
        })?;

        state.block_number += 1;
        let mut preimage = submission.envelope.as_bytes().to_vec();
        preimage.extend_from_slice(&state.block_number.to_be_bytes());

        Ok(FeedbackReceipt {
            tx_hash: H256::from(keccak256(&preimage)),
            feedback_index: index,
            block_number: Some(state.block_number),
        })
    }
}

#[async_trait]
impl AgentAuthority for InMemoryRegistry {
    async fn is_authorized_signer(&self, agent_id: U256, signer: Address) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::is_authorized(&self.state.lock(), agent_id, signer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::common::{encode_tag, parse_address};
    use crate::auth::{AuthorizationEnvelope, AuthorizationRecord, IssuancePolicy};
    use crate::types::Feedback;
    use crate::wallet::{FeedbackSigner, LocalWalletSigner};

    const OWNER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    // Hardhat account #1
    const STRANGER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const NOW: u64 = 1_700_000_000;

    fn deployment() -> Deployment {
        Deployment {
            chain_id: U256::from(8453),
            identity_registry: parse_address("0xa23a42d266653846e05d8f356a52298844537472").unwrap(),
        }
    }

    fn client() -> Address {
        Address::repeat_byte(0xaa)
    }

    fn registry() -> (InMemoryRegistry, LocalWalletSigner) {
        let owner = LocalWalletSigner::from_private_key(OWNER_KEY).unwrap();
        let registry = InMemoryRegistry::new(deployment());
        registry.register_agent(U256::from(1), owner.address());
        registry.set_time(Some(NOW));
        (registry, owner)
    }

    async fn submission(signer: &LocalWalletSigner, record: &AuthorizationRecord, score: u8) -> FeedbackSubmission {
        let sig = signer.sign_personal_message(&record.digest()).await.unwrap();
        let mut submission = FeedbackSubmission::new(
            record.agent_id,
            record.client_address,
            &Feedback::new(50),
            AuthorizationEnvelope::build(record, &sig),
        )
        .unwrap();
        submission.score = score;
        submission.tag1 = encode_tag("uptime").unwrap();
        submission
    }

    fn draft(signer: Address, last_used: u64) -> AuthorizationRecord {
        IssuancePolicy::from_secs(3600)
            .unwrap()
            .draft(U256::from(1), client(), last_used, NOW, deployment(), signer)
            .unwrap()
    }

    #[tokio::test]
    async fn test_accepts_and_advances_index() {
        let (registry, owner) = registry();
        let sub = submission(&owner, &draft(owner.address(), 0), 95).await;

        let receipt = registry.submit_feedback(&sub).await.unwrap();
        assert_eq!(receipt.feedback_index, 1);
        assert_eq!(registry.last_index(U256::from(1), client()).await.unwrap(), 1);

        let entry = registry.read_feedback(U256::from(1), client(), 1).unwrap();
        assert_eq!(entry.score, 95);
        assert_eq!(entry.tag1.as_deref(), Some("uptime"));
        assert!(!entry.is_revoked);
    }

    #[tokio::test]
    async fn test_replay_rejected() {
        let (registry, owner) = registry();
        let sub = submission(&owner, &draft(owner.address(), 0), 95).await;

        registry.submit_feedback(&sub).await.unwrap();
        let err = registry.submit_feedback(&sub).await.unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&RejectionReason::IndexMismatch {
                expected: Some(2),
                got: Some(1)
            })
        );
    }

    #[tokio::test]
    async fn test_headroom_envelope_stores_next_index() {
        let (registry, owner) = registry();
        let registry = registry.with_index_rule(IndexRule::AtLeastNext);
        let first = submission(&owner, &draft(owner.address(), 0), 90).await;
        registry.submit_feedback(&first).await.unwrap();

        // indexLimit 5 with last index 1: stored under 2, not 5
        let sub = submission(&owner, &draft(owner.address(), 4), 80).await;
        let receipt = registry.submit_feedback(&sub).await.unwrap();
        assert_eq!(receipt.feedback_index, 2);
        assert_eq!(registry.last_index(U256::from(1), client()).await.unwrap(), 2);
        assert!(registry.read_feedback(U256::from(1), client(), 5).is_none());
    }

    #[tokio::test]
    async fn test_contract_wallet_signer_accepted() {
        let (registry, owner) = registry();
        let wallet = Address::repeat_byte(0xcc);
        registry.register_agent(U256::from(1), wallet);

        let sub = submission(&owner, &draft(wallet, 0), 70).await;
        let err = registry.submit_feedback(&sub).await.unwrap_err();
        assert_eq!(err.rejection(), Some(&RejectionReason::SignerMismatch));

        registry.register_contract_wallet(wallet, owner.address());
        let receipt = registry.submit_feedback(&sub).await.unwrap();
        assert_eq!(receipt.feedback_index, 1);
    }

    #[tokio::test]
    async fn test_unauthorized_signer_rejected() {
        let (registry, _owner) = registry();
        let stranger = LocalWalletSigner::from_private_key(STRANGER_KEY).unwrap();
        let sub = submission(&stranger, &draft(stranger.address(), 0), 95).await;

        let err = registry.submit_feedback(&sub).await.unwrap_err();
        assert_eq!(err.rejection(), Some(&RejectionReason::UnauthorizedSigner));
    }

    #[tokio::test]
    async fn test_operator_may_sign() {
        let (registry, _owner) = registry();
        let operator = LocalWalletSigner::from_private_key(STRANGER_KEY).unwrap();
        registry.add_operator(U256::from(1), operator.address());

        let sub = submission(&operator, &draft(operator.address(), 0), 10).await;
        assert!(registry.submit_feedback(&sub).await.is_ok());
        assert!(registry.is_authorized_signer(U256::from(1), operator.address()).await.unwrap());
    }

    #[tokio::test]
    async fn test_self_feedback_rejected() {
        let (registry, owner) = registry();
        let mut record = draft(owner.address(), 0);
        record.client_address = owner.address();
        let sub = submission(&owner, &record, 100).await;

        let err = registry.submit_feedback(&sub).await.unwrap_err();
        assert_eq!(err.rejection(), Some(&RejectionReason::SelfFeedback));
    }

    #[tokio::test]
    async fn test_score_above_range_rejected() {
        let (registry, owner) = registry();
        let sub = submission(&owner, &draft(owner.address(), 0), 101).await;
        let err = registry.submit_feedback(&sub).await.unwrap_err();
        assert_eq!(err.rejection(), Some(&RejectionReason::ScoreOutOfRange));
    }

    #[tokio::test]
    async fn test_expiry_uses_registry_clock() {
        let (registry, owner) = registry();
        let sub = submission(&owner, &draft(owner.address(), 0), 95).await;

        registry.set_time(Some(NOW + 3600));
        let err = registry.submit_feedback(&sub).await.unwrap_err();
        assert!(matches!(err.rejection(), Some(RejectionReason::Expired { .. })));
    }

    #[tokio::test]
    async fn test_revoke() {
        let (registry, owner) = registry();
        let sub = submission(&owner, &draft(owner.address(), 0), 95).await;
        registry.submit_feedback(&sub).await.unwrap();

        registry.revoke_feedback(U256::from(1), client(), 1).unwrap();
        assert!(registry.read_feedback(U256::from(1), client(), 1).unwrap().is_revoked);
        assert!(registry.revoke_feedback(U256::from(1), client(), 2).is_err());
    }

    #[tokio::test]
    async fn test_counts_boundary_calls() {
        let (registry, _owner) = registry();
        assert_eq!(registry.call_count(), 0);
        registry.last_index(U256::from(1), client()).await.unwrap();
        assert_eq!(registry.call_count(), 1);
    }
}

//! Feedback submission client
//!
//! Runs the authorization pipeline against a [`ReputationRegistry`]:
//!
//! ```text
//! QUERY_INDEX -> BUILD_RECORD -> SIGN -> SUBMIT -> {CONFIRMED | REJECTED}
//! ```
//!
//! No step is retried and nothing is cached between calls: the index and the
//! clock both move, so any failure restarts from `QUERY_INDEX`.

use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, U256};

use crate::auth::{AuthorizationEnvelope, Deployment, EnvelopeVerifier, IssuancePolicy};
use crate::error::{FeedbackAuthError, RejectionReason, Result};
use crate::registry::{AgentAuthority, ReputationRegistry};
use crate::types::{Feedback, FeedbackAuthorization, FeedbackReceipt, FeedbackSubmission};
use crate::wallet::FeedbackSigner;

pub struct FeedbackClient {
    registry: Arc<dyn ReputationRegistry>,
    signer: Arc<dyn FeedbackSigner>,
    authority: Option<Arc<dyn AgentAuthority>>,
    verifier: EnvelopeVerifier,
    /// Refuse envelopes whose signature does not recover to `signerAddress`
    strict_signer: bool,
}

impl FeedbackClient {
    pub fn new(
        registry: Arc<dyn ReputationRegistry>,
        signer: Arc<dyn FeedbackSigner>,
        deployment: Deployment,
    ) -> Self {
        Self {
            registry,
            signer,
            authority: None,
            verifier: EnvelopeVerifier::new(deployment),
            strict_signer: false,
        }
    }

    /// Check the signer's standing with the identity registry before signing
    pub fn with_authority(mut self, authority: Arc<dyn AgentAuthority>) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Only submit envelopes signed by a plain key. Off by default: an
    /// ERC-1271 contract-wallet signature can only be judged by the registry.
    pub fn with_strict_signer_check(mut self) -> Self {
        self.strict_signer = true;
        self
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    fn now() -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }

    /// QUERY_INDEX -> BUILD_RECORD -> SIGN. The envelope is valid for `validity`
    /// and for exactly the next feedback slot of (`agent_id`, `client_address`).
    pub async fn authorize(
        &self,
        agent_id: U256,
        client_address: Address,
        validity: Duration,
    ) -> Result<FeedbackAuthorization> {
        let policy = IssuancePolicy::new(validity)?;
        let signer_address = self.signer.address();

        if let Some(authority) = &self.authority {
            if !authority.is_authorized_signer(agent_id, signer_address).await? {
                log::warn!(
                    "[ERC8004] {:?} is not owner or operator of agent {}",
                    signer_address,
                    agent_id
                );
                return Err(FeedbackAuthError::Rejected(RejectionReason::UnauthorizedSigner));
            }
        }

        let last_used = self.registry.last_index(agent_id, client_address).await?;
        log::debug!(
            "[ERC8004] Agent {} client {:?}: last index {}",
            agent_id,
            client_address,
            last_used
        );

        let record = policy.draft(
            agent_id,
            client_address,
            last_used,
            Self::now(),
            self.verifier.deployment(),
            signer_address,
        )?;

        let signature = self
            .signer
            .sign_personal_message(&record.digest())
            .await
            .map_err(|e| {
                FeedbackAuthError::Signing(format!("{} signer: {}", self.signer.mode_name(), e))
            })?;

        let envelope = AuthorizationEnvelope::build(&record, &signature);
        log::debug!(
            "[ERC8004] Signed authorization for index {} expiring at {}",
            record.index_limit,
            record.expiry
        );

        Ok(FeedbackAuthorization { record, envelope })
    }

    /// SUBMIT an envelope obtained from [`Self::authorize`] (possibly by another
    /// party). The envelope is pre-checked locally first.
    pub async fn submit(
        &self,
        agent_id: U256,
        client_address: Address,
        feedback: &Feedback,
        envelope: AuthorizationEnvelope,
    ) -> Result<FeedbackReceipt> {
        let submission = FeedbackSubmission::new(agent_id, client_address, feedback, envelope)?;

        let record = self
            .verifier
            .precheck(&submission.envelope, Self::now())
            .map_err(FeedbackAuthError::LocalCheck)?;
        if record.agent_id != agent_id {
            return Err(FeedbackAuthError::LocalCheck(RejectionReason::AgentMismatch));
        }
        if record.client_address != client_address {
            return Err(FeedbackAuthError::LocalCheck(RejectionReason::ClientMismatch));
        }

        if !EnvelopeVerifier::recovers_to_signer(&submission.envelope) {
            if self.strict_signer {
                return Err(FeedbackAuthError::LocalCheck(RejectionReason::SignerMismatch));
            }
            log::warn!(
                "[ERC8004] Signature does not recover to {:?}; leaving it to the registry (contract wallet?)",
                record.signer_address
            );
        }

        match self.registry.submit_feedback(&submission).await {
            Ok(receipt) => {
                log::info!(
                    "[ERC8004] Feedback {} for agent {} confirmed in {:?}",
                    receipt.feedback_index,
                    agent_id,
                    receipt.tx_hash
                );
                Ok(receipt)
            }
            Err(e) => {
                log::warn!("[ERC8004] Feedback for agent {} failed: {}", agent_id, e);
                Err(e)
            }
        }
    }

    /// Full pipeline. The score is validated before any registry call.
    pub async fn give_feedback(
        &self,
        agent_id: U256,
        client_address: Address,
        validity: Duration,
        feedback: &Feedback,
    ) -> Result<FeedbackReceipt> {
        feedback.validate()?;
        let authorization = self.authorize(agent_id, client_address, validity).await?;
        self.submit(agent_id, client_address, feedback, authorization.envelope)
            .await
    }
}

//! Envelope verification, mirroring the reputation registry's checks
//!
//! The registry performs these checks on-chain. Running them locally lets a
//! client flag a bad envelope before paying for a transaction, and backs the
//! in-memory registry used in tests. Signer authority (owner or operator of
//! the agent) needs identity-registry state and is checked by the caller.

use ethers::types::{Address, U256};

use super::envelope::{recover_digest_signer, AuthorizationEnvelope};
use super::policy::Deployment;
use super::record::AuthorizationRecord;
use crate::error::RejectionReason;

/// How `indexLimit` is compared with the pair's last used index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexRule {
    /// `indexLimit == last + 1`
    #[default]
    Exact,
    /// `indexLimit >= last + 1`; lets one authorization cover several submissions
    AtLeastNext,
}

impl IndexRule {
    pub fn check(&self, index_limit: u64, last_used: u64) -> Result<(), RejectionReason> {
        let expected = last_used
            .checked_add(1)
            .ok_or(RejectionReason::IndexExhausted)?;
        let ok = match self {
            IndexRule::Exact => index_limit == expected,
            IndexRule::AtLeastNext => index_limit >= expected,
        };
        if ok {
            Ok(())
        } else {
            Err(RejectionReason::IndexMismatch {
                expected: Some(expected),
                got: Some(index_limit),
            })
        }
    }
}

/// Per-submission facts the verifier compares the envelope against
#[derive(Debug, Clone, Copy)]
pub struct SubmissionContext {
    pub agent_id: U256,
    /// The submitting account (`msg.sender` on-chain)
    pub client_address: Address,
    pub last_used_index: u64,
    pub now: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct EnvelopeVerifier {
    deployment: Deployment,
    index_rule: IndexRule,
}

impl EnvelopeVerifier {
    pub fn new(deployment: Deployment) -> Self {
        Self {
            deployment,
            index_rule: IndexRule::default(),
        }
    }

    pub fn with_index_rule(mut self, rule: IndexRule) -> Self {
        self.index_rule = rule;
        self
    }

    pub fn deployment(&self) -> Deployment {
        self.deployment
    }

    /// Full check, in the order the registry applies it. Returns the record on success.
    pub fn verify(
        &self,
        envelope: &AuthorizationEnvelope,
        ctx: &SubmissionContext,
    ) -> Result<AuthorizationRecord, RejectionReason> {
        self.verify_with(envelope, ctx, |signer, recovered| signer == recovered)
    }

    /// Like [`Self::verify`], with the final signature test delegated to
    /// `accepts_signer(signer_address, recovered)`. Registries that honour
    /// contract-wallet signers resolve the wallet's controlling key there.
    pub fn verify_with<F>(
        &self,
        envelope: &AuthorizationEnvelope,
        ctx: &SubmissionContext,
        accepts_signer: F,
    ) -> Result<AuthorizationRecord, RejectionReason>
    where
        F: Fn(Address, Address) -> bool,
    {
        let (record, signature) = envelope.split()?;

        if record.agent_id != ctx.agent_id {
            return Err(RejectionReason::AgentMismatch);
        }
        if record.client_address != ctx.client_address {
            return Err(RejectionReason::ClientMismatch);
        }
        self.check_binding(&record, ctx.now)?;
        self.index_rule.check(record.index_limit, ctx.last_used_index)?;

        let recovered = recover_digest_signer(&record.digest(), &signature)?;
        if !accepts_signer(record.signer_address, recovered) {
            return Err(RejectionReason::SignerMismatch);
        }

        Ok(record)
    }

    /// Checks that need no registry state: expiry, chain and registry binding.
    pub fn check_binding(&self, record: &AuthorizationRecord, now: u64) -> Result<(), RejectionReason> {
        if record.is_expired_at(now) {
            return Err(RejectionReason::Expired {
                expiry: Some(record.expiry),
                now: Some(now),
            });
        }
        if record.chain_id != self.deployment.chain_id {
            return Err(RejectionReason::ChainMismatch);
        }
        if record.identity_registry != self.deployment.identity_registry {
            return Err(RejectionReason::RegistryMismatch);
        }
        Ok(())
    }

    /// Stateless pre-submission check: decodable, bound to this deployment
    /// and unexpired. The signature is left to [`Self::recovers_to_signer`]
    /// since a contract-wallet signer only verifies on-chain.
    pub fn precheck(
        &self,
        envelope: &AuthorizationEnvelope,
        now: u64,
    ) -> Result<AuthorizationRecord, RejectionReason> {
        let (record, _) = envelope.split()?;
        self.check_binding(&record, now)?;
        Ok(record)
    }

    /// Does the signature recover to `signerAddress` as a plain ECDSA key?
    pub fn recovers_to_signer(envelope: &AuthorizationEnvelope) -> bool {
        envelope
            .split()
            .and_then(|(record, signature)| {
                recover_digest_signer(&record.digest(), &signature)
                    .map(|recovered| recovered == record.signer_address)
            })
            .unwrap_or(false)
    }
}

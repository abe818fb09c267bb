//! Error taxonomy for feedback authorization and submission

use std::fmt;

use ethers::types::U256;

/// Why a registry (or the local pre-check standing in for it) refused an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// `expiry` is not after the verification time. Fields are `None` when
    /// the cause came from revert text rather than a local check.
    Expired { expiry: Option<U256>, now: Option<u64> },
    ChainMismatch,
    RegistryMismatch,
    /// Envelope was issued for a different agent than the one being reviewed
    AgentMismatch,
    /// Envelope was issued to a different client than the submitter
    ClientMismatch,
    /// `indexLimit` does not fit the next unused slot for the pair
    IndexMismatch { expected: Option<u64>, got: Option<u64> },
    /// The pair has used every index a u64 can hold
    IndexExhausted,
    /// Signature bytes do not form a recoverable secp256k1 signature
    BadSignature,
    /// Signature recovers to an address other than `signerAddress`
    SignerMismatch,
    /// `signerAddress` is neither owner nor operator of the agent
    UnauthorizedSigner,
    /// Agent owners and operators cannot review themselves
    SelfFeedback,
    ScoreOutOfRange,
    Malformed(String),
    /// Revert text that did not match a known cause
    Reverted(String),
}

impl RejectionReason {
    /// Classify a revert message coming back from the node.
    pub fn from_revert(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("expired") {
            RejectionReason::Expired {
                expiry: None,
                now: None,
            }
        } else if lower.contains("chain") {
            RejectionReason::ChainMismatch
        } else if lower.contains("registry") {
            RejectionReason::RegistryMismatch
        } else if lower.contains("index") {
            RejectionReason::IndexMismatch {
                expected: None,
                got: None,
            }
        } else if lower.contains("self") {
            RejectionReason::SelfFeedback
        } else if lower.contains("score") {
            RejectionReason::ScoreOutOfRange
        } else if lower.contains("unauthorized") || lower.contains("not authorized") {
            RejectionReason::UnauthorizedSigner
        } else if lower.contains("signature") || lower.contains("signer") {
            RejectionReason::BadSignature
        } else {
            RejectionReason::Reverted(message.to_string())
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Expired {
                expiry: Some(expiry),
                now: Some(now),
            } => write!(f, "authorization expired (expiry {}, now {})", expiry, now),
            RejectionReason::Expired { .. } => write!(f, "authorization expired"),
            RejectionReason::ChainMismatch => write!(f, "chain id mismatch"),
            RejectionReason::RegistryMismatch => write!(f, "identity registry mismatch"),
            RejectionReason::AgentMismatch => write!(f, "agent id mismatch"),
            RejectionReason::ClientMismatch => write!(f, "client address mismatch"),
            RejectionReason::IndexMismatch {
                expected: Some(expected),
                got: Some(got),
            } => write!(f, "index limit {} does not match next index {}", got, expected),
            RejectionReason::IndexMismatch { .. } => write!(f, "index limit does not match next index"),
            RejectionReason::IndexExhausted => write!(f, "feedback index space exhausted"),
            RejectionReason::BadSignature => write!(f, "invalid signature"),
            RejectionReason::SignerMismatch => write!(f, "signature does not match signer address"),
            RejectionReason::UnauthorizedSigner => write!(f, "signer is not authorized for agent"),
            RejectionReason::SelfFeedback => write!(f, "self-feedback not allowed"),
            RejectionReason::ScoreOutOfRange => write!(f, "score must be 0-100"),
            RejectionReason::Malformed(msg) => write!(f, "malformed envelope: {}", msg),
            RejectionReason::Reverted(msg) => write!(f, "reverted: {}", msg),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedbackAuthError {
    /// Caught before any network call
    #[error("invalid input: {0}")]
    LocalValidation(String),

    /// The envelope failed a registry-equivalent check before submission
    #[error("envelope failed local check: {0}")]
    LocalCheck(RejectionReason),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("registry rejected feedback: {0}")]
    Rejected(RejectionReason),

    #[error("network error: {0}")]
    Network(String),
}

impl FeedbackAuthError {
    pub fn validation(msg: impl Into<String>) -> Self {
        FeedbackAuthError::LocalValidation(msg.into())
    }

    /// Returns the rejection reason when the registry refused the submission.
    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            FeedbackAuthError::Rejected(reason) => Some(reason),
            _ => None,
        }
    }

    /// The refusal reason, whether it came from the registry or the local pre-check.
    pub fn reason(&self) -> Option<&RejectionReason> {
        match self {
            FeedbackAuthError::Rejected(reason) | FeedbackAuthError::LocalCheck(reason) => Some(reason),
            _ => None,
        }
    }

    /// Network failures are the only ones worth retrying, and only from a fresh index read.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedbackAuthError::Network(_))
    }
}

impl From<RejectionReason> for FeedbackAuthError {
    fn from(reason: RejectionReason) -> Self {
        FeedbackAuthError::Rejected(reason)
    }
}

pub type Result<T> = std::result::Result<T, FeedbackAuthError>;

//! ERC-8004 Type definitions

use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::abi::common::{content_hash, encode_tag};
use crate::auth::{AuthorizationEnvelope, AuthorizationRecord};
use crate::error::{FeedbackAuthError, Result};

/// Highest score the reputation registry accepts
pub const MAX_SCORE: i64 = 100;

/// Full agent identifier (agentRegistry + agentId)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AgentIdentifier {
    pub agent_id: U256,
    pub agent_registry: String, // "eip155:8453:0x..."
}

impl AgentIdentifier {
    pub fn new(agent_id: U256, chain_id: u64, registry_address: &str) -> Self {
        let addr = registry_address.to_lowercase();
        Self {
            agent_id,
            agent_registry: format!("eip155:{}:{}", chain_id, addr),
        }
    }

    /// Parse the registry string to extract chain_id and address
    pub fn parse_registry(&self) -> Option<(u64, String)> {
        let parts: Vec<&str> = self.agent_registry.split(':').collect();
        if parts.len() == 3 && parts[0] == "eip155" {
            let chain_id = parts[1].parse().ok()?;
            let address = parts[2].to_string();
            Some((chain_id, address))
        } else {
            None
        }
    }

    /// Get the chain ID
    pub fn chain_id(&self) -> Option<u64> {
        self.parse_registry().map(|(chain_id, _)| chain_id)
    }
}

impl std::fmt::Display for AgentIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.agent_registry, self.agent_id)
    }
}

/// Feedback body as the caller describes it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feedback {
    /// 0-100 inclusive; wider type so out-of-range input can be reported, not truncated
    pub score: i64,
    pub tag1: Option<String>,
    pub tag2: Option<String>,
    pub content_uri: Option<String>,
    pub content_hash: Option<[u8; 32]>,
}

impl Feedback {
    pub fn new(score: i64) -> Self {
        Self {
            score,
            ..Default::default()
        }
    }

    pub fn with_tags(mut self, tag1: &str, tag2: Option<&str>) -> Self {
        self.tag1 = Some(tag1.to_string());
        self.tag2 = tag2.map(str::to_string);
        self
    }

    pub fn with_content(mut self, uri: &str, hash: [u8; 32]) -> Self {
        self.content_uri = Some(uri.to_string());
        self.content_hash = Some(hash);
        self
    }

    /// Score as the uint8 the registry takes
    pub fn validated_score(&self) -> Result<u8> {
        if !(0..=MAX_SCORE).contains(&self.score) {
            return Err(FeedbackAuthError::validation(format!(
                "Score must be between 0 and {}, got {}",
                MAX_SCORE, self.score
            )));
        }
        Ok(self.score as u8)
    }

    /// Check everything that can be checked without the network.
    pub fn validate(&self) -> Result<()> {
        self.validated_score()?;
        for tag in [&self.tag1, &self.tag2].into_iter().flatten() {
            encode_tag(tag)?;
        }
        Ok(())
    }
}

/// Everything `giveFeedback` takes, already in on-chain shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackSubmission {
    pub agent_id: U256,
    /// Submitting account; becomes `msg.sender`
    pub client_address: Address,
    pub score: u8,
    pub tag1: [u8; 32],
    pub tag2: [u8; 32],
    /// Empty when no content is referenced
    pub content_uri: String,
    /// Zero when no content is referenced
    pub content_hash: [u8; 32],
    pub envelope: AuthorizationEnvelope,
}

impl FeedbackSubmission {
    pub fn new(
        agent_id: U256,
        client_address: Address,
        feedback: &Feedback,
        envelope: AuthorizationEnvelope,
    ) -> Result<Self> {
        let score = feedback.validated_score()?;
        let tag1 = match &feedback.tag1 {
            Some(tag) => encode_tag(tag)?,
            None => [0u8; 32],
        };
        let tag2 = match &feedback.tag2 {
            Some(tag) => encode_tag(tag)?,
            None => [0u8; 32],
        };

        Ok(Self {
            agent_id,
            client_address,
            score,
            tag1,
            tag2,
            content_uri: feedback.content_uri.clone().unwrap_or_default(),
            content_hash: feedback.content_hash.unwrap_or([0u8; 32]),
            envelope,
        })
    }
}

/// Registry acknowledgment of an accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackReceipt {
    pub tx_hash: H256,
    /// Index the feedback was stored under for its (agent, client) pair
    pub feedback_index: u64,
    pub block_number: Option<u64>,
}

/// A signed authorization ready to hand to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackAuthorization {
    pub record: AuthorizationRecord,
    pub envelope: AuthorizationEnvelope,
}

/// Stored feedback row as the registry reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub agent_id: U256,
    pub client_address: Address,
    pub feedback_index: u64,
    pub score: u8,
    pub tag1: Option<String>,
    pub tag2: Option<String>,
    pub is_revoked: bool,
}

/// Reputation summary from registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationSummary {
    pub agent_id: U256,
    pub count: u64,
    pub average_score: u8,
}

/// Feedback file (JSON hosted off-chain, referenced by `content_uri`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackFile {
    #[serde(rename = "agentRegistry")]
    pub agent_registry: String,

    #[serde(rename = "agentId")]
    pub agent_id: String,

    #[serde(rename = "clientAddress")]
    pub client_address: String,

    #[serde(rename = "createdAt")]
    pub created_at: String,

    pub score: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag1: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag2: Option<String>,

    /// 0x-hex envelope this feedback was submitted with
    #[serde(rename = "feedbackAuth")]
    pub feedback_auth: String,
}

impl FeedbackFile {
    pub fn new(
        agent: &AgentIdentifier,
        client_address: Address,
        feedback: &Feedback,
        envelope: &AuthorizationEnvelope,
    ) -> Result<Self> {
        Ok(Self {
            agent_registry: agent.agent_registry.clone(),
            agent_id: agent.agent_id.to_string(),
            client_address: format!("{:?}", client_address),
            created_at: chrono::Utc::now().to_rfc3339(),
            score: feedback.validated_score()?,
            tag1: feedback.tag1.clone(),
            tag2: feedback.tag2.clone(),
            feedback_auth: envelope.to_hex(),
        })
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| FeedbackAuthError::validation(format!("Failed to serialize feedback file: {}", e)))
    }

    /// keccak256 of the JSON bytes, submitted as `feedbackHash`
    pub fn content_hash(&self) -> Result<[u8; 32]> {
        Ok(content_hash(&self.to_json_bytes()?))
    }
}

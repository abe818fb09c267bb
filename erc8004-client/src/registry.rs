//! Registry boundary
//!
//! The submission client only needs two operations from the reputation
//! registry and one from the identity registry. Both are traits so the
//! on-chain clients here and [`crate::memory::InMemoryRegistry`] are
//! interchangeable.

use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, JsonRpcClient, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockId, BlockNumber, Bytes, TransactionRequest, H256, U256, U64};

use crate::abi::common::encode_tag;
use crate::abi::{identity, reputation};
use crate::config::Eip8004Config;
use crate::error::{FeedbackAuthError, RejectionReason, Result};
use crate::types::{FeedbackEntry, FeedbackReceipt, FeedbackSubmission, ReputationSummary};

/// Reputation registry operations used by the submission pipeline
#[async_trait]
pub trait ReputationRegistry: Send + Sync {
    /// Last consumed feedback index for the pair; 0 when none
    async fn last_index(&self, agent_id: U256, client_address: Address) -> Result<u64>;

    /// Submit feedback and wait for the registry's verdict
    async fn submit_feedback(&self, submission: &FeedbackSubmission) -> Result<FeedbackReceipt>;
}

/// Identity registry view: may `signer` act for `agent_id`?
#[async_trait]
pub trait AgentAuthority: Send + Sync {
    async fn is_authorized_signer(&self, agent_id: U256, signer: Address) -> Result<bool>;
}

/// Map a node error into a rejection (revert) or a transport failure
fn classify_rpc_error(message: String) -> FeedbackAuthError {
    if message.to_lowercase().contains("revert") {
        FeedbackAuthError::Rejected(RejectionReason::from_revert(&message))
    } else {
        FeedbackAuthError::Network(message)
    }
}

fn connect(rpc_endpoint: &str) -> Result<Provider<Http>> {
    Provider::<Http>::try_from(rpc_endpoint).map_err(|e| {
        FeedbackAuthError::validation(format!("Invalid RPC endpoint {}: {}", rpc_endpoint, e))
    })
}

async fn eth_call<P: JsonRpcClient>(provider: &Provider<P>, to: Address, data: Vec<u8>) -> Result<Bytes> {
    eth_call_at(provider, to, data, None).await
}

async fn eth_call_at<P: JsonRpcClient>(
    provider: &Provider<P>,
    to: Address,
    data: Vec<u8>,
    block: Option<u64>,
) -> Result<Bytes> {
    let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
    let block = block.map(|n| BlockId::Number(BlockNumber::Number(U64::from(n))));
    provider
        .call(&tx, block)
        .await
        .map_err(|e| FeedbackAuthError::Network(format!("eth_call to {:?} failed: {}", to, e)))
}

/// `getLastIndex` as of `block` (latest when `None`). Read right after the
/// feedback transaction is mined, this is the index the registry stored it under.
async fn last_index_at<P: JsonRpcClient>(
    provider: &Provider<P>,
    registry: Address,
    agent_id: U256,
    client_address: Address,
    block: Option<u64>,
) -> Result<u64> {
    let data = eth_call_at(
        provider,
        registry,
        reputation::encode_get_last_index(agent_id, client_address),
        block,
    )
    .await?;
    reputation::decode_last_index_result(&data)
}

/// Mined transaction outcome
struct Mined {
    tx_hash: H256,
    block_number: Option<u64>,
}

/// On-chain reputation registry over JSON-RPC
pub struct RpcReputationRegistry {
    provider: Provider<Http>,
    address: Address,
    chain_id: u64,
    /// Client wallet that sends `giveFeedback`; reads work without one
    wallet: Option<LocalWallet>,
}

impl RpcReputationRegistry {
    pub fn new(config: &Eip8004Config, wallet: Option<LocalWallet>) -> Result<Self> {
        Ok(Self {
            provider: connect(&config.rpc_endpoint)?,
            address: config.reputation_registry_address()?,
            chain_id: config.chain_id,
            wallet,
        })
    }

    pub fn read_only(config: &Eip8004Config) -> Result<Self> {
        Self::new(config, None)
    }

    async fn send(&self, data: Vec<u8>) -> Result<Mined> {
        let wallet = self
            .wallet
            .clone()
            .ok_or_else(|| FeedbackAuthError::Signing("No client wallet configured".to_string()))?
            .with_chain_id(self.chain_id);

        let client = SignerMiddleware::new(self.provider.clone(), wallet);
        let tx = TransactionRequest::new().to(self.address).data(data);

        let pending = client
            .send_transaction(tx, None)
            .await
            .map_err(|e| classify_rpc_error(e.to_string()))?;
        let tx_hash = pending.tx_hash();
        log::debug!("[ERC8004] Sent tx {:?}, waiting for receipt", tx_hash);

        let receipt = pending
            .await
            .map_err(|e| FeedbackAuthError::Network(format!("Waiting for {:?} failed: {}", tx_hash, e)))?
            .ok_or_else(|| FeedbackAuthError::Network(format!("Transaction {:?} dropped", tx_hash)))?;

        if receipt.status == Some(U64::zero()) {
            return Err(FeedbackAuthError::Rejected(RejectionReason::Reverted(format!(
                "transaction {:?} reverted",
                tx_hash
            ))));
        }

        Ok(Mined {
            tx_hash,
            block_number: receipt.block_number.map(|b| b.as_u64()),
        })
    }

    pub async fn read_feedback(
        &self,
        agent_id: U256,
        client_address: Address,
        index: u64,
    ) -> Result<FeedbackEntry> {
        let data = eth_call(
            &self.provider,
            self.address,
            reputation::encode_read_feedback(agent_id, client_address, index),
        )
        .await?;
        let row = reputation::decode_feedback_result(&data)?;

        Ok(FeedbackEntry {
            agent_id,
            client_address,
            feedback_index: index,
            score: row.score,
            tag1: row.tag1,
            tag2: row.tag2,
            is_revoked: row.is_revoked,
        })
    }

    pub async fn get_summary(
        &self,
        agent_id: U256,
        client_addresses: &[Address],
        tag1: Option<&str>,
        tag2: Option<&str>,
    ) -> Result<ReputationSummary> {
        let tag1 = tag1.map(encode_tag).transpose()?.unwrap_or([0u8; 32]);
        let tag2 = tag2.map(encode_tag).transpose()?.unwrap_or([0u8; 32]);
        let data = eth_call(
            &self.provider,
            self.address,
            reputation::encode_get_summary(agent_id, client_addresses, tag1, tag2),
        )
        .await?;
        let (count, average_score) = reputation::decode_summary_result(&data)?;

        Ok(ReputationSummary {
            agent_id,
            count,
            average_score,
        })
    }

    /// Revoke feedback previously given by this wallet
    pub async fn revoke_feedback(&self, agent_id: U256, feedback_index: u64) -> Result<H256> {
        let mined = self
            .send(reputation::encode_revoke_feedback(agent_id, feedback_index))
            .await?;
        log::info!(
            "[ERC8004] Revoked feedback {} for agent {} in {:?}",
            feedback_index,
            agent_id,
            mined.tx_hash
        );
        Ok(mined.tx_hash)
    }
}

#[async_trait]
impl ReputationRegistry for RpcReputationRegistry {
    async fn last_index(&self, agent_id: U256, client_address: Address) -> Result<u64> {
        last_index_at(&self.provider, self.address, agent_id, client_address, None).await
    }

    async fn submit_feedback(&self, submission: &FeedbackSubmission) -> Result<FeedbackReceipt> {
        let sender = self.wallet.as_ref().map(|w| w.address());
        if sender != Some(submission.client_address) {
            return Err(FeedbackAuthError::validation(format!(
                "Submission is for client {:?} but the registry wallet is {:?}",
                submission.client_address, sender
            )));
        }

        let calldata = reputation::encode_give_feedback(
            submission.agent_id,
            submission.score,
            submission.tag1,
            submission.tag2,
            &submission.content_uri,
            submission.content_hash,
            submission.envelope.as_bytes(),
        );
        let mined = self.send(calldata).await?;

        // indexLimit may only bound the slot, so ask the registry where it landed
        let feedback_index = last_index_at(
            &self.provider,
            self.address,
            submission.agent_id,
            submission.client_address,
            mined.block_number,
        )
        .await
        .map_err(|e| {
            FeedbackAuthError::Network(format!(
                "Feedback mined in {:?} but reading its index failed: {}",
                mined.tx_hash, e
            ))
        })?;

        Ok(FeedbackReceipt {
            tx_hash: mined.tx_hash,
            feedback_index,
            block_number: mined.block_number,
        })
    }
}

/// On-chain identity registry (ERC-721) over JSON-RPC
pub struct RpcIdentityRegistry {
    provider: Provider<Http>,
    address: Address,
}

impl RpcIdentityRegistry {
    pub fn new(config: &Eip8004Config) -> Result<Self> {
        Ok(Self {
            provider: connect(&config.rpc_endpoint)?,
            address: config.identity_registry_address()?,
        })
    }

    pub async fn owner_of(&self, agent_id: U256) -> Result<Address> {
        let data = eth_call(&self.provider, self.address, identity::encode_owner_of(agent_id)).await?;
        identity::decode_address_result(&data)
    }

    pub async fn token_uri(&self, agent_id: U256) -> Result<String> {
        let data = eth_call(&self.provider, self.address, identity::encode_token_uri(agent_id)).await?;
        identity::decode_token_uri_result(&data)
    }
}

#[async_trait]
impl AgentAuthority for RpcIdentityRegistry {
    async fn is_authorized_signer(&self, agent_id: U256, signer: Address) -> Result<bool> {
        let owner = self.owner_of(agent_id).await?;
        if owner == signer {
            return Ok(true);
        }

        let data = eth_call(&self.provider, self.address, identity::encode_get_approved(agent_id)).await?;
        if identity::decode_address_result(&data)? == signer {
            return Ok(true);
        }

        let data = eth_call(
            &self.provider,
            self.address,
            identity::encode_is_approved_for_all(owner, signer),
        )
        .await?;
        identity::decode_bool_result(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::{self, Token};
    use ethers::providers::MockProvider;

    #[test]
    fn test_classify_rpc_error() {
        let err = classify_rpc_error("(code: 3, message: execution reverted: Auth expired)".to_string());
        assert!(matches!(
            err,
            FeedbackAuthError::Rejected(RejectionReason::Expired { .. })
        ));

        let err = classify_rpc_error("error sending request: connection refused".to_string());
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_stored_index_read_at_mined_block() {
        let (provider, mock) = Provider::<MockProvider>::mocked();
        // contract answered getLastIndex with 2 although the envelope allowed up to 5
        let answer = Bytes::from(abi::encode(&[Token::Uint(U256::from(2))]));
        mock.push::<Bytes, _>(answer).unwrap();

        let index = last_index_at(
            &provider,
            Address::repeat_byte(0x80),
            U256::from(1),
            Address::repeat_byte(0xaa),
            Some(1234),
        )
        .await
        .unwrap();
        assert_eq!(index, 2);
    }

    #[test]
    fn test_invalid_endpoint() {
        let mut config = Eip8004Config::base_mainnet();
        config.rpc_endpoint = "not a url".to_string();
        assert!(matches!(
            RpcIdentityRegistry::new(&config),
            Err(FeedbackAuthError::LocalValidation(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_requires_matching_wallet() {
        let mut config = Eip8004Config::base_mainnet();
        config.reputation_registry = "0x8004b663056a597dffe9eccc1965a193b7388713".to_string();
        config.rpc_endpoint = "http://127.0.0.1:1".to_string();
        let registry = RpcReputationRegistry::read_only(&config).unwrap();

        let submission = FeedbackSubmission::new(
            U256::from(1),
            Address::repeat_byte(0xaa),
            &crate::types::Feedback::new(50),
            crate::auth::AuthorizationEnvelope::from_bytes(vec![]),
        )
        .unwrap();

        // Rejected locally, before any RPC traffic
        assert!(matches!(
            registry.submit_feedback(&submission).await,
            Err(FeedbackAuthError::LocalValidation(_))
        ));
    }
}

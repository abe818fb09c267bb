//! Reputation Registry ABI encoding

use ethers::abi::{ParamType, Token};
use ethers::types::{Address, U256};
use once_cell::sync::Lazy;

use super::common::*;
use crate::error::{FeedbackAuthError, Result};

pub const GIVE_FEEDBACK_SIGNATURE: &str =
    "giveFeedback(uint256,uint8,bytes32,bytes32,string,bytes32,bytes)";
pub const GET_LAST_INDEX_SIGNATURE: &str = "getLastIndex(uint256,address)";
pub const READ_FEEDBACK_SIGNATURE: &str = "readFeedback(uint256,address,uint64)";
pub const REVOKE_FEEDBACK_SIGNATURE: &str = "revokeFeedback(uint256,uint64)";
pub const GET_SUMMARY_SIGNATURE: &str = "getSummary(uint256,address[],bytes32,bytes32)";

pub static GIVE_FEEDBACK_SELECTOR: Lazy<[u8; 4]> =
    Lazy::new(|| function_selector(GIVE_FEEDBACK_SIGNATURE));
pub static GET_LAST_INDEX_SELECTOR: Lazy<[u8; 4]> =
    Lazy::new(|| function_selector(GET_LAST_INDEX_SIGNATURE));
pub static READ_FEEDBACK_SELECTOR: Lazy<[u8; 4]> =
    Lazy::new(|| function_selector(READ_FEEDBACK_SIGNATURE));
pub static REVOKE_FEEDBACK_SELECTOR: Lazy<[u8; 4]> =
    Lazy::new(|| function_selector(REVOKE_FEEDBACK_SIGNATURE));
pub static GET_SUMMARY_SELECTOR: Lazy<[u8; 4]> =
    Lazy::new(|| function_selector(GET_SUMMARY_SIGNATURE));

/// Encode giveFeedback call
/// giveFeedback(uint256 agentId, uint8 score, bytes32 tag1, bytes32 tag2,
///              string feedbackUri, bytes32 feedbackHash, bytes feedbackAuth)
pub fn encode_give_feedback(
    agent_id: U256,
    score: u8,
    tag1: [u8; 32],
    tag2: [u8; 32],
    feedback_uri: &str,
    feedback_hash: [u8; 32],
    feedback_auth: &[u8],
) -> Vec<u8> {
    encode_call(
        *GIVE_FEEDBACK_SELECTOR,
        &[
            Token::Uint(agent_id),
            Token::Uint(U256::from(score)),
            Token::FixedBytes(tag1.to_vec()),
            Token::FixedBytes(tag2.to_vec()),
            Token::String(feedback_uri.to_string()),
            Token::FixedBytes(feedback_hash.to_vec()),
            Token::Bytes(feedback_auth.to_vec()),
        ],
    )
}

/// Encode getLastIndex call
/// getLastIndex(uint256 agentId, address clientAddress)
pub fn encode_get_last_index(agent_id: U256, client_address: Address) -> Vec<u8> {
    encode_call(
        *GET_LAST_INDEX_SELECTOR,
        &[Token::Uint(agent_id), Token::Address(client_address)],
    )
}

/// Encode readFeedback call
/// readFeedback(uint256 agentId, address clientAddress, uint64 index)
pub fn encode_read_feedback(agent_id: U256, client_address: Address, index: u64) -> Vec<u8> {
    encode_call(
        *READ_FEEDBACK_SELECTOR,
        &[
            Token::Uint(agent_id),
            Token::Address(client_address),
            Token::Uint(U256::from(index)),
        ],
    )
}

/// Encode revokeFeedback call
/// revokeFeedback(uint256 agentId, uint64 feedbackIndex)
pub fn encode_revoke_feedback(agent_id: U256, feedback_index: u64) -> Vec<u8> {
    encode_call(
        *REVOKE_FEEDBACK_SELECTOR,
        &[Token::Uint(agent_id), Token::Uint(U256::from(feedback_index))],
    )
}

/// Encode getSummary call
/// getSummary(uint256 agentId, address[] clientAddresses, bytes32 tag1, bytes32 tag2)
pub fn encode_get_summary(
    agent_id: U256,
    client_addresses: &[Address],
    tag1: [u8; 32],
    tag2: [u8; 32],
) -> Vec<u8> {
    encode_call(
        *GET_SUMMARY_SELECTOR,
        &[
            Token::Uint(agent_id),
            Token::Array(client_addresses.iter().copied().map(Token::Address).collect()),
            Token::FixedBytes(tag1.to_vec()),
            Token::FixedBytes(tag2.to_vec()),
        ],
    )
}

/// Decode getLastIndex result (uint64)
pub fn decode_last_index_result(data: &[u8]) -> Result<u64> {
    let mut tokens = decode_result(&[ParamType::Uint(64)], data)?;
    token_to_u64(tokens.remove(0), "lastIndex")
}

/// Decoded readFeedback row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackRow {
    pub score: u8,
    pub tag1: Option<String>,
    pub tag2: Option<String>,
    pub is_revoked: bool,
}

/// Decode readFeedback result
/// Returns (score, tag1, tag2, isRevoked)
pub fn decode_feedback_result(data: &[u8]) -> Result<FeedbackRow> {
    let tokens = decode_result(
        &[
            ParamType::Uint(8),
            ParamType::FixedBytes(32),
            ParamType::FixedBytes(32),
            ParamType::Bool,
        ],
        data,
    )?;

    match tokens.as_slice() {
        [Token::Uint(score), Token::FixedBytes(tag1), Token::FixedBytes(tag2), Token::Bool(revoked)] => {
            Ok(FeedbackRow {
                score: score.low_u32() as u8,
                tag1: decode_tag(tag1),
                tag2: decode_tag(tag2),
                is_revoked: *revoked,
            })
        }
        _ => Err(FeedbackAuthError::Network(
            "Unexpected readFeedback result shape".to_string(),
        )),
    }
}

/// Decode getSummary result
/// Returns (count, averageScore)
pub fn decode_summary_result(data: &[u8]) -> Result<(u64, u8)> {
    let mut tokens = decode_result(&[ParamType::Uint(64), ParamType::Uint(8)], data)?;
    let average = token_to_u64(tokens.remove(1), "averageScore")?;
    let count = token_to_u64(tokens.remove(0), "count")?;
    Ok((count, average.min(u8::MAX as u64) as u8))
}

//! Identity Registry ABI encoding
//!
//! ERC-721 based agent identity registry. Only the ownership and approval
//! reads needed to decide whether an address may sign for an agent.

use ethers::abi::{ParamType, Token};
use ethers::types::{Address, U256};

use super::common::*;
use crate::error::{FeedbackAuthError, Result};

// Function selectors
pub const OWNER_OF_SELECTOR: [u8; 4] = [0x63, 0x52, 0x21, 0x1e]; // ownerOf(uint256)
pub const GET_APPROVED_SELECTOR: [u8; 4] = [0x08, 0x18, 0x12, 0xfc]; // getApproved(uint256)
pub const IS_APPROVED_FOR_ALL_SELECTOR: [u8; 4] = [0xe9, 0x85, 0xe9, 0xc5]; // isApprovedForAll(address,address)
pub const TOKEN_URI_SELECTOR: [u8; 4] = [0xc8, 0x7b, 0x56, 0xdd]; // tokenURI(uint256)

/// Encode ownerOf(uint256 tokenId) call
pub fn encode_owner_of(agent_id: U256) -> Vec<u8> {
    encode_call(OWNER_OF_SELECTOR, &[Token::Uint(agent_id)])
}

/// Encode getApproved(uint256 tokenId) call
pub fn encode_get_approved(agent_id: U256) -> Vec<u8> {
    encode_call(GET_APPROVED_SELECTOR, &[Token::Uint(agent_id)])
}

/// Encode isApprovedForAll(address owner, address operator) call
pub fn encode_is_approved_for_all(owner: Address, operator: Address) -> Vec<u8> {
    encode_call(
        IS_APPROVED_FOR_ALL_SELECTOR,
        &[Token::Address(owner), Token::Address(operator)],
    )
}

/// Encode tokenURI(uint256 tokenId) call
pub fn encode_token_uri(agent_id: U256) -> Vec<u8> {
    encode_call(TOKEN_URI_SELECTOR, &[Token::Uint(agent_id)])
}

/// Decode address result (ownerOf, getApproved)
pub fn decode_address_result(data: &[u8]) -> Result<Address> {
    let mut tokens = decode_result(&[ParamType::Address], data)?;
    token_to_address(tokens.remove(0), "address result")
}

/// Decode bool result (isApprovedForAll)
pub fn decode_bool_result(data: &[u8]) -> Result<bool> {
    let mut tokens = decode_result(&[ParamType::Bool], data)?;
    tokens
        .remove(0)
        .into_bool()
        .ok_or_else(|| FeedbackAuthError::Network("Expected bool result".to_string()))
}

/// Decode tokenURI result
pub fn decode_token_uri_result(data: &[u8]) -> Result<String> {
    let mut tokens = decode_result(&[ParamType::String], data)?;
    tokens
        .remove(0)
        .into_string()
        .ok_or_else(|| FeedbackAuthError::Network("Expected string result".to_string()))
}

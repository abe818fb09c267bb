//! Common ABI encoding utilities

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, U256};
use ethers::utils::keccak256 as ethers_keccak256;

use crate::error::{FeedbackAuthError, Result};

/// Compute function selector (first 4 bytes of keccak256 hash)
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = ethers_keccak256(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}

/// Selector followed by the ABI-encoded arguments
pub fn encode_call(selector: [u8; 4], args: &[Token]) -> Vec<u8> {
    let mut calldata = selector.to_vec();
    calldata.extend(abi::encode(args));
    calldata
}

/// Decode a call result against the expected return types
pub fn decode_result(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>> {
    abi::decode(types, data)
        .map_err(|e| FeedbackAuthError::Network(format!("Failed to decode call result: {}", e)))
}

/// Parse a 0x-prefixed (or bare) 20-byte hex address
pub fn parse_address(address: &str) -> Result<Address> {
    let trimmed = address.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex_part.len() != 40 {
        return Err(FeedbackAuthError::validation(format!(
            "Address must be 20 bytes, got {} hex chars: {}",
            hex_part.len(),
            address
        )));
    }

    let bytes = hex::decode(hex_part)
        .map_err(|e| FeedbackAuthError::validation(format!("Invalid address hex {}: {}", address, e)))?;
    Ok(Address::from_slice(&bytes))
}

/// Parse an unsigned integer given in decimal or 0x-hex
pub fn parse_uint256(value: &str) -> Result<U256> {
    let trimmed = value.trim();
    let parsed = match trimmed.strip_prefix("0x") {
        Some(hex_part) => U256::from_str_radix(hex_part, 16).map_err(|e| e.to_string()),
        None => U256::from_dec_str(trimmed).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| FeedbackAuthError::validation(format!("Invalid uint256 {}: {}", value, e)))
}

/// Encode a short UTF-8 tag as a right-padded bytes32
pub fn encode_tag(tag: &str) -> Result<[u8; 32]> {
    let bytes = tag.as_bytes();
    if bytes.len() > 32 {
        return Err(FeedbackAuthError::validation(format!(
            "Tag '{}' is {} bytes, max 32",
            tag,
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}

/// Decode a bytes32 tag, trimming the zero padding. Empty tags become `None`.
pub fn decode_tag(word: &[u8]) -> Option<String> {
    let end = word.iter().rposition(|b| *b != 0).map(|i| i + 1).unwrap_or(0);
    if end == 0 {
        return None;
    }
    String::from_utf8(word[..end].to_vec()).ok()
}

/// Hash of off-chain feedback content, submitted as `feedbackHash`
pub fn content_hash(content: &[u8]) -> [u8; 32] {
    ethers_keccak256(content)
}

/// Compute keccak256 hash
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    ethers_keccak256(data)
}

pub(crate) fn token_to_u64(token: Token, what: &str) -> Result<u64> {
    match token {
        Token::Uint(value) if value <= U256::from(u64::MAX) => Ok(value.as_u64()),
        Token::Uint(value) => Err(FeedbackAuthError::Network(format!(
            "{} out of u64 range: {}",
            what, value
        ))),
        other => Err(FeedbackAuthError::Network(format!(
            "Expected uint for {}, got {:?}",
            what, other
        ))),
    }
}

pub(crate) fn token_to_address(token: Token, what: &str) -> Result<Address> {
    token.into_address().ok_or_else(|| {
        FeedbackAuthError::Network(format!("Expected address for {}", what))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_selector() {
        // Well-known ERC-721 selector
        assert_eq!(function_selector("ownerOf(uint256)"), [0x63, 0x52, 0x21, 0x1e]);
    }

    #[test]
    fn test_parse_address() {
        let addr = parse_address("0x1234567890AbCdEf1234567890aBcDeF12345678").unwrap();
        assert_eq!(
            format!("{:?}", addr),
            "0x1234567890abcdef1234567890abcdef12345678"
        );
        assert!(parse_address("1234567890abcdef1234567890abcdef12345678").is_ok());
    }

    #[test]
    fn test_parse_address_rejects_overlong() {
        let err = parse_address("0x1234567890abcdef1234567890abcdef1234567899").unwrap_err();
        assert!(matches!(err, FeedbackAuthError::LocalValidation(_)));
        assert!(parse_address("0xzz34567890abcdef1234567890abcdef12345678").is_err());
        assert!(parse_address("0x1234").is_err());
    }

    #[test]
    fn test_parse_uint256() {
        assert_eq!(parse_uint256("42").unwrap(), U256::from(42));
        assert_eq!(parse_uint256("0x2a").unwrap(), U256::from(42));
        assert!(parse_uint256("-1").is_err());
    }

    #[test]
    fn test_tags() {
        let word = encode_tag("quality").unwrap();
        assert_eq!(&word[..7], b"quality");
        assert!(word[7..].iter().all(|b| *b == 0));
        assert_eq!(decode_tag(&word), Some("quality".to_string()));
        assert_eq!(decode_tag(&[0u8; 32]), None);
        assert!(encode_tag(&"x".repeat(33)).is_err());
    }

    #[test]
    fn test_content_hash() {
        // keccak256("") is a fixed constant
        assert_eq!(
            hex::encode(content_hash(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}

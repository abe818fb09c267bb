//! ERC-8004 Contract ABI encoders
//!
//! Calldata encoding and result decoding for the identity and reputation
//! registries. Uses function selectors plus `ethers::abi` tokens, without abigen!.

pub mod common;
pub mod identity;
pub mod reputation;

pub use common::*;

//! ERC-8004 Trustless Agents client
//!
//! Read/write access to the identity and reputation registries, built around
//! the feedback authorization protocol: an agent owner signs a record that
//! lets one client submit one feedback entry, and the reputation registry
//! verifies it on-chain with no off-chain coordinator.
//!
//! - [`auth`]: record encoding, envelope, index/expiry policy, verification
//! - [`wallet`]: injected signing capability
//! - [`registry`]: registry traits and their JSON-RPC implementations
//! - [`memory`]: in-memory registry enforcing the on-chain rules
//! - [`client`]: the query -> sign -> submit pipeline

pub mod abi;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod registry;
pub mod types;
pub mod wallet;

pub use auth::{AuthorizationEnvelope, AuthorizationRecord, IssuancePolicy};
pub use client::FeedbackClient;
pub use config::Eip8004Config;
pub use error::{FeedbackAuthError, RejectionReason, Result};
pub use registry::{AgentAuthority, ReputationRegistry, RpcIdentityRegistry, RpcReputationRegistry};
pub use types::*;
pub use wallet::{FeedbackSigner, LocalWalletSigner};

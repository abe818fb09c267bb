//! Feedback authorization protocol
//!
//! An agent owner signs an [`AuthorizationRecord`] naming one client, one
//! feedback index, an expiry, and the deployment (chain + identity registry).
//! The record's canonical encoding plus the signature forms the
//! [`AuthorizationEnvelope`] the client passes to `giveFeedback`.

pub mod envelope;
pub mod policy;
pub mod record;
pub mod verify;

pub use envelope::{AuthorizationEnvelope, ENVELOPE_LEN, SIGNATURE_LEN};
pub use policy::{Deployment, IssuancePolicy};
pub use record::{AuthorizationRecord, RECORD_ENCODED_LEN};
pub use verify::{EnvelopeVerifier, IndexRule, SubmissionContext};

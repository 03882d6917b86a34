//! Verification outcomes and the verifier orchestrator.
//!
//! [`AttestationVerifier::verify`] never returns an error and never panics
//! past its boundary. Every request ends in exactly one [`VerifyOutcome`]:
//! either [`VerifyOutcome::Verified`] or [`VerifyOutcome::Failed`] with the
//! [`FailureCode`] of the first gate that rejected it.

mod verifier;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use verifier::AttestationVerifier;

/// Stable machine-readable reason for a rejected attestation.
///
/// The string form is part of the wire contract and equals the variant's
/// `SCREAMING_SNAKE_CASE` name prefixed with `ATTESTATION_`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCode {
    /// Headers are missing or malformed, labels disagree, the algorithm is not
    /// allowed, or lookup/replay inputs are blank.
    #[serde(rename = "ATTESTATION_MISSING_OR_INVALID")]
    MissingOrInvalid,
    /// A required covered component is absent.
    #[serde(rename = "ATTESTATION_MISSING_COMPONENT")]
    MissingComponent,
    /// `created`/`expires` violate the window policy.
    #[serde(rename = "ATTESTATION_TIMESTAMP_INVALID")]
    TimestampInvalid,
    /// The key is unknown, revoked, expired, or unusable.
    #[serde(rename = "ATTESTATION_KEY_UNAVAILABLE")]
    KeyUnavailable,
    /// The key id belongs to a different tenant.
    #[serde(rename = "ATTESTATION_TENANT_KEY_MISMATCH")]
    TenantKeyMismatch,
    /// The Ed25519 signature does not match the signature base.
    #[serde(rename = "ATTESTATION_INVALID_SIGNATURE")]
    InvalidSignature,
    /// The nonce was already used.
    #[serde(rename = "ATTESTATION_REPLAY_DETECTED")]
    ReplayDetected,
    /// The nonce store could not answer.
    #[serde(rename = "ATTESTATION_REPLAY_UNAVAILABLE")]
    ReplayUnavailable,
    /// An unexpected internal fault.
    #[serde(rename = "ATTESTATION_INTERNAL_ERROR")]
    InternalError,
}

impl FailureCode {
    /// Stable identifier, identical to the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingOrInvalid => "ATTESTATION_MISSING_OR_INVALID",
            Self::MissingComponent => "ATTESTATION_MISSING_COMPONENT",
            Self::TimestampInvalid => "ATTESTATION_TIMESTAMP_INVALID",
            Self::KeyUnavailable => "ATTESTATION_KEY_UNAVAILABLE",
            Self::TenantKeyMismatch => "ATTESTATION_TENANT_KEY_MISMATCH",
            Self::InvalidSignature => "ATTESTATION_INVALID_SIGNATURE",
            Self::ReplayDetected => "ATTESTATION_REPLAY_DETECTED",
            Self::ReplayUnavailable => "ATTESTATION_REPLAY_UNAVAILABLE",
            Self::InternalError => "ATTESTATION_INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// First failing gate.
    pub code: FailureCode,
    /// Operator-facing detail. Never blank.
    pub message: String,
}

impl Failure {
    /// Creates a failure. A blank message is replaced by `attestation failed`.
    #[must_use]
    pub fn new(code: FailureCode, message: &str) -> Self {
        let message =
            if message.trim().is_empty() { "attestation failed".to_owned() } else { message.to_owned() };
        Self { code, message }
    }
}

/// Identity and parameters of an accepted signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedAttestation {
    /// Tenant the request was verified for.
    pub tenant_id: String,
    /// Key that produced the signature.
    pub key_id: String,
    /// Nonce that is now recorded.
    pub nonce: String,
    /// Algorithm label, trimmed and lower-cased.
    pub alg: String,
    /// `created`, epoch seconds.
    pub created: i64,
    /// `expires`, epoch seconds.
    pub expires: i64,
}

/// Result of one verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Every gate passed.
    Verified(VerifiedAttestation),
    /// A gate rejected the request.
    Failed(Failure),
}

impl VerifyOutcome {
    /// Returns `true` for [`VerifyOutcome::Verified`].
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::Verified(_))
    }

    /// The failure code, if verification failed.
    #[must_use]
    pub const fn failure_code(&self) -> Option<FailureCode> {
        match self {
            Self::Verified(_) => None,
            Self::Failed(failure) => Some(failure.code),
        }
    }
}

/// The request-derived inputs of one verification.
///
/// `authority` is the literal `Host`/`:authority` value and `path` the
/// request-target path. `signature_input` and `signature` are the literal
/// `Signature-Input` and `Signature` header values.
#[derive(Debug, Clone, Copy)]
pub struct VerifyRequest<'a> {
    /// HTTP method. Logged only; not covered by the default profile.
    pub method: &'a str,
    /// Request authority.
    pub authority: &'a str,
    /// Request path.
    pub path: &'a str,
    /// Tenant the gateway resolved for this request.
    pub tenant_id: &'a str,
    /// `Signature-Input` header value.
    pub signature_input: &'a str,
    /// `Signature` header value.
    pub signature: &'a str,
}

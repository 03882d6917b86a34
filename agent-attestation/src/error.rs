//! Error types for attestation verification.
//!
//! Parsers, the signature-base builder, and configuration loading all report
//! failures through [`AttestationError`]. None of these errors cross the
//! verifier boundary: [`crate::verify::AttestationVerifier`] classifies them
//! into a stable [`FailureCode`](crate::verify::FailureCode) instead.
//!
//! # Examples
//!
//! ```
//! use agent_attestation::error::{AttestationError, Result};
//!
//! fn require_label(label: &str) -> Result<&str> {
//!     if label.trim().is_empty() {
//!         return Err(AttestationError::InvalidLabel("Signature label is required".to_owned()));
//!     }
//!     Ok(label)
//! }
//!
//! assert!(require_label(" ").is_err());
//! ```

use thiserror::Error;

/// Result type alias for attestation operations.
pub type Result<T> = std::result::Result<T, AttestationError>;

/// Errors raised while parsing, canonicalizing, or configuring attestation
/// verification.
///
/// Messages are meant for operators diagnosing a misconfigured agent. They
/// never carry signature bytes, key material, or whole header values.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum AttestationError {
    /// The `Signature-Input` header is missing or malformed.
    ///
    /// # Recovery
    ///
    /// The agent must send exactly one label of the form
    /// `sig1=("@authority" "@path" "@signature-params");created=..;expires=..;keyid=".."`
    /// with every required parameter present.
    #[error("invalid Signature-Input: {0}")]
    InvalidSignatureInput(String),

    /// The `Signature` header is missing or malformed.
    #[error("invalid Signature: {0}")]
    InvalidSignatureHeader(String),

    /// The two header labels are blank or do not agree.
    #[error("invalid signature label: {0}")]
    InvalidLabel(String),

    /// The signature base could not be built from the request.
    ///
    /// Raised for blank authority/path values and for covered components that
    /// the active profile has no renderer for.
    #[error("cannot build signature base: {0}")]
    SignatureBase(String),

    /// Configuration failed to load or validate.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration could not be deserialized.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// An invariant inside the verifier was violated.
    ///
    /// This is never caused by agent input and always maps to an internal
    /// error outcome.
    #[error("internal attestation error: {0}")]
    Internal(String),
}

impl AttestationError {
    /// Returns `true` when the error was caused by the request itself rather
    /// than by the verifier or its configuration.
    #[must_use]
    pub const fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSignatureInput(_)
                | Self::InvalidSignatureHeader(_)
                | Self::InvalidLabel(_)
                | Self::SignatureBase(_)
        )
    }
}

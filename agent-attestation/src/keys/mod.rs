//! Tenant-scoped public key resolution.
//!
//! A key id is only usable by the tenant it is registered to. Resolvers
//! report *why* a key is unusable through [`ResolveFailureCode`]; the verifier
//! maps those codes onto attestation failure codes.
//!
//! Failures are detected in a fixed order:
//!
//! 1. [`InvalidInput`](ResolveFailureCode::InvalidInput): blank tenant or key id
//! 2. [`TenantKeyMismatch`](ResolveFailureCode::TenantKeyMismatch): the key id
//!    exists, but only under other tenants
//! 3. [`KeyNotFound`](ResolveFailureCode::KeyNotFound): the key id is unknown
//! 4. [`KeyRevoked`](ResolveFailureCode::KeyRevoked): status is not `ACTIVE`
//! 5. [`KeyExpired`](ResolveFailureCode::KeyExpired): `not_after` has passed
//! 6. [`InvalidKeyMaterial`](ResolveFailureCode::InvalidKeyMaterial): the
//!    configured bytes are not an Ed25519 public key

mod registry;

use std::fmt::{self, Debug};

use chrono::{DateTime, Utc};
use ed25519_dalek::VerifyingKey;

pub use registry::{StaticKeyRegistry, decode_ed25519_public_key};

/// Why a key could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveFailureCode {
    /// Tenant id or key id was blank.
    InvalidInput,
    /// The key id is registered, but not for the requesting tenant.
    TenantKeyMismatch,
    /// The key id is not registered for any tenant.
    KeyNotFound,
    /// The key is registered but not active.
    KeyRevoked,
    /// The key is past its `not_after` instant.
    KeyExpired,
    /// The configured key bytes are not a usable Ed25519 public key.
    InvalidKeyMaterial,
}

impl ResolveFailureCode {
    /// Stable identifier for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::TenantKeyMismatch => "TENANT_KEY_MISMATCH",
            Self::KeyNotFound => "KEY_NOT_FOUND",
            Self::KeyRevoked => "KEY_REVOKED",
            Self::KeyExpired => "KEY_EXPIRED",
            Self::InvalidKeyMaterial => "INVALID_KEY_MATERIAL",
        }
    }
}

impl fmt::Display for ResolveFailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed key lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveFailure {
    /// Failure category.
    pub code: ResolveFailureCode,
    /// Human-readable detail. Never contains key material.
    pub message: String,
}

impl ResolveFailure {
    pub(crate) fn new(code: ResolveFailureCode, message: &str) -> Self {
        Self { code, message: message.to_owned() }
    }
}

/// A successfully resolved verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Tenant the key belongs to.
    pub tenant_id: String,
    /// Key identifier.
    pub key_id: String,
    /// Ed25519 verification key.
    pub public_key: VerifyingKey,
    /// Expiry instant, when one is configured.
    pub not_after: Option<DateTime<Utc>>,
}

/// Resolves the verification key for a `(tenant, keyid)` pair.
///
/// Implementations must be safe to share across concurrent verifications.
pub trait PublicKeyResolver: Send + Sync + Debug {
    /// Looks up the active key `key_id` registered for `tenant_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolveFailure`] describing the first failed check, in
    /// the order documented at module level.
    fn resolve(&self, tenant_id: &str, key_id: &str) -> Result<KeyMaterial, ResolveFailure>;
}

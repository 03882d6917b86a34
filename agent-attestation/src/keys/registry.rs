//! Immutable key registry built from static configuration.

use std::{collections::HashMap, fmt::Write as _, sync::Arc};

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use ed25519_dalek::{PUBLIC_KEY_LENGTH, VerifyingKey};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use super::{KeyMaterial, PublicKeyResolver, ResolveFailure, ResolveFailureCode};
use crate::{
    clock::{Clock, SystemClock},
    config::{KeyEntry, STATUS_ACTIVE},
    error::{AttestationError, Result},
};

/// DER prefix of an Ed25519 `SubjectPublicKeyInfo`:
/// `SEQUENCE { SEQUENCE { OID 1.3.101.112 }, BIT STRING (0 unused bits) }`.
const ED25519_SPKI_PREFIX: [u8; 12] =
    [0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00];

#[derive(Debug, Clone)]
struct RegisteredKey {
    tenant_id: String,
    key_id: String,
    active: bool,
    not_after: Option<DateTime<Utc>>,
    /// `None` when the configured bytes did not decode.
    public_key: Option<VerifyingKey>,
}

/// Tenant-scoped key registry loaded once from [`KeyEntry`] records.
///
/// The registry never changes after construction, so a single instance is
/// shared behind an [`Arc`] by every concurrent verification.
///
/// A secondary index by key id alone lets [`resolve`](PublicKeyResolver::resolve)
/// tell "registered for another tenant" apart from "not registered at all".
#[derive(Debug, Clone)]
pub struct StaticKeyRegistry {
    clock: Arc<dyn Clock>,
    by_tenant_and_key: HashMap<(String, String), RegisteredKey>,
    tenants_by_key: HashMap<String, Vec<String>>,
}

impl StaticKeyRegistry {
    /// Builds a registry that checks expiry against the system clock.
    ///
    /// # Errors
    ///
    /// See [`with_clock`](Self::with_clock).
    pub fn new(entries: &[KeyEntry]) -> Result<Self> {
        Self::with_clock(entries, Arc::new(SystemClock))
    }

    /// Builds a registry that checks expiry against `clock`.
    ///
    /// Key material is decoded here, once. Entries whose material does not
    /// decode are kept so that lookups report
    /// [`ResolveFailureCode::InvalidKeyMaterial`] after the status and expiry
    /// checks.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::Config`] when an entry has a blank tenant or
    /// key id, or when a `(tenant_id, key_id)` pair is registered twice.
    #[instrument(skip_all, fields(entries = entries.len()))]
    pub fn with_clock(entries: &[KeyEntry], clock: Arc<dyn Clock>) -> Result<Self> {
        let mut by_tenant_and_key = HashMap::with_capacity(entries.len());
        let mut tenants_by_key: HashMap<String, Vec<String>> = HashMap::new();

        for entry in entries {
            if entry.tenant_id.trim().is_empty() || entry.key_id.trim().is_empty() {
                return Err(AttestationError::Config(
                    "key entries require tenant_id and key_id".to_owned(),
                ));
            }

            let public_key = decode_ed25519_public_key(&entry.public_key);
            match &public_key {
                Some(key) => debug!(
                    tenant_id = %entry.tenant_id,
                    key_id = %entry.key_id,
                    fingerprint = %fingerprint(key),
                    "Registered agent key"
                ),
                None => debug!(
                    tenant_id = %entry.tenant_id,
                    key_id = %entry.key_id,
                    "Registered agent key with undecodable material"
                ),
            }

            let registered = RegisteredKey {
                tenant_id: entry.tenant_id.clone(),
                key_id: entry.key_id.clone(),
                active: entry.status.trim().eq_ignore_ascii_case(STATUS_ACTIVE),
                not_after: entry.not_after,
                public_key,
            };

            let composite = (entry.tenant_id.clone(), entry.key_id.clone());
            if by_tenant_and_key.insert(composite, registered).is_some() {
                return Err(AttestationError::Config(format!(
                    "duplicate key {} for tenant {}",
                    entry.key_id, entry.tenant_id
                )));
            }
            tenants_by_key.entry(entry.key_id.clone()).or_default().push(entry.tenant_id.clone());
        }

        info!(keys = by_tenant_and_key.len(), "Key registry loaded");
        Ok(Self { clock, by_tenant_and_key, tenants_by_key })
    }

    /// Number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_tenant_and_key.len()
    }

    /// Returns `true` when no keys are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_tenant_and_key.is_empty()
    }
}

impl PublicKeyResolver for StaticKeyRegistry {
    fn resolve(&self, tenant_id: &str, key_id: &str) -> std::result::Result<KeyMaterial, ResolveFailure> {
        if tenant_id.trim().is_empty() || key_id.trim().is_empty() {
            return Err(ResolveFailure::new(
                ResolveFailureCode::InvalidInput,
                "tenantId and keyId are required",
            ));
        }

        let Some(key) = self.by_tenant_and_key.get(&(tenant_id.to_owned(), key_id.to_owned()))
        else {
            if self.tenants_by_key.get(key_id).is_some_and(|tenants| !tenants.is_empty()) {
                return Err(ResolveFailure::new(
                    ResolveFailureCode::TenantKeyMismatch,
                    "keyId is not registered for tenant",
                ));
            }
            return Err(ResolveFailure::new(ResolveFailureCode::KeyNotFound, "keyId not found"));
        };

        if !key.active {
            return Err(ResolveFailure::new(ResolveFailureCode::KeyRevoked, "key is not active"));
        }
        if key.not_after.is_some_and(|not_after| self.clock.now() > not_after) {
            return Err(ResolveFailure::new(ResolveFailureCode::KeyExpired, "key is expired"));
        }

        let public_key = key.public_key.ok_or_else(|| {
            ResolveFailure::new(
                ResolveFailureCode::InvalidKeyMaterial,
                "invalid Ed25519 public key material",
            )
        })?;

        Ok(KeyMaterial {
            tenant_id: key.tenant_id.clone(),
            key_id: key.key_id.clone(),
            public_key,
            not_after: key.not_after,
        })
    }
}

/// Decodes base64 Ed25519 public key material.
///
/// Accepts either the raw 32-byte key or its 44-byte `SubjectPublicKeyInfo`
/// DER encoding. Returns `None` for anything else, including byte strings
/// that are not a point on the curve.
///
/// # Examples
///
/// ```
/// use agent_attestation::keys::decode_ed25519_public_key;
///
/// let raw = "11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo=";
/// let spki = "MCowBQYDK2VwAyEA11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo=";
/// assert_eq!(decode_ed25519_public_key(raw), decode_ed25519_public_key(spki));
/// assert!(decode_ed25519_public_key("not base64").is_none());
/// ```
#[must_use]
pub fn decode_ed25519_public_key(encoded: &str) -> Option<VerifyingKey> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return None;
    }

    let decoded = STANDARD.decode(encoded).ok()?;
    let raw: [u8; PUBLIC_KEY_LENGTH] = match decoded.len() {
        PUBLIC_KEY_LENGTH => decoded.try_into().ok()?,
        len if len == ED25519_SPKI_PREFIX.len() + PUBLIC_KEY_LENGTH => {
            let (prefix, key) = decoded.split_at(ED25519_SPKI_PREFIX.len());
            if prefix != ED25519_SPKI_PREFIX {
                return None;
            }
            key.try_into().ok()?
        }
        _ => return None,
    };

    VerifyingKey::from_bytes(&raw).ok()
}

/// Short SHA-256 fingerprint for logs.
fn fingerprint(key: &VerifyingKey) -> String {
    let digest = Sha256::digest(key.as_bytes());
    digest.iter().take(8).fold(String::with_capacity(16), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

//! Verifier configuration.
//!
//! Configuration is deserialized from TOML and validated once at startup.
//!
//! ```toml
//! [profile]
//! required_covered_components = ["@authority", "@path", "@signature-params"]
//! allowed_algorithms = ["ed25519"]
//! max_window_seconds = 480
//!
//! [replay]
//! enabled = true
//! key_prefix = "replay"
//! default_ttl_seconds = 480
//!
//! [[keys]]
//! tenant_id = "tenant-a"
//! key_id = "agent-key-1"
//! public_key = "11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo="
//! not_after = "2030-01-01T00:00:00Z"
//! ```

use std::{collections::HashSet, path::Path};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{AttestationError, Result};

/// Status value that marks a key as usable. Compared case-insensitively.
pub const STATUS_ACTIVE: &str = "ACTIVE";

/// Top-level verifier configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttestationConfig {
    /// Signature profile requirements.
    #[serde(default)]
    pub profile: ProfileConfig,

    /// Nonce replay defense.
    #[serde(default)]
    pub replay: ReplayConfig,

    /// Static tenant-scoped public key registry.
    #[serde(default)]
    pub keys: Vec<KeyEntry>,
}

impl AttestationConfig {
    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::ConfigParse`] for malformed TOML and
    /// [`AttestationError::Config`] when validation fails.
    pub fn from_toml(toml: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::Io`] when the file cannot be read, plus
    /// every error [`from_toml`](Self::from_toml) can return.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Validates value ranges and the key registry.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::Config`] when:
    /// - `profile.max_window_seconds` or `replay.default_ttl_seconds` is zero
    /// - `replay.capacity` is zero
    /// - a key entry has a blank `tenant_id` or `key_id`
    /// - the same `(tenant_id, key_id)` pair is registered twice
    pub fn validate(&self) -> Result<()> {
        if self.profile.max_window_seconds == 0 {
            return Err(AttestationError::Config(
                "profile.max_window_seconds must be greater than 0".to_owned(),
            ));
        }
        if self.replay.default_ttl_seconds == 0 {
            return Err(AttestationError::Config(
                "replay.default_ttl_seconds must be greater than 0".to_owned(),
            ));
        }
        if self.replay.capacity == 0 {
            return Err(AttestationError::Config("replay.capacity must be greater than 0".to_owned()));
        }

        let mut seen = HashSet::new();
        for (index, entry) in self.keys.iter().enumerate() {
            if entry.tenant_id.trim().is_empty() || entry.key_id.trim().is_empty() {
                return Err(AttestationError::Config(format!(
                    "keys[{index}]: tenant_id and key_id are required"
                )));
            }
            if !seen.insert((entry.tenant_id.as_str(), entry.key_id.as_str())) {
                return Err(AttestationError::Config(format!(
                    "keys[{index}]: duplicate key {} for tenant {}",
                    entry.key_id, entry.tenant_id
                )));
            }
        }
        Ok(())
    }
}

/// Signature profile enforced before any key lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    /// Components every signature must cover. Matched case-insensitively.
    #[serde(default = "default_required_components")]
    pub required_covered_components: Vec<String>,

    /// Accepted `alg` values. Empty means any algorithm label is accepted.
    #[serde(default = "default_allowed_algorithms")]
    pub allowed_algorithms: Vec<String>,

    /// Longest allowed `expires - created` span.
    #[serde(default = "default_window_seconds")]
    pub max_window_seconds: u64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            required_covered_components: default_required_components(),
            allowed_algorithms: default_allowed_algorithms(),
            max_window_seconds: default_window_seconds(),
        }
    }
}

/// Nonce replay defense settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayConfig {
    /// Whether nonces are recorded at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prefix of nonce ledger keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Upper bound on how long a nonce is remembered.
    #[serde(default = "default_window_seconds")]
    pub default_ttl_seconds: u64,

    /// Maximum number of nonces held by the in-memory store.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key_prefix: default_key_prefix(),
            default_ttl_seconds: default_window_seconds(),
            capacity: default_capacity(),
        }
    }
}

/// A registered agent public key.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyEntry {
    /// Tenant the key is registered to.
    pub tenant_id: String,

    /// Key identifier agents put in `keyid`.
    pub key_id: String,

    /// `ACTIVE` or anything else, which is treated as revoked.
    #[serde(default = "default_status")]
    pub status: String,

    /// Base64 of the raw 32-byte Ed25519 key or of its `SubjectPublicKeyInfo`
    /// DER encoding.
    pub public_key: String,

    /// Instant after which the key is no longer accepted.
    #[serde(default)]
    pub not_after: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEntry")
            .field("tenant_id", &self.tenant_id)
            .field("key_id", &self.key_id)
            .field("status", &self.status)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

fn default_required_components() -> Vec<String> {
    vec!["@authority".to_owned(), "@path".to_owned(), "@signature-params".to_owned()]
}

fn default_allowed_algorithms() -> Vec<String> {
    vec!["ed25519".to_owned()]
}

const fn default_window_seconds() -> u64 {
    480
}

const fn default_true() -> bool {
    true
}

fn default_key_prefix() -> String {
    "replay".to_owned()
}

const fn default_capacity() -> usize {
    10_000
}

fn default_status() -> String {
    STATUS_ACTIVE.to_owned()
}

//! Nonce replay protection.
//!
//! Every verified signature carries a nonce. [`ReplayProtection`] records the
//! `(tenant, keyid, nonce)` triple in a [`NonceStore`] with set-if-absent
//! semantics: the first verification wins and every later one within the TTL
//! is a replay.
//!
//! The store is fail-closed. If it cannot answer, the outcome is
//! [`ReplayResult::Unavailable`] and the request must be rejected.

mod memory;

use std::{fmt::Debug, sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{debug, warn};

pub use memory::InMemoryNonceStore;

/// Key prefix used when none (or a blank one) is configured.
pub const DEFAULT_KEY_PREFIX: &str = "replay";

/// TTL used when none (or zero) is configured.
pub const DEFAULT_TTL_SECONDS: u64 = 480;

/// Errors raised by a [`NonceStore`] backend.
#[derive(Debug, Error)]
pub enum NonceStoreError {
    /// The backend could not be reached or is not usable.
    #[error("nonce store unavailable: {0}")]
    Unavailable(String),

    /// The backend answered, but not with a definite set/not-set result.
    #[error("nonce store returned an ambiguous result")]
    Ambiguous,
}

/// Shared nonce ledger with atomic set-if-absent.
///
/// Implementations backed by an external cache (for example a Redis
/// `SET key 1 NX EX ttl`) must be shared by every verifier instance so that
/// a nonce accepted on one node is rejected on all others.
pub trait NonceStore: Send + Sync + Debug {
    /// Atomically stores `key` with `ttl` if it is not already present.
    ///
    /// Returns `Ok(true)` when the key was stored and `Ok(false)` when it was
    /// already present and unexpired.
    ///
    /// # Errors
    ///
    /// Returns [`NonceStoreError`] when the backend cannot give a definite
    /// answer.
    fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, NonceStoreError>;

    /// Checks that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`NonceStoreError::Unavailable`] when it is not.
    fn ping(&self) -> Result<(), NonceStoreError>;
}

/// Outcome of recording a nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplayResult {
    /// The nonce had not been seen and is now recorded.
    FirstSeen,
    /// The nonce was already recorded.
    ReplayDetected,
    /// The store could not answer. Callers must fail closed.
    Unavailable,
    /// Tenant id, key id, or nonce was blank.
    InvalidInput,
}

/// Records nonces scoped to `(tenant, keyid)` in a [`NonceStore`].
#[derive(Debug, Clone)]
pub struct ReplayProtection {
    store: Arc<dyn NonceStore>,
    key_prefix: String,
    default_ttl: Duration,
}

impl ReplayProtection {
    /// Creates replay protection over `store`.
    ///
    /// A blank `key_prefix` falls back to [`DEFAULT_KEY_PREFIX`] and a zero
    /// `default_ttl_seconds` falls back to [`DEFAULT_TTL_SECONDS`].
    #[must_use]
    pub fn new(store: Arc<dyn NonceStore>, key_prefix: &str, default_ttl_seconds: u64) -> Self {
        let key_prefix = if key_prefix.trim().is_empty() { DEFAULT_KEY_PREFIX } else { key_prefix };
        let default_ttl_seconds =
            if default_ttl_seconds == 0 { DEFAULT_TTL_SECONDS } else { default_ttl_seconds };

        Self {
            store,
            key_prefix: key_prefix.to_owned(),
            default_ttl: Duration::from_secs(default_ttl_seconds),
        }
    }

    /// TTL applied when no positive override is given.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// The underlying store, for readiness probes.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn NonceStore> {
        &self.store
    }

    /// Records `nonce` for `(tenant_id, key_id)`.
    ///
    /// `ttl_seconds_override` is used when it is present and positive;
    /// otherwise the default TTL applies. Store errors are logged and
    /// reported as [`ReplayResult::Unavailable`].
    pub fn record_nonce(
        &self,
        tenant_id: &str,
        key_id: &str,
        nonce: &str,
        ttl_seconds_override: Option<i64>,
    ) -> ReplayResult {
        if tenant_id.trim().is_empty() || key_id.trim().is_empty() || nonce.trim().is_empty() {
            return ReplayResult::InvalidInput;
        }

        let ttl = ttl_seconds_override
            .and_then(|secs| u64::try_from(secs).ok())
            .filter(|secs| *secs > 0)
            .map_or(self.default_ttl, Duration::from_secs);
        let key = self.ledger_key(tenant_id, key_id, nonce);

        match self.store.set_if_absent(&key, ttl) {
            Ok(true) => ReplayResult::FirstSeen,
            Ok(false) => {
                debug!(tenant_id, key_id, "Nonce already recorded");
                ReplayResult::ReplayDetected
            }
            Err(e) => {
                warn!(error = %e, "Replay store unavailable, failing closed");
                ReplayResult::Unavailable
            }
        }
    }

    fn ledger_key(&self, tenant_id: &str, key_id: &str, nonce: &str) -> String {
        format!("{}:{tenant_id}:{key_id}:{nonce}", self.key_prefix)
    }
}

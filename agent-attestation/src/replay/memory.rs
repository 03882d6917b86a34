//! Process-local nonce store.

use std::{
    num::NonZeroUsize,
    sync::Mutex,
    time::{Duration, Instant},
};

use lru::LruCache;

use super::{NonceStore, NonceStoreError};

/// In-memory [`NonceStore`] backed by a capacity-bounded LRU cache.
///
/// Each entry stores its absolute expiry instant. Expired entries are treated
/// as absent and overwritten on the next insert of the same key. A full cache
/// only makes room by dropping expired entries; while every entry is still
/// live, new nonces are refused with [`NonceStoreError::Unavailable`] so a
/// remembered nonce is never forgotten inside its TTL. Size the capacity for
/// the expected number of nonces per TTL window.
///
/// The check and the insert happen under one lock, which makes
/// [`set_if_absent`](NonceStore::set_if_absent) atomic across threads.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use agent_attestation::replay::{InMemoryNonceStore, NonceStore};
///
/// let store = InMemoryNonceStore::new(1_000);
/// assert!(store.set_if_absent("replay:t:k:n", Duration::from_secs(60))?);
/// assert!(!store.set_if_absent("replay:t:k:n", Duration::from_secs(60))?);
/// # Ok::<(), agent_attestation::replay::NonceStoreError>(())
/// ```
#[derive(Debug)]
pub struct InMemoryNonceStore {
    entries: Mutex<LruCache<String, Instant>>,
}

impl InMemoryNonceStore {
    /// Creates a store holding at most `capacity` nonces. A capacity of zero
    /// is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)) }
    }

    /// Number of entries currently held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    /// Returns `true` when no entries are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NonceStore for InMemoryNonceStore {
    fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, NonceStoreError> {
        let now = Instant::now();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| NonceStoreError::Unavailable("nonce store lock poisoned".to_owned()))?;

        if entries.peek(key).is_some_and(|expires_at| *expires_at > now) {
            return Ok(false);
        }

        if !entries.contains(key) && entries.len() >= entries.cap().get() {
            make_room(&mut entries, now)?;
        }

        let expires_at = now.checked_add(ttl).unwrap_or(now);
        entries.put(key.to_owned(), expires_at);
        Ok(true)
    }

    fn ping(&self) -> Result<(), NonceStoreError> {
        self.entries
            .lock()
            .map(|_| ())
            .map_err(|_| NonceStoreError::Unavailable("nonce store lock poisoned".to_owned()))
    }
}

/// Frees one slot in a full cache by dropping expired entries.
fn make_room(entries: &mut LruCache<String, Instant>, now: Instant) -> Result<(), NonceStoreError> {
    while entries.peek_lru().is_some_and(|(_, expires_at)| *expires_at <= now) {
        entries.pop_lru();
    }
    if entries.len() < entries.cap().get() {
        return Ok(());
    }

    // TTLs differ, so an expired entry may sit behind a live one
    let expired = entries
        .iter()
        .find(|(_, expires_at)| **expires_at <= now)
        .map(|(key, _)| key.clone());
    match expired {
        Some(key) => {
            entries.pop(&key);
            Ok(())
        }
        None => Err(NonceStoreError::Unavailable("nonce store at capacity".to_owned())),
    }
}

use moka::policy::EvictionPolicy;
use moka::sync::Cache;

use crate::keys::PublicKey;
use crate::session::Session;
use crate::types::SessionInitBlob;

/// Identity of a recovered session: which blob, opened with which key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    blob: [u8; 32],
    recipient: [u8; 32],
}

impl CacheKey {
    pub fn new(blob: &SessionInitBlob, recipient: &PublicKey) -> Self {
        Self {
            blob: blob.fingerprint(),
            recipient: recipient.fingerprint(),
        }
    }
}

/// Memoisation in front of session recovery.
///
/// Implementations must be bounded; recovery is always safe to repeat, so an
/// entry may be dropped at any time.
pub trait SessionKeyCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Session>;

    fn insert(&self, key: CacheKey, session: Session);

    /// Drop one session (Established -> Discarded).
    fn invalidate(&self, key: &CacheKey);

    /// Drop everything, e.g. after the recipient key rotates.
    fn invalidate_all(&self);
}

/// In-memory LRU cache backed by `moka::sync::Cache`.
#[derive(Debug, Clone)]
pub struct MokaSessionCache {
    inner: Cache<CacheKey, Session>,
}

impl MokaSessionCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl SessionKeyCache for MokaSessionCache {
    fn get(&self, key: &CacheKey) -> Option<Session> {
        self.inner.get(key)
    }

    fn insert(&self, key: CacheKey, session: Session) {
        self.inner.insert(key, session);
    }

    fn invalidate(&self, key: &CacheKey) {
        self.inner.invalidate(key);
    }

    fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

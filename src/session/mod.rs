//! Session-key exchange and session lifecycle.
//!
//! - `init`: X25519 + ChaCha20-Poly1305 sealing of a fresh session key into a
//!   156-byte init blob, and the matching recovery.
//! - `cache`: bounded memoisation of recovered sessions.
//! - `policy`: expiry, clock skew and token freshness rules.
//! - `time`: injectable clock.

pub mod cache;
pub mod init;
pub mod policy;
pub mod time;

pub use cache::{CacheKey, MokaSessionCache, SessionKeyCache};
pub use init::{
    context_digest, create_session_init, is_session_init_v2, recover_session_key,
    recover_session_key_hex, InitiatedSession, SessionParams,
};
pub use policy::{FreshnessPolicy, SessionPolicy};
pub use time::{ManualTimeProvider, SystemTimeProvider, TimeProvider};

use crate::types::SessionKey;

/// An established session as seen by either party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub key: SessionKey,
    pub id: [u8; 16],
    pub context_digest: [u8; 32],
    pub issued_at: u64,
    pub expires_at: u64,
}

impl Session {
    /// Session id as hex; safe to log.
    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }
}

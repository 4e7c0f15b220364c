//! X25519 key material for the session-key exchange.
use std::fmt::{Debug, Formatter};

use rand::RngCore;
use x25519_dalek::{PublicKey as DalekPublicKey, StaticSecret};

use crate::error::InputError;
use crate::types::decode_fixed;

pub const KEY_LEN: usize = 32;

/// X25519 public point.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(input: &str) -> Result<Self, InputError> {
        decode_fixed::<KEY_LEN>("public_key", input).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Identity of the key, safe to log and to use as a cache key.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"cllmv:public-key:v1|");
        hasher.update(&self.0);
        hasher.finalize().into()
    }

    pub(crate) fn to_dalek(self) -> DalekPublicKey {
        DalekPublicKey::from(self.0)
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

/// X25519 private scalar. Zeroised on drop; only `to_hex` exports it.
#[derive(Clone)]
pub struct SecretKey(StaticSecret);

impl SecretKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(StaticSecret::from(bytes))
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    pub fn from_hex(input: &str) -> Result<Self, InputError> {
        decode_fixed::<KEY_LEN>("private_key", input).map(Self::from_bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.as_bytes())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(*DalekPublicKey::from(&self.0).as_bytes())
    }

    /// Diffie-Hellman with `peer`. `None` when the result is non-contributory
    /// (peer sent a low-order point).
    pub(crate) fn diffie_hellman(&self, peer: &PublicKey) -> Option<[u8; 32]> {
        let shared = self.0.diffie_hellman(&peer.to_dalek());
        if !shared.was_contributory() {
            return None;
        }
        Some(*shared.as_bytes())
    }
}

impl Debug for SecretKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretKey(public={})", self.public_key().to_hex())
    }
}

/// A party's long-term X25519 keypair.
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::generate())
    }

    pub fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_is_derived_from_secret() {
        let secret = SecretKey::from_bytes([9u8; 32]);
        let restored = SecretKey::from_hex(&secret.to_hex()).unwrap();
        assert_eq!(secret.public_key(), restored.public_key());
    }

    #[test]
    fn rfc7748_alice_public_key() {
        let secret = SecretKey::from_hex(
            "77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a",
        )
        .unwrap();
        assert_eq!(
            secret.public_key().to_hex(),
            "8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a"
        );
    }

    #[test]
    fn diffie_hellman_agrees() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        assert_eq!(
            a.secret.diffie_hellman(&b.public),
            b.secret.diffie_hellman(&a.public)
        );
    }

    #[test]
    fn diffie_hellman_rejects_low_order_point() {
        let a = KeyPair::generate();
        assert!(a
            .secret
            .diffie_hellman(&PublicKey::from_bytes([0u8; 32]))
            .is_none());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let secret = SecretKey::from_bytes([1u8; 32]);
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains(&secret.to_hex()));
    }
}

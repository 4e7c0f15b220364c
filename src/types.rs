use std::fmt::{Debug, Display, Formatter};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::InputError;

pub const SESSION_KEY_LEN: usize = 32;
pub const TOKEN_LEN: usize = 16;
pub const SESSION_INIT_LEN: usize = 156;
/// Hex length of a V2 session-init blob.
pub const SESSION_INIT_HEX_LEN: usize = SESSION_INIT_LEN * 2;

/// Decode exactly `N` bytes of hex. Accepts either case.
pub(crate) fn decode_fixed<const N: usize>(
    field: &'static str,
    input: &str,
) -> Result<[u8; N], InputError> {
    if input.len() != N * 2 {
        return Err(InputError::WrongLength {
            field,
            expected: N * 2,
            actual: input.len(),
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(input, &mut out).map_err(|_| InputError::InvalidHex { field })?;
    Ok(out)
}

/// Token scheme generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemeKind {
    /// Salted MD5 interleave (V1).
    Legacy,
    /// Session-keyed HMAC-SHA256 (V2).
    Session,
}

impl Display for SchemeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemeKind::Legacy => write!(f, "legacy"),
            SchemeKind::Session => write!(f, "session"),
        }
    }
}

/// The unit of work a token attests to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkClaim<'a> {
    pub id: &'a str,
    pub created: u64,
    pub value: &'a str,
}

impl<'a> WorkClaim<'a> {
    pub fn new(id: &'a str, created: u64, value: &'a str) -> Self {
        Self { id, created, value }
    }
}

/// Parse a decimal unix timestamp in seconds.
pub fn parse_timestamp(input: &str) -> Result<u64, InputError> {
    input
        .trim()
        .parse::<u64>()
        .map_err(|_| InputError::InvalidTimestamp(input.to_owned()))
}

/// Symmetric key shared through a session-init blob.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    pub fn from_bytes(bytes: [u8; SESSION_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(input: &str) -> Result<Self, InputError> {
        decode_fixed::<SESSION_KEY_LEN>("session_key", input).map(Self)
    }

    pub(crate) fn random() -> Self {
        let mut bytes = [0u8; SESSION_KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Debug for SessionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SessionKey {}

/// 16-byte work token.
#[derive(Clone, Copy)]
pub struct Token([u8; TOKEN_LEN]);

impl Token {
    pub fn from_bytes(bytes: [u8; TOKEN_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(input: &str) -> Result<Self, InputError> {
        decode_fixed::<TOKEN_LEN>("token", input).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; TOKEN_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token({})", self.to_hex())
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for Token {}

/// Encrypted container carrying a session key from initiator to recipient.
///
/// Layout: ephemeral public key (32) | nonce (12) | ciphertext (96) | tag (16).
#[derive(Clone, PartialEq, Eq)]
pub struct SessionInitBlob([u8; SESSION_INIT_LEN]);

impl SessionInitBlob {
    pub fn from_bytes(bytes: [u8; SESSION_INIT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(input: &str) -> Result<Self, InputError> {
        decode_fixed::<SESSION_INIT_LEN>("session_init", input).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_INIT_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Stable identity of the blob, used as a cache key.
    pub fn fingerprint(&self) -> [u8; 32] {
        blake3::hash(&self.0).into()
    }
}

impl Debug for SessionInitBlob {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SessionInitBlob({})",
            hex::encode(&self.fingerprint()[..8])
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_fixed_accepts_upper_case() {
        let key = SessionKey::from_hex(&"AB".repeat(32)).expect("upper-case hex");
        assert_eq!(key.as_bytes(), &[0xab; 32]);
        assert_eq!(key.to_hex(), "ab".repeat(32));
    }

    #[test]
    fn decode_fixed_reports_wrong_length() {
        let err = Token::from_hex("abcd").expect_err("short token");
        assert_eq!(
            err,
            InputError::WrongLength {
                field: "token",
                expected: 32,
                actual: 4,
            }
        );
    }

    #[test]
    fn decode_fixed_reports_bad_hex() {
        let err = Token::from_hex(&"zz".repeat(16)).expect_err("non-hex token");
        assert_eq!(err, InputError::InvalidHex { field: "token" });
    }

    #[test]
    fn session_key_debug_is_redacted() {
        let key = SessionKey::from_bytes([7u8; 32]);
        assert_eq!(format!("{key:?}"), "SessionKey(..)");
    }

    #[test]
    fn parse_timestamp_rejects_non_numeric() {
        assert_eq!(parse_timestamp("1700000000"), Ok(1_700_000_000));
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(InputError::InvalidTimestamp(_))
        ));
        assert!(parse_timestamp("-5").is_err());
    }
}

//! Token generation for both schemes.
//!
//! The generator and the validators share `legacy_digest` / `session_digest`,
//! so field order and framing cannot drift between the two sides.
use crate::primitives::{hmac_sha256, md5, put_field};
use crate::types::{SchemeKind, SessionKey, Token, WorkClaim, TOKEN_LEN};

const LEGACY_DOMAIN: &[u8] = b"cllmv:token:v1|";
const SESSION_DOMAIN: &[u8] = b"cllmv:token:v2|";

/// Key material and context for one token scheme.
#[derive(Debug, Clone, Copy)]
pub enum Scheme<'a> {
    /// V1: salted MD5 interleave. Kept for older validators only.
    Legacy {
        salt: &'a str,
        model: &'a str,
        revision: &'a str,
    },
    /// V2: HMAC-SHA256 keyed by a session key, bound to a subject.
    Session {
        key: &'a SessionKey,
        sub: &'a str,
        model: &'a str,
        revision: &'a str,
    },
}

impl Scheme<'_> {
    pub fn kind(&self) -> SchemeKind {
        match self {
            Scheme::Legacy { .. } => SchemeKind::Legacy,
            Scheme::Session { .. } => SchemeKind::Session,
        }
    }
}

/// Build the token for `claim` under `scheme`. Deterministic.
pub fn generate(claim: &WorkClaim<'_>, scheme: &Scheme<'_>) -> Token {
    match *scheme {
        Scheme::Legacy {
            salt,
            model,
            revision,
        } => legacy_digest(claim, salt, model, revision),
        Scheme::Session {
            key,
            sub,
            model,
            revision,
        } => session_digest(claim, key, sub, model, revision),
    }
}

/// MD5 over every field with the salt interleaved before, between and after them.
pub(crate) fn legacy_digest(
    claim: &WorkClaim<'_>,
    salt: &str,
    model: &str,
    revision: &str,
) -> Token {
    let created = claim.created.to_le_bytes();
    let fields: [&[u8]; 5] = [
        claim.id.as_bytes(),
        &created,
        claim.value.as_bytes(),
        model.as_bytes(),
        revision.as_bytes(),
    ];
    let mut message = Vec::with_capacity(128 + claim.value.len());
    message.extend_from_slice(LEGACY_DOMAIN);
    put_field(&mut message, salt.as_bytes());
    for field in fields {
        put_field(&mut message, field);
        put_field(&mut message, salt.as_bytes());
    }
    Token::from_bytes(md5(&[&message]))
}

/// HMAC-SHA256 over `(id, created, value, sub, model, revision)`, truncated to 16 bytes.
pub(crate) fn session_digest(
    claim: &WorkClaim<'_>,
    key: &SessionKey,
    sub: &str,
    model: &str,
    revision: &str,
) -> Token {
    let mut message = Vec::with_capacity(128 + claim.value.len());
    message.extend_from_slice(SESSION_DOMAIN);
    put_field(&mut message, claim.id.as_bytes());
    put_field(&mut message, &claim.created.to_le_bytes());
    put_field(&mut message, claim.value.as_bytes());
    put_field(&mut message, sub.as_bytes());
    put_field(&mut message, model.as_bytes());
    put_field(&mut message, revision.as_bytes());

    let mac = hmac_sha256(key.as_bytes(), &[&message]);
    let mut out = [0u8; TOKEN_LEN];
    out.copy_from_slice(&mac[..TOKEN_LEN]);
    Token::from_bytes(out)
}

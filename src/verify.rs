use crate::error::VerifyError;
use crate::primitives::ct_eq;
use crate::token::{legacy_digest, session_digest};
use crate::types::{SessionKey, Token, WorkClaim};

/// Check a V1 token: recompute the salted MD5 interleave and compare in constant time.
///
/// V1 has no forward secrecy (the salt is static) and MD5 is weak; prefer
/// [`validate_v2`] for new deployments.
pub fn validate_v1(
    claim: &WorkClaim<'_>,
    expected_hash: &str,
    salt: &str,
    model: &str,
    revision: &str,
) -> Result<(), VerifyError> {
    let expected = Token::from_hex(expected_hash)?;
    let computed = legacy_digest(claim, salt, model, revision);
    compare(&computed, &expected)
}

/// Check a V2 token against a hex session key.
pub fn validate_v2(
    claim: &WorkClaim<'_>,
    expected_token: &str,
    session_key: &str,
    sub: &str,
    model: &str,
    revision: &str,
) -> Result<(), VerifyError> {
    let key = SessionKey::from_hex(session_key)?;
    validate_v2_with_key(claim, expected_token, &key, sub, model, revision)
}

/// Check a V2 token against an already parsed session key.
pub fn validate_v2_with_key(
    claim: &WorkClaim<'_>,
    expected_token: &str,
    key: &SessionKey,
    sub: &str,
    model: &str,
    revision: &str,
) -> Result<(), VerifyError> {
    let expected = Token::from_hex(expected_token)?;
    let computed = session_digest(claim, key, sub, model, revision);
    compare(&computed, &expected)
}

fn compare(computed: &Token, expected: &Token) -> Result<(), VerifyError> {
    if ct_eq(computed.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(VerifyError::TokenMismatch)
    }
}

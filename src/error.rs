use crate::types::SchemeKind;

/// Malformed caller input: bad hex, wrong lengths, unparsable timestamps.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("{field}: invalid hex encoding")]
    InvalidHex { field: &'static str },
    #[error("{field}: expected {expected} hex characters, got {actual}")]
    WrongLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Key-exchange failures while producing or opening a session-init blob.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("malformed session input: {0}")]
    Malformed(#[from] InputError),
    #[error("session init authentication failed")]
    AuthenticationFailed,
    #[error("non-contributory key exchange")]
    WeakKey,
    #[error("session init encryption failed")]
    EncryptionFailed,
    #[error("session context mismatch")]
    ContextMismatch,
    #[error("session expired at {expires_at} (now {now})")]
    Expired { expires_at: u64, now: u64 },
    #[error("session issued at {issued_at} is in the future (now {now})")]
    NotYetValid { issued_at: u64, now: u64 },
}

/// Why a token or request was rejected.
///
/// The engine boundary collapses every variant to `false` / `""`; the typed
/// value exists for tests and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("input format: {0}")]
    InputFormat(#[from] InputError),
    #[error("crypto failure: {0}")]
    Crypto(#[from] SessionError),
    #[error("scheme mismatch: expected {expected}, found {found}")]
    SchemeMismatch {
        expected: SchemeKind,
        found: SchemeKind,
    },
    #[error("token does not match")]
    TokenMismatch,
    #[error("token timestamp too old")]
    StaleToken,
    #[error("token timestamp is in the future")]
    FutureToken,
    #[error("token timestamp outside the session window")]
    OutsideSession,
    #[error("no recipient key configured")]
    NoRecipientKey,
    #[error("verification engine unavailable")]
    EngineUnavailable,
}

/// Construction-time errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("session setup failed: {0}")]
    Session(#[from] SessionError),
}

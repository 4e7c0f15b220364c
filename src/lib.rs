//! Session-keyed work tokens for LLM output verification.
//!
//! A miner seals a random session key for a validator's X25519 public key
//! ([`session::create_session_init`]), ships the resulting blob once, and then
//! stamps every output with a short HMAC token ([`token::generate`]). The
//! validator opens the blob with its private key and checks tokens with
//! [`verify::validate_v2`]. The older salted-MD5 scheme ([`verify::validate_v1`])
//! remains for validators that have not moved to sessions.
//!
//! Most callers go through [`Verifier`], which picks an engine once from
//! configuration and exposes the boundary API (`generate`, `session_init`,
//! `validate`, `validate_v2`, `decrypt_session_key`).

pub mod engine;
pub mod error;
pub mod keys;
pub mod primitives;
pub mod request;
pub mod session;
pub mod token;
pub mod types;
pub mod verify;

pub use engine::{
    CryptoEngine, EngineConfig, EngineConfigBuilder, EngineMode, StubEngine, VerificationEngine,
    Verifier,
};
pub use error::{Error, InputError, SessionError, VerifyError};
pub use keys::{KeyPair, PublicKey, SecretKey};
pub use request::{LegacyRequest, SessionRequest, TokenRequest};
pub use session::{
    create_session_init, is_session_init_v2, recover_session_key, recover_session_key_hex,
    FreshnessPolicy, InitiatedSession, Session, SessionParams, SessionPolicy,
};
pub use token::{generate, Scheme};
pub use types::{SchemeKind, SessionInitBlob, SessionKey, Token, WorkClaim};
pub use verify::{validate_v1, validate_v2, validate_v2_with_key};

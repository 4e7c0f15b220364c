//! The verification engine capability and the `Verifier` context.
//!
//! An engine is chosen once, from configuration, when the `Verifier` is
//! built: `CryptoEngine` does the real work, `StubEngine` answers every call
//! with a neutral value (`""` / `false`) that no validator accepts.
pub mod crypto;
pub mod stub;

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, VerifyError};
use crate::keys::{PublicKey, SecretKey};
use crate::request::TokenRequest;
use crate::session::{FreshnessPolicy, SessionPolicy, SystemTimeProvider, TimeProvider};
use crate::token::Scheme;
use crate::types::{SchemeKind, SessionInitBlob, Token, WorkClaim};

pub use crypto::CryptoEngine;
pub use stub::StubEngine;

/// Which engine implementation to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    #[default]
    Crypto,
    Stub,
}

/// Everything needed to build a verifier.
///
/// An engine with `recipient_public_key` acts as an initiator (miner): it
/// seals one session for that recipient at startup. An engine with
/// `recipient_secret_key` acts as a validator. Either, both or neither may be
/// set.
#[derive(Builder, Clone)]
#[builder(pattern = "owned")]
pub struct EngineConfig {
    #[builder(default)]
    pub mode: EngineMode,
    #[builder(default, setter(strip_option))]
    pub recipient_public_key: Option<PublicKey>,
    #[builder(default, setter(strip_option))]
    pub recipient_secret_key: Option<SecretKey>,
    /// Trust domain both parties must agree on.
    #[builder(default, setter(into))]
    pub context: String,
    #[builder(default)]
    pub session_policy: SessionPolicy,
    #[builder(default)]
    pub freshness: FreshnessPolicy,
    #[builder(default = "1024")]
    pub cache_capacity: u64,
    #[builder(default = "true")]
    pub allow_legacy: bool,
    #[builder(default = "Arc::new(SystemTimeProvider)")]
    pub time: Arc<dyn TimeProvider>,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), Error> {
        self.session_policy.validate()?;
        self.freshness.validate()?;
        if self.cache_capacity == 0 {
            return Err(Error::InvalidConfig("cache_capacity must be >= 1".into()));
        }
        Ok(())
    }

    /// A config whose engine answers every call with the neutral value.
    pub fn stub() -> Self {
        Self {
            mode: EngineMode::Stub,
            recipient_public_key: None,
            recipient_secret_key: None,
            context: String::new(),
            session_policy: SessionPolicy::default(),
            freshness: FreshnessPolicy::default(),
            cache_capacity: 1,
            allow_legacy: true,
            time: Arc::new(SystemTimeProvider),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("mode", &self.mode)
            .field("recipient_public_key", &self.recipient_public_key)
            .field("validator", &self.recipient_secret_key.is_some())
            .field("context", &self.context)
            .field("session_policy", &self.session_policy)
            .field("freshness", &self.freshness)
            .field("cache_capacity", &self.cache_capacity)
            .field("allow_legacy", &self.allow_legacy)
            .finish_non_exhaustive()
    }
}

impl EngineConfigBuilder {
    pub fn build_validated(self) -> Result<EngineConfig, Error> {
        let config = self
            .build()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// The verification capability.
///
/// Implementors supply the `try_*` / `check_*` methods, which report typed
/// failures. The provided methods are the public boundary: they collapse every
/// failure to an empty string or `false` and never panic.
pub trait VerificationEngine: Send + Sync {
    fn mode(&self) -> EngineMode;

    fn try_generate(&self, claim: &WorkClaim<'_>, scheme: &Scheme<'_>)
        -> Result<Token, VerifyError>;

    /// `Ok(None)` when this engine has no initiator role.
    fn try_session_init(&self) -> Result<Option<SessionInitBlob>, VerifyError>;

    /// Recover the session key (64 hex chars) from a blob with an explicit private key.
    fn decrypt_session_key(
        &self,
        blob_hex: &str,
        private_key_hex: &str,
    ) -> Result<String, VerifyError>;

    fn check_v1(
        &self,
        claim: &WorkClaim<'_>,
        expected_hash: &str,
        salt: &str,
        model: &str,
        revision: &str,
    ) -> Result<(), VerifyError>;

    fn check_v2(
        &self,
        claim: &WorkClaim<'_>,
        expected_token: &str,
        session_key: &str,
        sub: &str,
        model: &str,
        revision: &str,
    ) -> Result<(), VerifyError>;

    /// Hex token, or `""` if the engine cannot produce one.
    fn generate(&self, claim: &WorkClaim<'_>, scheme: &Scheme<'_>) -> String {
        match self.try_generate(claim, scheme) {
            Ok(token) => token.to_hex(),
            Err(err) => {
                debug!(error = %err, "generate returned the neutral token");
                String::new()
            }
        }
    }

    /// 312 hex chars for an initiator, `""` otherwise.
    fn session_init(&self) -> String {
        match self.try_session_init() {
            Ok(Some(blob)) => blob.to_hex(),
            Ok(None) => String::new(),
            Err(err) => {
                debug!(error = %err, "session init unavailable");
                String::new()
            }
        }
    }

    fn validate(
        &self,
        claim: &WorkClaim<'_>,
        expected_hash: &str,
        salt: &str,
        model: &str,
        revision: &str,
    ) -> bool {
        collapse(
            SchemeKind::Legacy,
            self.check_v1(claim, expected_hash, salt, model, revision),
        )
    }

    fn validate_v2(
        &self,
        claim: &WorkClaim<'_>,
        expected_token: &str,
        session_key: &str,
        sub: &str,
        model: &str,
        revision: &str,
    ) -> bool {
        collapse(
            SchemeKind::Session,
            self.check_v2(claim, expected_token, session_key, sub, model, revision),
        )
    }
}

fn collapse(scheme: SchemeKind, result: Result<(), VerifyError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            debug!(%scheme, error = %err, "token rejected");
            false
        }
    }
}

/// The verification context: built once at startup, cloned (cheaply) into
/// every call site.
#[derive(Clone)]
pub struct Verifier {
    engine: Arc<dyn VerificationEngine>,
}

impl Verifier {
    pub fn new(config: EngineConfig) -> Result<Self, Error> {
        config.validate()?;
        let engine: Arc<dyn VerificationEngine> = match config.mode {
            EngineMode::Crypto => Arc::new(CryptoEngine::new(config)?),
            EngineMode::Stub => Arc::new(StubEngine::new()),
        };
        Ok(Self { engine })
    }

    /// Wrap an already built engine.
    pub fn from_engine(engine: Arc<dyn VerificationEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<dyn VerificationEngine> {
        &self.engine
    }

    /// True iff `blob` has the exact length of a V2 session-init blob.
    pub fn is_session_init_v2(blob: &str) -> bool {
        crate::session::is_session_init_v2(blob)
    }

    /// Check a request with whichever scheme it declares.
    pub fn check_request(&self, request: &TokenRequest) -> Result<(), VerifyError> {
        let claim = request.claim();
        match request {
            TokenRequest::Legacy(r) => {
                self.engine
                    .check_v1(&claim, &r.hash, &r.salt, &r.model, &r.revision)
            }
            TokenRequest::Session(r) => self.engine.check_v2(
                &claim,
                &r.token,
                &r.session_key,
                &r.sub,
                &r.model,
                &r.revision,
            ),
        }
    }

    /// Check a request that must use `expected`.
    pub fn check_request_as(
        &self,
        request: &TokenRequest,
        expected: SchemeKind,
    ) -> Result<(), VerifyError> {
        let found = request.kind();
        if found != expected {
            return Err(VerifyError::SchemeMismatch { expected, found });
        }
        self.check_request(request)
    }

    pub fn validate_request(&self, request: &TokenRequest) -> bool {
        collapse(request.kind(), self.check_request(request))
    }

    /// Parse and check a JSON request; malformed JSON is a rejection.
    pub fn validate_json(&self, input: &str) -> bool {
        match TokenRequest::from_json(input) {
            Ok(request) => self.validate_request(&request),
            Err(err) => {
                debug!(error = %err, "request rejected");
                false
            }
        }
    }
}

impl Deref for Verifier {
    type Target = dyn VerificationEngine;

    fn deref(&self) -> &Self::Target {
        self.engine.as_ref()
    }
}

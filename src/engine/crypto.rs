use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, trace};

use crate::engine::{EngineConfig, EngineMode, VerificationEngine};
use crate::error::{Error, SessionError, VerifyError};
use crate::keys::{KeyPair, PublicKey, SecretKey};
use crate::session::{
    context_digest, create_session_init, recover_session_key, CacheKey, FreshnessPolicy,
    InitiatedSession, MokaSessionCache, Session, SessionKeyCache, SessionParams, SessionPolicy,
    TimeProvider,
};
use crate::token::{generate, Scheme};
use crate::types::{SchemeKind, SessionInitBlob, Token, WorkClaim};
use crate::verify::{validate_v1, validate_v2, validate_v2_with_key};

/// The real engine: X25519 session exchange, V1 and V2 tokens.
pub struct CryptoEngine {
    initiated: Option<InitiatedSession>,
    recipient: RwLock<Option<KeyPair>>,
    context_digest: [u8; 32],
    session_policy: SessionPolicy,
    freshness: FreshnessPolicy,
    allow_legacy: bool,
    cache: Arc<dyn SessionKeyCache>,
    time: Arc<dyn TimeProvider>,
}

impl CryptoEngine {
    pub fn new(config: EngineConfig) -> Result<Self, Error> {
        let cache = Arc::new(MokaSessionCache::new(config.cache_capacity));
        Self::with_cache(config, cache)
    }

    /// Build with a caller-supplied session cache.
    pub fn with_cache(config: EngineConfig, cache: Arc<dyn SessionKeyCache>) -> Result<Self, Error> {
        config.validate()?;
        let digest = context_digest(&config.context);

        let initiated = match config.recipient_public_key {
            Some(recipient) => {
                let params = SessionParams {
                    context_digest: digest,
                    issued_at: config.time.now_seconds(),
                    lifetime_secs: config.session_policy.lifetime.as_secs(),
                };
                Some(create_session_init(&recipient, &params)?)
            }
            None => None,
        };
        let recipient = config.recipient_secret_key.map(KeyPair::from_secret);

        info!(
            initiator = initiated.is_some(),
            validator = recipient.is_some(),
            session_id = %initiated.as_ref().map(|i| i.session.id_hex()).unwrap_or_default(),
            "verification engine ready"
        );

        Ok(Self {
            initiated,
            recipient: RwLock::new(recipient),
            context_digest: digest,
            session_policy: config.session_policy,
            freshness: config.freshness,
            allow_legacy: config.allow_legacy,
            cache,
            time: config.time,
        })
    }

    /// The session this engine initiated, if it has the initiator role.
    pub fn initiated(&self) -> Option<&InitiatedSession> {
        self.initiated.as_ref()
    }

    /// Scheme for minting V2 tokens with this engine's own session key.
    pub fn session_scheme<'a>(
        &'a self,
        sub: &'a str,
        model: &'a str,
        revision: &'a str,
    ) -> Option<Scheme<'a>> {
        self.initiated.as_ref().map(|init| Scheme::Session {
            key: &init.session.key,
            sub,
            model,
            revision,
        })
    }

    pub fn recipient_public_key(&self) -> Option<PublicKey> {
        self.recipient
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|pair| pair.public)
    }

    /// Replace the validator's private key. Every cached session is dropped.
    pub fn rotate_recipient_key(&self, secret: SecretKey) {
        let pair = KeyPair::from_secret(secret);
        let public = pair.public;
        *self.recipient.write().unwrap_or_else(PoisonError::into_inner) = Some(pair);
        self.cache.invalidate_all();
        info!(
            recipient = %hex::encode(&public.fingerprint()[..8]),
            "recipient key rotated"
        );
    }

    /// Open `blob_hex` with the configured recipient key (Initiated -> Established).
    pub fn recover_session(&self, blob_hex: &str) -> Result<Session, VerifyError> {
        let blob = SessionInitBlob::from_hex(blob_hex).map_err(SessionError::from)?;
        let pair = self.recipient_pair()?;
        self.recover_with(&blob, &pair)
    }

    /// Forget a recovered session (Established -> Discarded).
    pub fn discard_session(&self, blob_hex: &str) -> Result<(), VerifyError> {
        let blob = SessionInitBlob::from_hex(blob_hex).map_err(SessionError::from)?;
        let pair = self.recipient_pair()?;
        self.cache.invalidate(&CacheKey::new(&blob, &pair.public));
        Ok(())
    }

    /// Validate a V2 token against the session carried by `blob_hex`.
    ///
    /// On top of the token check, `created` must fall inside the session window.
    pub fn validate_with_session(
        &self,
        blob_hex: &str,
        claim: &WorkClaim<'_>,
        expected_token: &str,
        sub: &str,
        model: &str,
        revision: &str,
    ) -> Result<(), VerifyError> {
        let session = self.recover_session(blob_hex)?;
        if !self.session_policy.covers(&session, claim.created) {
            return Err(VerifyError::OutsideSession);
        }
        self.check_freshness(claim)?;
        validate_v2_with_key(claim, expected_token, &session.key, sub, model, revision)
    }

    fn recipient_pair(&self) -> Result<KeyPair, VerifyError> {
        self.recipient
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(VerifyError::NoRecipientKey)
    }

    fn recover_with(&self, blob: &SessionInitBlob, pair: &KeyPair) -> Result<Session, VerifyError> {
        let now = self.time.now_seconds();
        let key = CacheKey::new(blob, &pair.public);
        if let Some(session) = self.cache.get(&key) {
            trace!(session_id = %session.id_hex(), "session cache hit");
            self.session_policy.check(&session, now)?;
            return Ok(session);
        }

        let session = recover_session_key(blob, &pair.secret)?;
        if session.context_digest != self.context_digest {
            return Err(SessionError::ContextMismatch.into());
        }
        self.session_policy.check(&session, now)?;
        debug!(session_id = %session.id_hex(), "session established");
        self.cache.insert(key, session.clone());
        Ok(session)
    }

    fn ensure_legacy_allowed(&self, kind: SchemeKind) -> Result<(), VerifyError> {
        if kind == SchemeKind::Legacy && !self.allow_legacy {
            return Err(VerifyError::SchemeMismatch {
                expected: SchemeKind::Session,
                found: SchemeKind::Legacy,
            });
        }
        Ok(())
    }

    fn check_freshness(&self, claim: &WorkClaim<'_>) -> Result<(), VerifyError> {
        if !self.freshness.is_enabled() {
            return Ok(());
        }
        self.freshness.check(claim.created, self.time.now_seconds())
    }
}

impl VerificationEngine for CryptoEngine {
    fn mode(&self) -> EngineMode {
        EngineMode::Crypto
    }

    fn try_generate(
        &self,
        claim: &WorkClaim<'_>,
        scheme: &Scheme<'_>,
    ) -> Result<Token, VerifyError> {
        self.ensure_legacy_allowed(scheme.kind())?;
        Ok(generate(claim, scheme))
    }

    fn try_session_init(&self) -> Result<Option<SessionInitBlob>, VerifyError> {
        Ok(self.initiated.as_ref().map(|init| init.blob.clone()))
    }

    fn decrypt_session_key(
        &self,
        blob_hex: &str,
        private_key_hex: &str,
    ) -> Result<String, VerifyError> {
        let blob = SessionInitBlob::from_hex(blob_hex).map_err(SessionError::from)?;
        let secret = SecretKey::from_hex(private_key_hex).map_err(SessionError::from)?;
        // Pure in its arguments; the engine's context and session policy do not apply.
        let session = recover_session_key(&blob, &secret)?;
        Ok(session.key.to_hex())
    }

    fn check_v1(
        &self,
        claim: &WorkClaim<'_>,
        expected_hash: &str,
        salt: &str,
        model: &str,
        revision: &str,
    ) -> Result<(), VerifyError> {
        self.ensure_legacy_allowed(SchemeKind::Legacy)?;
        self.check_freshness(claim)?;
        validate_v1(claim, expected_hash, salt, model, revision)
    }

    fn check_v2(
        &self,
        claim: &WorkClaim<'_>,
        expected_token: &str,
        session_key: &str,
        sub: &str,
        model: &str,
        revision: &str,
    ) -> Result<(), VerifyError> {
        self.check_freshness(claim)?;
        validate_v2(claim, expected_token, session_key, sub, model, revision)
    }
}

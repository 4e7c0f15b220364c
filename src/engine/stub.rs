use tracing::warn;

use crate::engine::{EngineMode, VerificationEngine};
use crate::error::VerifyError;
use crate::token::Scheme;
use crate::types::{SessionInitBlob, Token, WorkClaim};

/// Stand-in engine for builds or deployments without the crypto backend.
///
/// Every operation fails with `EngineUnavailable`, so the boundary methods
/// return `""` and `false`: nothing ever validates.
#[derive(Debug, Default)]
pub struct StubEngine;

impl StubEngine {
    pub fn new() -> Self {
        warn!("verification engine unavailable; running in stub mode");
        Self
    }
}

impl VerificationEngine for StubEngine {
    fn mode(&self) -> EngineMode {
        EngineMode::Stub
    }

    fn try_generate(
        &self,
        _claim: &WorkClaim<'_>,
        _scheme: &Scheme<'_>,
    ) -> Result<Token, VerifyError> {
        Err(VerifyError::EngineUnavailable)
    }

    fn try_session_init(&self) -> Result<Option<SessionInitBlob>, VerifyError> {
        Err(VerifyError::EngineUnavailable)
    }

    fn decrypt_session_key(
        &self,
        _blob_hex: &str,
        _private_key_hex: &str,
    ) -> Result<String, VerifyError> {
        Err(VerifyError::EngineUnavailable)
    }

    fn check_v1(
        &self,
        _claim: &WorkClaim<'_>,
        _expected_hash: &str,
        _salt: &str,
        _model: &str,
        _revision: &str,
    ) -> Result<(), VerifyError> {
        Err(VerifyError::EngineUnavailable)
    }

    fn check_v2(
        &self,
        _claim: &WorkClaim<'_>,
        _expected_token: &str,
        _session_key: &str,
        _sub: &str,
        _model: &str,
        _revision: &str,
    ) -> Result<(), VerifyError> {
        Err(VerifyError::EngineUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionKey;

    #[test]
    fn every_operation_returns_the_neutral_value() {
        let engine = StubEngine::new();
        let claim = WorkClaim::new("job-42", 1_700_000_000, "hello world");
        let key = SessionKey::from_bytes([0u8; 32]);
        let scheme = Scheme::Session {
            key: &key,
            sub: "worker-7",
            model: "llama-3-8b",
            revision: "r1",
        };

        assert_eq!(engine.mode(), EngineMode::Stub);
        assert_eq!(engine.generate(&claim, &scheme), "");
        assert_eq!(engine.session_init(), "");
        assert!(!engine.validate(
            &claim,
            "8d44c43167de003391430192786631e0",
            "pepper",
            "llama-3-8b",
            "r1"
        ));
        assert!(!engine.validate_v2(
            &claim,
            "687b46145a10da0e8f4cb4f4d5097098",
            &key.to_hex(),
            "worker-7",
            "llama-3-8b",
            "r1"
        ));
    }

    #[test]
    fn typed_calls_report_unavailable() {
        let engine = StubEngine::new();
        assert_eq!(
            engine.decrypt_session_key("", ""),
            Err(VerifyError::EngineUnavailable)
        );
        assert_eq!(engine.try_session_init(), Err(VerifyError::EngineUnavailable));
    }
}

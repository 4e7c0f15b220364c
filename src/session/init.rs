use chacha20poly1305::aead::AeadInPlace;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce, Tag};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::SessionError;
use crate::keys::{PublicKey, SecretKey, KEY_LEN};
use crate::session::Session;
use crate::types::{SessionInitBlob, SessionKey, SESSION_INIT_HEX_LEN, SESSION_INIT_LEN};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const SESSION_ID_LEN: usize = 16;
const PAYLOAD_LEN: usize = SESSION_INIT_LEN - KEY_LEN - NONCE_LEN - TAG_LEN;

const NONCE_AT: usize = KEY_LEN;
const CIPHERTEXT_AT: usize = NONCE_AT + NONCE_LEN;
const TAG_AT: usize = CIPHERTEXT_AT + PAYLOAD_LEN;

const AEAD_KEY_CONTEXT: &str = "cllmv 2024 session-init v2 aead key";
const CONTEXT_DIGEST_CONTEXT: &str = "cllmv 2024 session context v2";
const AAD_TAG: &[u8] = b"cllmv:session-init:v2|";

/// Inputs the initiator seals into a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    pub context_digest: [u8; 32],
    pub issued_at: u64,
    pub lifetime_secs: u64,
}

impl SessionParams {
    pub fn new(context: &str, issued_at: u64, lifetime_secs: u64) -> Self {
        Self {
            context_digest: context_digest(context),
            issued_at,
            lifetime_secs,
        }
    }
}

/// The initiator's half of a session: the blob to ship and the key it carries.
#[derive(Debug, Clone)]
pub struct InitiatedSession {
    pub blob: SessionInitBlob,
    pub session: Session,
}

/// Digest of a deployment context string, sealed into every blob.
pub fn context_digest(context: &str) -> [u8; 32] {
    blake3::derive_key(CONTEXT_DIGEST_CONTEXT, context.as_bytes())
}

/// True iff `blob` has the exact hex length of a V2 session init.
pub fn is_session_init_v2(blob: &str) -> bool {
    blob.len() == SESSION_INIT_HEX_LEN
}

/// Seal a fresh random session key for `recipient`.
///
/// Every call uses a new ephemeral keypair, nonce, session key and session id,
/// so two blobs for the same recipient are unlinkable.
pub fn create_session_init(
    recipient: &PublicKey,
    params: &SessionParams,
) -> Result<InitiatedSession, SessionError> {
    let ephemeral = SecretKey::generate();
    let ephemeral_public = ephemeral.public_key();
    let shared = Zeroizing::new(
        ephemeral
            .diffie_hellman(recipient)
            .ok_or(SessionError::WeakKey)?,
    );
    let cipher = cipher_for(&shared, &ephemeral_public, recipient);

    let mut session_id = [0u8; SESSION_ID_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut session_id);
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let session = Session {
        key: SessionKey::random(),
        id: session_id,
        context_digest: params.context_digest,
        issued_at: params.issued_at,
        expires_at: params.issued_at.saturating_add(params.lifetime_secs),
    };

    let mut payload = encode_payload(&session);
    let tag = cipher
        .encrypt_in_place_detached(
            Nonce::from_slice(&nonce),
            &associated_data(&ephemeral_public, recipient),
            payload.as_mut_slice(),
        )
        .map_err(|_| SessionError::EncryptionFailed)?;

    let mut blob = [0u8; SESSION_INIT_LEN];
    blob[..NONCE_AT].copy_from_slice(ephemeral_public.as_bytes());
    blob[NONCE_AT..CIPHERTEXT_AT].copy_from_slice(&nonce);
    blob[CIPHERTEXT_AT..TAG_AT].copy_from_slice(payload.as_slice());
    blob[TAG_AT..].copy_from_slice(tag.as_slice());

    Ok(InitiatedSession {
        blob: SessionInitBlob::from_bytes(blob),
        session,
    })
}

/// Open a blob with the recipient's private key.
///
/// Fails with `AuthenticationFailed` if the blob was tampered with or was
/// sealed for a different recipient.
pub fn recover_session_key(
    blob: &SessionInitBlob,
    recipient: &SecretKey,
) -> Result<Session, SessionError> {
    let bytes = blob.as_bytes();
    let ephemeral_public = PublicKey::from_bytes(take::<KEY_LEN>(bytes, 0));
    let nonce = take::<NONCE_LEN>(bytes, NONCE_AT);
    let tag = take::<TAG_LEN>(bytes, TAG_AT);
    let mut payload = Zeroizing::new(take::<PAYLOAD_LEN>(bytes, CIPHERTEXT_AT));

    let recipient_public = recipient.public_key();
    let shared = Zeroizing::new(
        recipient
            .diffie_hellman(&ephemeral_public)
            .ok_or(SessionError::WeakKey)?,
    );
    let cipher = cipher_for(&shared, &ephemeral_public, &recipient_public);
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&nonce),
            &associated_data(&ephemeral_public, &recipient_public),
            payload.as_mut_slice(),
            Tag::from_slice(&tag),
        )
        .map_err(|_| SessionError::AuthenticationFailed)?;

    Ok(decode_payload(&payload))
}

/// Hex form of [`recover_session_key`].
pub fn recover_session_key_hex(
    blob_hex: &str,
    private_key_hex: &str,
) -> Result<Session, SessionError> {
    let blob = SessionInitBlob::from_hex(blob_hex)?;
    let recipient = SecretKey::from_hex(private_key_hex)?;
    recover_session_key(&blob, &recipient)
}

fn cipher_for(
    shared: &[u8; 32],
    ephemeral_public: &PublicKey,
    recipient_public: &PublicKey,
) -> ChaCha20Poly1305 {
    let mut hasher = blake3::Hasher::new_derive_key(AEAD_KEY_CONTEXT);
    hasher.update(shared);
    hasher.update(ephemeral_public.as_bytes());
    hasher.update(recipient_public.as_bytes());
    let key: Zeroizing<[u8; 32]> = Zeroizing::new(hasher.finalize().into());
    ChaCha20Poly1305::new(Key::from_slice(key.as_slice()))
}

fn associated_data(ephemeral_public: &PublicKey, recipient_public: &PublicKey) -> Vec<u8> {
    let mut aad = Vec::with_capacity(AAD_TAG.len() + 2 * KEY_LEN);
    aad.extend_from_slice(AAD_TAG);
    aad.extend_from_slice(ephemeral_public.as_bytes());
    aad.extend_from_slice(recipient_public.as_bytes());
    aad
}

// key (32) | context digest (32) | session id (16) | issued_at (8) | expires_at (8)
fn encode_payload(session: &Session) -> Zeroizing<[u8; PAYLOAD_LEN]> {
    let mut out = Zeroizing::new([0u8; PAYLOAD_LEN]);
    out[..32].copy_from_slice(session.key.as_bytes());
    out[32..64].copy_from_slice(&session.context_digest);
    out[64..80].copy_from_slice(&session.id);
    out[80..88].copy_from_slice(&session.issued_at.to_le_bytes());
    out[88..96].copy_from_slice(&session.expires_at.to_le_bytes());
    out
}

fn decode_payload(payload: &[u8; PAYLOAD_LEN]) -> Session {
    Session {
        key: SessionKey::from_bytes(take::<32>(payload, 0)),
        context_digest: take::<32>(payload, 32),
        id: take::<SESSION_ID_LEN>(payload, 64),
        issued_at: u64::from_le_bytes(take::<8>(payload, 80)),
        expires_at: u64::from_le_bytes(take::<8>(payload, 88)),
    }
}

fn take<const N: usize>(src: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&src[at..at + N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InputError;
    use crate::keys::KeyPair;

    fn params() -> SessionParams {
        SessionParams::new("test-deployment", 1_700_000_000, 3600)
    }

    #[test]
    fn payload_fills_the_blob_exactly() {
        assert_eq!(PAYLOAD_LEN, 96);
        assert_eq!(TAG_AT + TAG_LEN, SESSION_INIT_LEN);
    }

    #[test]
    fn round_trip_recovers_embedded_key() {
        let validator = KeyPair::generate();
        let init = create_session_init(&validator.public, &params()).expect("create init");
        let recovered = recover_session_key(&init.blob, &validator.secret).expect("recover");

        assert_eq!(recovered, init.session);
        assert_eq!(recovered.issued_at, 1_700_000_000);
        assert_eq!(recovered.expires_at, 1_700_003_600);
        assert_eq!(recovered.context_digest, context_digest("test-deployment"));
    }

    #[test]
    fn recovery_is_deterministic() {
        let validator = KeyPair::generate();
        let init = create_session_init(&validator.public, &params()).unwrap();
        let first = recover_session_key(&init.blob, &validator.secret).unwrap();
        let second = recover_session_key(&init.blob, &validator.secret).unwrap();
        assert_eq!(first.key, second.key);
    }

    #[test]
    fn creation_is_randomised() {
        let validator = KeyPair::generate();
        let a = create_session_init(&validator.public, &params()).unwrap();
        let b = create_session_init(&validator.public, &params()).unwrap();
        assert_ne!(a.blob, b.blob);
        assert_ne!(a.session.key, b.session.key);
        assert_ne!(a.blob.as_bytes()[..KEY_LEN], b.blob.as_bytes()[..KEY_LEN]);
    }

    #[test]
    fn wrong_recipient_fails_authentication() {
        let intended = KeyPair::generate();
        let other = KeyPair::generate();
        let init = create_session_init(&intended.public, &params()).unwrap();
        let err = recover_session_key(&init.blob, &other.secret).expect_err("wrong key");
        assert_eq!(err, SessionError::AuthenticationFailed);
    }

    #[test]
    fn tampering_fails_authentication() {
        let validator = KeyPair::generate();
        let init = create_session_init(&validator.public, &params()).unwrap();

        for at in [NONCE_AT, CIPHERTEXT_AT, CIPHERTEXT_AT + 40, TAG_AT, SESSION_INIT_LEN - 1] {
            let mut bytes = *init.blob.as_bytes();
            bytes[at] ^= 0x01;
            let err = recover_session_key(&SessionInitBlob::from_bytes(bytes), &validator.secret)
                .expect_err("tampered blob");
            assert_eq!(err, SessionError::AuthenticationFailed, "offset {at}");
        }

        let mut bytes = *init.blob.as_bytes();
        bytes[3] ^= 0x40;
        let err = recover_session_key(&SessionInitBlob::from_bytes(bytes), &validator.secret)
            .expect_err("tampered ephemeral key");
        assert!(matches!(
            err,
            SessionError::AuthenticationFailed | SessionError::WeakKey
        ));
    }

    #[test]
    fn low_order_recipient_is_rejected() {
        let err = create_session_init(&PublicKey::from_bytes([0u8; 32]), &params())
            .expect_err("low-order recipient");
        assert_eq!(err, SessionError::WeakKey);
    }

    #[test]
    fn hex_recovery_accepts_upper_case() {
        let validator = KeyPair::generate();
        let init = create_session_init(&validator.public, &params()).unwrap();
        let recovered = recover_session_key_hex(
            &init.blob.to_hex().to_uppercase(),
            &validator.secret.to_hex().to_uppercase(),
        )
        .expect("upper-case hex");
        assert_eq!(recovered.key, init.session.key);
    }

    #[test]
    fn hex_recovery_reports_malformed_input() {
        let validator = KeyPair::generate();
        let init = create_session_init(&validator.public, &params()).unwrap();
        let blob_hex = init.blob.to_hex();

        let err = recover_session_key_hex(&blob_hex[..311], &validator.secret.to_hex())
            .expect_err("short blob");
        assert_eq!(
            err,
            SessionError::Malformed(InputError::WrongLength {
                field: "session_init",
                expected: 312,
                actual: 311,
            })
        );

        let bad = format!("zz{}", &blob_hex[2..]);
        let err = recover_session_key_hex(&bad, &validator.secret.to_hex()).expect_err("bad hex");
        assert!(matches!(err, SessionError::Malformed(InputError::InvalidHex { .. })));

        let err = recover_session_key_hex(&blob_hex, "abcd").expect_err("short private key");
        assert!(matches!(err, SessionError::Malformed(InputError::WrongLength { .. })));
    }

    #[test]
    fn probe_accepts_only_exact_length() {
        let validator = KeyPair::generate();
        let blob_hex = create_session_init(&validator.public, &params())
            .unwrap()
            .blob
            .to_hex();
        assert!(is_session_init_v2(&blob_hex));
        assert!(!is_session_init_v2(&blob_hex[..311]));
        assert!(!is_session_init_v2(&format!("{blob_hex}0")));
        assert!(!is_session_init_v2(""));
    }
}

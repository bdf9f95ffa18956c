//! Signed checkpoints: periodic, non-repudiable claims about chain position.
//!
//! A checkpoint binds `(chain_index, head_hash, created_at)` and is signed
//! with ECDSA over P-256/SHA-256. Signing keys are consumed as PKCS#8 PEM;
//! verification keys as PKIX PEM, per the curve and algorithm fixed by the
//! pipeline's external interface — `algorithm` in the written file is
//! informational only and readers must reject any other value.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey};

use auditchain_model::chain::{CheckpointBody, SignedCheckpoint, CHECKPOINT_ALGORITHM};
use auditchain_model::error::{AuditError, AuditResult};

use crate::canonical::canonicalize_as_is;

/// Load an ECDSA P-256 signing key from a PKCS#8 PEM string.
pub fn load_signing_key(pem: &str) -> AuditResult<SigningKey> {
    SigningKey::from_pkcs8_pem(pem).map_err(|e| AuditError::KeyError {
        reason: format!("invalid PKCS#8 signing key: {e}"),
    })
}

/// Load an ECDSA P-256 verifying key from a PKIX (SubjectPublicKeyInfo) PEM string.
pub fn load_verifying_key(pem: &str) -> AuditResult<VerifyingKey> {
    VerifyingKey::from_public_key_pem(pem).map_err(|e| AuditError::KeyError {
        reason: format!("invalid PKIX public key: {e}"),
    })
}

/// Build and sign a checkpoint for the current chain position.
///
/// `created_at` is the caller's responsibility to supply (rather than read
/// the clock here) so callers can pin it for reproducible tests; production
/// callers pass `Utc::now()`.
pub fn sign(
    chain_index: u64,
    head_hash: &str,
    created_at: chrono::DateTime<Utc>,
    key: &SigningKey,
) -> AuditResult<SignedCheckpoint> {
    let body = CheckpointBody {
        chain_index,
        head_hash: head_hash.to_string(),
        created_at,
    };
    let canonical = canonicalize_as_is(&body).map_err(|e| AuditError::Checkpoint {
        reason: e.to_string(),
    })?;
    let signature: Signature = key.sign(&canonical);
    Ok(SignedCheckpoint {
        checkpoint: body,
        signature: BASE64.encode(signature.to_bytes()),
        algorithm: CHECKPOINT_ALGORITHM.to_string(),
    })
}

/// Outcome of validating a signed checkpoint's signature alone (not head
/// match — that is the verifier's concern, since it requires the stream).
pub fn signature_is_valid(checkpoint: &SignedCheckpoint, key: &VerifyingKey) -> bool {
    if checkpoint.algorithm != CHECKPOINT_ALGORITHM {
        return false;
    }
    let canonical = match canonicalize_as_is(&checkpoint.checkpoint) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let sig_bytes = match BASE64.decode(&checkpoint.signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature = match Signature::from_slice(&sig_bytes) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    key.verify(&canonical, &signature).is_ok()
}

/// Format the checkpoint file name for a given chain index and timestamp.
pub fn checkpoint_file_name(chain_index: u64, created_at: chrono::DateTime<Utc>) -> String {
    format!(
        "checkpoint-{chain_index}-{}.json",
        created_at.format("%Y%m%dT%H%M%SZ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::pkcs8::EncodePrivateKey;
    use rand_core::OsRng;

    fn test_keypair() -> (SigningKey, VerifyingKey) {
        let signing = SigningKey::random(&mut OsRng);
        let verifying = VerifyingKey::from(&signing);
        (signing, verifying)
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let (signing, verifying) = test_keypair();
        let checkpoint = sign(5, &"ab".repeat(32), Utc::now(), &signing).unwrap();
        assert!(signature_is_valid(&checkpoint, &verifying));
    }

    #[test]
    fn tampering_with_head_hash_invalidates_signature() {
        let (signing, verifying) = test_keypair();
        let mut checkpoint = sign(5, &"ab".repeat(32), Utc::now(), &signing).unwrap();
        checkpoint.checkpoint.head_hash = "cd".repeat(32);
        assert!(!signature_is_valid(&checkpoint, &verifying));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let (signing, _verifying) = test_keypair();
        let (_other_signing, other_verifying) = test_keypair();
        let checkpoint = sign(5, &"ab".repeat(32), Utc::now(), &signing).unwrap();
        assert!(!signature_is_valid(&checkpoint, &other_verifying));
    }

    #[test]
    fn unexpected_algorithm_is_rejected() {
        let (signing, verifying) = test_keypair();
        let mut checkpoint = sign(5, &"ab".repeat(32), Utc::now(), &signing).unwrap();
        checkpoint.algorithm = "HMAC-SHA256".to_string();
        assert!(!signature_is_valid(&checkpoint, &verifying));
    }

    #[test]
    fn signing_key_loads_from_pkcs8_pem() {
        let (signing, _) = test_keypair();
        let pem = signing
            .to_pkcs8_pem(p256::pkcs8::LineEnding::LF)
            .unwrap()
            .to_string();
        let loaded = load_signing_key(&pem).unwrap();
        assert_eq!(loaded.to_bytes(), signing.to_bytes());
    }
}

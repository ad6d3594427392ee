//! Attestation digests
//!
//! `HMAC-SHA256(key = service_secret ":" signer_secret,
//!              msg = VERB "|" STAGE "|" target_type "|" target_id)`
//!
//! The digest is computed once, from the snapshot fields of the signature,
//! so any later change to verb, stage or target no longer verifies.

use hankosign_core::{SecretKey, TargetRef, Verb};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded attestation digest
pub fn attestation_digest(
    service_secret: &SecretKey,
    signer_secret: &SecretKey,
    verb: Verb,
    stage: &str,
    target: &TargetRef,
) -> String {
    let key = format!("{}:{}", service_secret.expose(), signer_secret.expose());
    let message = format!("{}|{}|{}|{}", verb.code(), stage, target.type_name, target.id);

    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Recompute a digest and compare in constant time
pub fn verify_attestation(
    expected: &str,
    service_secret: &SecretKey,
    signer_secret: &SecretKey,
    verb: Verb,
    stage: &str,
    target: &TargetRef,
) -> bool {
    let actual = attestation_digest(service_secret, signer_secret, verb, stage, target);
    actual.as_bytes().ct_eq(expected.as_bytes()).into()
}

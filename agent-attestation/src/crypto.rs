//! Ed25519 signature verification over a signature base.

use ed25519_dalek::{Signature, VerifyingKey};
use signature::Verifier;
use tracing::debug;

/// Verifies `signature_bytes` over the UTF-8 bytes of `signature_base`.
///
/// Fails closed: a signature of the wrong length, a malformed signature, or a
/// non-matching key all yield `false`. This function never panics.
///
/// # Examples
///
/// ```
/// use ed25519_dalek::SigningKey;
/// use signature::Signer;
///
/// let signing_key = SigningKey::from_bytes(&[7u8; 32]);
/// let signature = signing_key.sign(b"base");
///
/// assert!(agent_attestation::crypto::verify_ed25519(
///     &signing_key.verifying_key(),
///     "base",
///     &signature.to_bytes(),
/// ));
/// assert!(!agent_attestation::crypto::verify_ed25519(
///     &signing_key.verifying_key(),
///     "other",
///     &signature.to_bytes(),
/// ));
/// ```
#[must_use]
pub fn verify_ed25519(public_key: &VerifyingKey, signature_base: &str, signature_bytes: &[u8]) -> bool {
    let Ok(signature) = Signature::from_slice(signature_bytes) else {
        debug!(len = signature_bytes.len(), "Signature has invalid length");
        return false;
    };

    public_key.verify(signature_base.as_bytes(), &signature).is_ok()
}

//! HMAC-SHA-256 verification of launch-payload signatures.
//!
//! Two keyed hashes, `KeyedHash(key, message)`:
//!
//! ```text
//! derived = HMAC-SHA256(key = shared_secret, message = "WebAppData")
//! digest  = HMAC-SHA256(key = derived,       message = canonical_string)
//! ```
//!
//! The shared secret is the key of the first hash, never its message.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::canonical::CanonicalString;
use crate::error::VerifyError;

type HmacSha256 = Hmac<Sha256>;

/// Fixed message of the key-derivation hash.
pub const KEY_DERIVATION_MESSAGE: &[u8] = b"WebAppData";

/// Length of a SHA-256 digest in bytes.
pub const DIGEST_LEN: usize = 32;

fn keyed_hash(key: &[u8], message: &[u8]) -> Result<[u8; DIGEST_LEN], VerifyError> {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| VerifyError::InvalidKeyLength)?;
    mac.update(message);
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Derive the per-application key from the shared bot credential.
///
/// # Errors
///
/// Returns [`VerifyError::MissingKey`] if `shared_secret` is empty.
pub fn derive_key(shared_secret: &[u8]) -> Result<[u8; DIGEST_LEN], VerifyError> {
    if shared_secret.is_empty() {
        return Err(VerifyError::MissingKey);
    }
    keyed_hash(shared_secret, KEY_DERIVATION_MESSAGE)
}

/// Compute the lowercase hex signature of `canonical` under `shared_secret`.
///
/// # Errors
///
/// Returns [`VerifyError::MissingKey`] if `shared_secret` is empty.
pub fn sign(canonical: &CanonicalString, shared_secret: &[u8]) -> Result<String, VerifyError> {
    Ok(SignatureVerifier::new(shared_secret)?.sign(canonical))
}

/// Check `asserted_signature` (hex, any case) against `canonical`.
///
/// Returns `Ok(false)` on any mismatch, including a signature that is not
/// valid hex.
///
/// # Errors
///
/// Returns [`VerifyError::MissingKey`] if `shared_secret` is empty.
pub fn verify(
    canonical: &CanonicalString,
    asserted_signature: &str,
    shared_secret: &[u8],
) -> Result<bool, VerifyError> {
    Ok(SignatureVerifier::new(shared_secret)?.verify(canonical, asserted_signature))
}

/// A verifier keyed with the secret derived from one shared secret.
///
/// Built once at process start and shared read-only between requests.
#[derive(Clone)]
pub struct SignatureVerifier {
    mac: HmacSha256,
}

impl SignatureVerifier {
    /// Derive the verification key from `shared_secret`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::MissingKey`] if `shared_secret` is empty, or
    /// [`VerifyError::InvalidKeyLength`] if HMAC refuses the derived key.
    pub fn new(shared_secret: &[u8]) -> Result<Self, VerifyError> {
        let derived_key = derive_key(shared_secret)?;
        let mac = <HmacSha256 as Mac>::new_from_slice(&derived_key)
            .map_err(|_| VerifyError::InvalidKeyLength)?;
        Ok(Self { mac })
    }

    fn digest(&self, canonical: &CanonicalString) -> [u8; DIGEST_LEN] {
        let mut mac = self.mac.clone();
        mac.update(canonical.as_bytes());
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&mac.finalize().into_bytes());
        out
    }

    /// Lowercase hex signature of `canonical`.
    #[must_use]
    pub fn sign(&self, canonical: &CanonicalString) -> String {
        hex::encode(self.digest(canonical))
    }

    /// Constant-time check of `asserted_signature` against `canonical`.
    #[must_use]
    pub fn verify(&self, canonical: &CanonicalString, asserted_signature: &str) -> bool {
        let Ok(asserted) = hex::decode(asserted_signature.trim()) else {
            return false;
        };
        if asserted.len() != DIGEST_LEN {
            return false;
        }
        let computed = self.digest(canonical);
        bool::from(computed.as_slice().ct_eq(asserted.as_slice()))
    }
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("mac", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"123456:TEST-bot-token";
    const MESSAGE: &str = "auth_date=1700000000\nid=42\nusername=alice";
    // HMAC(HMAC(SECRET, "WebAppData"), MESSAGE)
    const EXPECTED: &str = "e214e918f68e41a4ffddad10b0ca2de0a71daf43a9019ec42ecf99b1f8835889";
    // HMAC(HMAC("WebAppData", SECRET), MESSAGE): the reversed derivation
    const REVERSED: &str = "8c1a3d9638772b88863a2d5adce98f6495a7d40e707dbeb1f08b8049125dc623";

    #[test]
    fn derivation_uses_secret_as_key() {
        let canonical = CanonicalString::new(MESSAGE);
        assert_eq!(sign(&canonical, SECRET).unwrap(), EXPECTED);
        assert!(verify(&canonical, EXPECTED, SECRET).unwrap());
    }

    #[test]
    fn reversed_derivation_is_rejected() {
        let canonical = CanonicalString::new(MESSAGE);
        assert!(!verify(&canonical, REVERSED, SECRET).unwrap());
    }

    #[test]
    fn comparison_ignores_hex_case() {
        let canonical = CanonicalString::new(MESSAGE);
        assert!(verify(&canonical, &EXPECTED.to_ascii_uppercase(), SECRET).unwrap());
    }

    #[test]
    fn every_single_character_flip_is_rejected() {
        let canonical = CanonicalString::new(MESSAGE);
        let verifier = SignatureVerifier::new(SECRET).unwrap();
        for i in 0..EXPECTED.len() {
            let mut tampered: Vec<u8> = EXPECTED.bytes().collect();
            tampered[i] = if tampered[i] == b'0' { b'1' } else { b'0' };
            let tampered = String::from_utf8(tampered).unwrap();
            assert!(!verifier.verify(&canonical, &tampered), "flip at {i} accepted");
        }
    }

    #[test]
    fn every_message_byte_flip_is_rejected() {
        let verifier = SignatureVerifier::new(SECRET).unwrap();
        for i in 0..MESSAGE.len() {
            let mut bytes = MESSAGE.as_bytes().to_vec();
            bytes[i] ^= 0x01;
            let tampered = CanonicalString::new(String::from_utf8_lossy(&bytes).into_owned());
            assert!(!verifier.verify(&tampered, EXPECTED), "flip at {i} accepted");
        }
    }

    #[test]
    fn truncated_or_non_hex_signatures_are_mismatches() {
        let canonical = CanonicalString::new(MESSAGE);
        assert!(!verify(&canonical, &EXPECTED[..62], SECRET).unwrap());
        assert!(!verify(&canonical, "zz", SECRET).unwrap());
        assert!(!verify(&canonical, "", SECRET).unwrap());
    }

    #[test]
    fn empty_secret_is_an_error() {
        let canonical = CanonicalString::new(MESSAGE);
        assert_eq!(verify(&canonical, EXPECTED, b""), Err(VerifyError::MissingKey));
    }

    #[test]
    fn all_zero_signature_is_rejected() {
        let canonical = CanonicalString::new(MESSAGE);
        let verifier = SignatureVerifier::new(SECRET).unwrap();
        assert!(!verifier.verify(&canonical, &"0".repeat(2 * DIGEST_LEN)));
        assert_ne!(verifier.sign(&canonical), "0".repeat(2 * DIGEST_LEN));
    }

    #[test]
    fn reused_verifier_signs_each_message_independently() {
        let verifier = SignatureVerifier::new(SECRET).unwrap();
        let other = CanonicalString::new("auth_date=1");
        let _ = verifier.sign(&other);
        assert_eq!(verifier.sign(&CanonicalString::new(MESSAGE)), EXPECTED);
    }

    #[test]
    fn debug_does_not_print_key() {
        let verifier = SignatureVerifier::new(SECRET).unwrap();
        assert!(format!("{verifier:?}").contains("<redacted>"));
    }
}

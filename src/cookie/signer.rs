//! # Cookie signer
//!
//! Rotating-key HMAC-SHA256 signing and verification over the base64url
//! payload (spec §4.7). New module grounded on the teacher crate's
//! existing `ring` dependency: `ring::hmac::sign`/`verify` provide the
//! primitive and the constant-time comparison natively, so no separate
//! MAC crate is needed.

use ring::hmac;

use crate::base64url;
use crate::credentials::SigningKeyList;
use crate::errors::{ErrorCode, FirebaseError, Result};

/// `sign(payload) = base64url(payload) + "." + base64url(HMAC-SHA256(base64url(payload), signingKeys[0]))`.
pub fn sign(payload: &[u8], keys: &SigningKeyList) -> String {
    let encoded_payload = base64url::encode(payload);
    let key = hmac::Key::new(hmac::HMAC_SHA256, keys.signing_key().as_bytes());
    let tag = hmac::sign(&key, encoded_payload.as_bytes());
    let encoded_signature = base64url::encode(tag.as_ref());
    format!("{}.{}", encoded_payload, encoded_signature)
}

/// Splits `cookie_value` on the last `.`, recomputes the HMAC for each key
/// in `keys` in order, and returns the decoded payload bytes on the first
/// match. Unknown or malformed input fails with `INVALID_CREDENTIAL`.
pub fn verify(cookie_value: &str, keys: &SigningKeyList) -> Result<Vec<u8>> {
    let (encoded_payload, encoded_signature) = cookie_value
        .rsplit_once('.')
        .ok_or_else(|| FirebaseError::code(ErrorCode::InvalidCredential, "malformed cookie: missing signature"))?;

    let signature = base64url::decode(encoded_signature)
        .map_err(|_| FirebaseError::code(ErrorCode::InvalidCredential, "malformed cookie: bad signature encoding"))?;

    let verified = keys.verification_keys().iter().any(|candidate| {
        let key = hmac::Key::new(hmac::HMAC_SHA256, candidate.as_bytes());
        hmac::verify(&key, encoded_payload.as_bytes(), &signature).is_ok()
    });

    if !verified {
        return Err(FirebaseError::code(ErrorCode::InvalidCredential, "cookie signature did not match any known key"));
    }

    base64url::decode(encoded_payload)
        .map_err(|_| FirebaseError::code(ErrorCode::InvalidCredential, "malformed cookie: bad payload encoding"))
}

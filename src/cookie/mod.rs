//! # Signed session cookie
//!
//! Binds an (ID token, refresh token, optional custom token) triple into
//! an HMAC-authenticated cookie, per spec §3 `SessionCookie` / §4.7-4.8.

pub mod serializer;
pub mod signer;

use serde::{Deserialize, Serialize};

use crate::credentials::SigningKeyList;
use crate::errors::{ErrorCode, FirebaseError, Result};

/// The JSON payload carried inside a session cookie (spec §3
/// `SessionCookie`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookiePayload {
    #[serde(rename = "idToken")]
    pub id_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    #[serde(rename = "customToken", skip_serializing_if = "Option::is_none")]
    pub custom_token: Option<String>,
}

/// Signs `payload` into the cookie value form
/// `base64url(json) + "." + base64url(hmac)`.
pub fn sign(payload: &CookiePayload, keys: &SigningKeyList) -> Result<String> {
    let json = serde_json::to_vec(payload)?;
    Ok(signer::sign(&json, keys))
}

/// Verifies and decodes a cookie value, failing with `INVALID_CREDENTIAL`
/// on a bad signature or malformed JSON payload.
pub fn verify(cookie_value: &str, keys: &SigningKeyList) -> Result<CookiePayload> {
    let payload = signer::verify(cookie_value, keys)?;
    serde_json::from_slice(&payload)
        .map_err(|_| FirebaseError::code(ErrorCode::InvalidCredential, "cookie payload is not valid JSON"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_payload_through_sign_and_verify() {
        let keys = SigningKeyList::new(vec!["k1".into()]).unwrap();
        let payload = CookiePayload {
            id_token: "id".into(),
            refresh_token: "refresh".into(),
            custom_token: None,
        };
        let cookie = sign(&payload, &keys).unwrap();
        let decoded = verify(&cookie, &keys).unwrap();
        assert_eq!(decoded.id_token, "id");
        assert_eq!(decoded.refresh_token, "refresh");
    }
}

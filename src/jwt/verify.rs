use std::collections::HashMap;

use async_trait::async_trait;
use biscuit::jwa::SignatureAlgorithm;
use biscuit::jwk::RSAKeyParameters;
use biscuit::jws::Secret;
use biscuit::SingleOrMultiple;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::IdTokenJWT;
use crate::errors::{ErrorCode, FirebaseError, Result};

/// The `firebase` private-claim object Google embeds in ID tokens, used
/// only for its `tenant` field per spec §3's tenant invariant.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FirebaseTenantInfo {
    pub tenant: Option<String>,
}

/// Private claims carried by a Firebase ID token, beyond the registered
/// `iss`/`aud`/`sub`/`iat`/`exp` claims biscuit already models.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct IdTokenClaims {
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub auth_time: i64,
    pub firebase: Option<FirebaseTenantInfo>,
    #[serde(flatten)]
    pub custom_claims: serde_json::Map<String, serde_json::Value>,
}

/// A verified, decoded Firebase ID token (spec §3 `IdToken`).
#[derive(Debug, Clone, Serialize)]
pub struct IdToken {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub auth_time: i64,
    pub issued_at: i64,
    pub expires_at: i64,
    pub audience: String,
    pub issuer: String,
    pub subject: String,
    pub tenant_id: Option<String>,
    pub custom_claims: serde_json::Map<String, serde_json::Value>,
}

/// Resolves a `kid` (key id) to the RSA public key material published at
/// a JWKS endpoint. Implemented by [`crate::jwks::JwksCache`] for
/// production use, and by a static in-memory map in tests / emulator
/// mode.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve(&self, kid: &str) -> Option<RSAKeyParameters>;
}

#[async_trait]
impl KeyResolver for HashMap<String, RSAKeyParameters> {
    async fn resolve(&self, kid: &str) -> Option<RSAKeyParameters> {
        self.get(kid).cloned()
    }
}

/// Verification options for [`verify_compact`], spec §4.2.
pub struct VerifyOptions {
    pub audience: String,
    pub issuer: String,
    pub tenant_id: Option<String>,
    /// Overrides "now" for deterministic tests.
    pub current_date: Option<DateTime<Utc>>,
    /// When set, the emulator is in play: signature verification (steps
    /// 2-3 of spec §4.2) is skipped and only claim validation runs.
    pub emulator: bool,
}

impl VerifyOptions {
    pub fn new(audience: impl Into<String>, issuer: impl Into<String>) -> Self {
        VerifyOptions {
            audience: audience.into(),
            issuer: issuer.into(),
            tenant_id: None,
            current_date: None,
            emulator: false,
        }
    }
}

/// Verifies a compact JWS per spec §4.2:
///
/// 1. Parse the protected header without verifying; extract `kid`.
/// 2. No `kid` → `NO_KID_IN_HEADER`. No matching key → `NO_MATCHING_KID`.
/// 3. Verify the RS256 signature; mismatch → `INVALID_SIGNATURE`.
/// 4. Validate claims against `options.current_date` (default: now).
/// 5. In emulator mode, steps 2-3 are skipped entirely.
pub async fn verify_compact(token: &str, resolver: &dyn KeyResolver, options: &VerifyOptions) -> Result<IdToken> {
    let now = options.current_date.unwrap_or_else(Utc::now);
    let encoded = IdTokenJWT::new_encoded(token);

    let claims = if options.emulator {
        encoded.unverified_payload()?
    } else {
        let header = encoded.unverified_header()?;
        let kid = header
            .registered
            .key_id
            .as_ref()
            .ok_or_else(|| FirebaseError::code(ErrorCode::NoKidInHeader, "missing kid in JWT header"))?;

        let key = resolver
            .resolve(kid)
            .await
            .ok_or_else(|| FirebaseError::code(ErrorCode::NoMatchingKid, format!("no key for kid {}", kid)))?;

        let secret: Secret = key.jws_public_key_secret();
        let decoded = encoded
            .into_decoded(&secret, SignatureAlgorithm::RS256)
            .map_err(|_| FirebaseError::code(ErrorCode::InvalidSignature, "RS256 signature verification failed"))?;
        decoded.payload()?.clone()
    };

    let registered = &claims.registered;

    let expires_at = registered
        .expiry
        .as_ref()
        .ok_or_else(|| FirebaseError::code(ErrorCode::InvalidArgument, "missing exp claim"))?
        .timestamp();
    if expires_at <= now.timestamp() {
        return Err(FirebaseError::code(ErrorCode::TokenExpired, "id token has expired"));
    }

    let issued_at = registered
        .issued_at
        .as_ref()
        .ok_or_else(|| FirebaseError::code(ErrorCode::InvalidArgument, "missing iat claim"))?
        .timestamp();
    if issued_at > now.timestamp() {
        return Err(FirebaseError::code(ErrorCode::InvalidArgument, "iat is in the future"));
    }

    let audience = match registered.audience.as_ref() {
        Some(SingleOrMultiple::Single(v)) => v.to_string(),
        Some(SingleOrMultiple::Multiple(v)) => v.first().map(|v| v.to_string()).unwrap_or_default(),
        None => String::new(),
    };
    if audience != options.audience {
        return Err(FirebaseError::code(ErrorCode::InvalidArgument, "audience mismatch"));
    }

    let issuer = registered.issuer.as_ref().map(|v| v.to_string()).unwrap_or_default();
    if issuer != options.issuer {
        return Err(FirebaseError::code(ErrorCode::InvalidArgument, "issuer mismatch"));
    }

    let subject = registered.subject.as_ref().map(|v| v.to_string()).unwrap_or_default();
    if subject.is_empty() {
        return Err(FirebaseError::code(ErrorCode::InvalidArgument, "empty subject claim"));
    }

    if claims.private.auth_time > now.timestamp() {
        return Err(FirebaseError::code(ErrorCode::InvalidArgument, "auth_time is in the future"));
    }

    let tenant_id = claims.private.firebase.as_ref().and_then(|f| f.tenant.clone());
    if !options.emulator {
        match (&options.tenant_id, &tenant_id) {
            (Some(expected), Some(actual)) if expected != actual => {
                return Err(FirebaseError::code(ErrorCode::InvalidArgument, "tenant mismatch"));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(FirebaseError::code(ErrorCode::InvalidArgument, "tenant mismatch"));
            }
            _ => {}
        }
    }

    Ok(IdToken {
        uid: subject.clone(),
        email: claims.private.email.clone(),
        email_verified: claims.private.email_verified,
        auth_time: claims.private.auth_time,
        issued_at,
        expires_at,
        audience,
        issuer,
        subject,
        tenant_id,
        custom_claims: claims.private.custom_claims.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_kid_is_rejected() {
        // A JWT with no `kid` header field and an empty resolver must
        // fail fast with NO_KID_IN_HEADER, never attempting verification.
        let header = crate::base64url::encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = crate::base64url::encode(br#"{"sub":"u1"}"#);
        let token = format!("{}.{}.sig", header, payload);

        let resolver: HashMap<String, RSAKeyParameters> = HashMap::new();
        let options = VerifyOptions::new("p1", "https://securetoken.google.com/p1");
        let err = verify_compact(&token, &resolver, &options).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::NoKidInHeader);
    }
}

use std::ops::Add;
use std::str::FromStr;
use std::sync::Arc;

use biscuit::jwa::SignatureAlgorithm;
use biscuit::jws::{Header, RegisteredHeader, Secret};
use biscuit::{ClaimsSet, Empty, RegisteredClaims, SingleOrMultiple, StringOrUri, JWT};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use super::SignedJWT;
use crate::errors::{ErrorCode, FirebaseError, Result};

/// Private claims shared by every service-account-minted token this crate
/// produces: the OAuth2 assertion (§4.4), the identity-provider custom
/// token (§4.5), and the AppCheck token (§4.10 / `crate::appcheck`).
/// Generalizes the teacher crate's `JwtOAuthPrivateClaims`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct JwtPrivateClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<serde_json::Value>,
    #[serde(rename = "tenant_id", skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

/// Composes header `{alg, typ: "JWT", kid?}`, signs the concatenation of
/// URL-safe-base64-encoded header and payload with RSASSA-PKCS1-v1_5
/// SHA-256 (RS256) over the given key pair, and returns the compact JWS
/// string. Mirrors the teacher's `create_jwt` + `create_jwt_encoded`,
/// generalized to an arbitrary audience/subject/issuer and optional
/// custom claims, per spec §4.1.
///
/// Fails with `INVALID_ARGUMENT`-coded errors when `issuer`/`audience`
/// aren't valid URI-or-string claims; signing failures surface as
/// `FirebaseError::JWT`/`FirebaseError::Unspecified`.
#[allow(clippy::too_many_arguments)]
pub fn sign_claims(
    key_pair: Arc<ring::signature::RsaKeyPair>,
    key_id: Option<String>,
    issuer: &str,
    subject: &str,
    audience: &str,
    duration: Duration,
    private: JwtPrivateClaims,
) -> Result<String> {
    let header: Header<Empty> = Header::from(RegisteredHeader {
        algorithm: SignatureAlgorithm::RS256,
        key_id,
        ..Default::default()
    });

    let now = Utc::now();
    let claims = ClaimsSet::<JwtPrivateClaims> {
        registered: RegisteredClaims {
            issuer: Some(
                StringOrUri::from_str(issuer)
                    .map_err(|_| FirebaseError::code(ErrorCode::InvalidArgument, "invalid issuer"))?,
            ),
            subject: Some(
                StringOrUri::from_str(subject)
                    .map_err(|_| FirebaseError::code(ErrorCode::InvalidArgument, "invalid subject"))?,
            ),
            audience: Some(SingleOrMultiple::Single(
                StringOrUri::from_str(audience)
                    .map_err(|_| FirebaseError::code(ErrorCode::InvalidArgument, "invalid audience"))?,
            )),
            issued_at: Some(biscuit::Timestamp::from(now)),
            expiry: Some(biscuit::Timestamp::from(now.add(duration))),
            ..Default::default()
        },
        private,
    };

    let jwt: SignedJWT = JWT::new_decoded(header, claims);
    let secret = Secret::RsaKeyPair(key_pair);
    let encoded = jwt
        .encode(&secret)
        .map_err(|_| FirebaseError::code(ErrorCode::InternalError, "SIGN_FAILED"))?;
    Ok(encoded.encoded()?.encode())
}

//! # ID-token lifecycle manager
//!
//! Orchestrates [`crate::jwt::verify`], [`crate::jwks`] and
//! [`crate::identity`] into the two operations spec §4.6 names: plain
//! verification with optional revocation check, and verify-with-refresh.
//! New module; the teacher crate has no equivalent since its tokens are
//! never expired-and-refreshed transparently.

use crate::errors::{ErrorCode, FirebaseError, Result};
use crate::identity::{IdentityClient, RevocationCheck};
use crate::jwt::{verify_compact, IdToken, KeyResolver, VerifyOptions};

/// The result of [`verify_and_refresh_expired_id_token`]: the decoded
/// token paired with the (possibly refreshed) token strings, per spec
/// §3 `Tokens`.
pub struct Tokens {
    pub decoded: IdToken,
    pub id_token: String,
    pub refresh_token: String,
}

/// `verifyIdToken` (spec §4.6): verifies `token` against `resolver` and
/// `options`, then optionally checks revocation via `identity`'s user
/// lookup when `check_revoked` is set or a tenant is configured.
pub async fn verify_id_token(
    token: &str,
    resolver: &dyn KeyResolver,
    options: &VerifyOptions,
    check_revoked: bool,
    identity: Option<(&IdentityClient, &str)>,
) -> Result<IdToken> {
    let decoded = verify_compact(token, resolver, options).await?;

    let should_check_revoked = check_revoked || options.tenant_id.is_some();
    if should_check_revoked {
        let (client, access_token) = identity.ok_or_else(|| {
            FirebaseError::code(
                ErrorCode::InternalError,
                "revocation check requested but no identity client/access token supplied",
            )
        })?;
        client
            .check_revoked(
                access_token,
                &RevocationCheck {
                    uid: &decoded.uid,
                    auth_time: decoded.auth_time,
                },
            )
            .await?;
    }

    Ok(decoded)
}

/// `verifyAndRefreshExpiredIdToken` (spec §4.6): verifies `id_token`; on
/// `TOKEN_EXPIRED`, exchanges `refresh_token` for a fresh pair and
/// re-verifies with `check_revoked=false`. Any other verification error
/// propagates unchanged.
pub async fn verify_and_refresh_expired_id_token(
    id_token: &str,
    refresh_token: &str,
    resolver: &dyn KeyResolver,
    options: &VerifyOptions,
    identity: &IdentityClient,
) -> Result<Tokens> {
    match verify_compact(id_token, resolver, options).await {
        Ok(decoded) => Ok(Tokens {
            decoded,
            id_token: id_token.to_string(),
            refresh_token: refresh_token.to_string(),
        }),
        Err(e) if e.error_code() == ErrorCode::TokenExpired => {
            let (new_id_token, new_refresh_token) = identity.exchange_refresh_token(refresh_token).await?;
            let decoded = verify_compact(&new_id_token, resolver, options).await?;
            Ok(Tokens {
                decoded,
                id_token: new_id_token,
                refresh_token: new_refresh_token,
            })
        }
        Err(e) => Err(e),
    }
}

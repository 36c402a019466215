//! # Service-account OAuth2 credential
//!
//! Exchanges a self-signed assertion for a short-lived Google OAuth2
//! access token and caches it with a refresh threshold (spec §4.4).
//! Generalizes the teacher crate's
//! `sessions::service_account::Session::access_token` (which re-signs a
//! long-lived Firestore bearer JWT every 50 minutes) into the spec's
//! actual OAuth2 token-exchange flow with a 5-minute refresh threshold.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::credentials::ServiceAccount;
use crate::errors::{extract_google_api_error, ErrorCode, FirebaseError, Result};
use crate::jwt::{sign_claims, JwtPrivateClaims};

pub const GOOGLE_OAUTH2_TOKEN_URL: &str = "https://accounts.google.com/o/oauth2/token";

/// Fixed OAuth2 scopes requested by the self-signed assertion, per spec §4.4.
const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/firebase.database",
    "https://www.googleapis.com/auth/firebase.messaging",
    "https://www.googleapis.com/auth/identitytoolkit",
    "https://www.googleapis.com/auth/userinfo.email",
];

/// Refresh threshold in milliseconds: 5 minutes, per spec §4.4.
const REFRESH_THRESHOLD_MILLIS: i64 = 5 * 60 * 1000;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at_millis: i64,
}

/// Caches at most one live access token per process (spec §3
/// `AccessTokenCache`). `getToken(force_refresh)` returns the cache if
/// `expiration_time - now > 5 minutes` and not forced; otherwise it
/// refreshes via a new self-signed-assertion exchange.
pub struct OAuth2Credential {
    service_account: ServiceAccount,
    client: reqwest::Client,
    key_pair: Arc<ring::signature::RsaKeyPair>,
    cache: RwLock<Option<CachedToken>>,
}

impl OAuth2Credential {
    pub fn new(service_account: ServiceAccount, client: reqwest::Client) -> Result<Self> {
        let key_pair = Arc::new(service_account.rsa_key_pair()?);
        Ok(OAuth2Credential {
            service_account,
            client,
            key_pair,
            cache: RwLock::new(None),
        })
    }

    /// Returns a live access token, refreshing it if the cached one is
    /// within the 5-minute threshold of expiry, absent, or `force_refresh`
    /// is set.
    pub async fn get_access_token(&self, force_refresh: bool) -> Result<String> {
        let now = Utc::now().timestamp_millis();
        if !force_refresh {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at_millis - now > REFRESH_THRESHOLD_MILLIS {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Re-check under the write lock: another task may have refreshed
        // while we were waiting.
        let now = Utc::now().timestamp_millis();
        if !force_refresh {
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at_millis - now > REFRESH_THRESHOLD_MILLIS {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let token = self.exchange().await?;
        let expires_at_millis = now + token.expires_in * 1000;
        tracing::debug!(expires_in = token.expires_in, "refreshed service-account access token");
        *cache = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at_millis,
        });
        Ok(token.access_token)
    }

    async fn exchange(&self) -> Result<TokenResponse> {
        let assertion = sign_claims(
            self.key_pair.clone(),
            self.service_account.private_key_id.clone(),
            &self.service_account.client_email,
            &self.service_account.client_email,
            GOOGLE_OAUTH2_TOKEN_URL,
            chrono::Duration::hours(1),
            JwtPrivateClaims {
                scope: Some(SCOPES.join(" ")),
                ..Default::default()
            },
        )?;

        let response = self
            .client
            .post(GOOGLE_OAUTH2_TOKEN_URL)
            .timeout(Duration::from_secs(10))
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &assertion),
            ])
            .send()
            .await?;

        let response = extract_google_api_error(response, "oauth2 token exchange").await.map_err(|e| {
            if matches!(e.error_code(), ErrorCode::InvalidCredential) {
                FirebaseError::code(
                    ErrorCode::InvalidCredential,
                    format!(
                        "{} (likely causes: clock skew between this host and Google, or a revoked/rotated service-account key)",
                        e
                    ),
                )
            } else {
                e
            }
        })?;

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_cover_spec_list() {
        assert_eq!(SCOPES.len(), 5);
        assert!(SCOPES.contains(&"https://www.googleapis.com/auth/identitytoolkit"));
    }
}

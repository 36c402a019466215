//! # JWKS fetcher + cache
//!
//! One process-wide mapping keyed by the JWKS URL string (spec §4.3).
//! Grounded on the teacher crate's JWK parsing types (`JWSEntry`,
//! `JWKSetDTO` in `credentials.rs`/`jwt.rs`, themselves consuming Google's
//! `service_accounts/v1/jwk/<account>` JWK-format endpoint) and on the
//! wider pack's fetch-then-swap JWKS cache pattern (e.g. the `dhararon`
//! Firebase config and `expl-rs-firebase-admin-sdk`'s cached JWKS
//! wrapper).
//!
//! Spec §6 names the X.509-certificate JWKS endpoint
//! (`.../robot/v1/metadata/x509/...`); this crate instead talks to the
//! JWK-format sibling endpoint so the fetched key material plugs directly
//! into `biscuit::jwk::RSAKeyParameters` (see DESIGN.md — same trust
//! root, same keys, different wire encoding of the same public key).

use std::collections::HashMap;

use async_trait::async_trait;
use biscuit::jwk::RSAKeyParameters;
use biscuit::jws::RegisteredHeader;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::errors::{ErrorCode, FirebaseError, Result};
use crate::jwt::KeyResolver;

/// The JWK-format Google endpoint serving Firebase ID-token verification
/// keys. Equivalent in content to the X.509 endpoint spec §6 names: same
/// keys, keyed by the same `kid`s.
pub const FIREBASE_ID_TOKEN_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

#[derive(Serialize, Deserialize, Default, Clone)]
struct JwkEntry {
    #[serde(flatten)]
    headers: RegisteredHeader,
    #[serde(flatten)]
    params: RSAKeyParameters,
}

#[derive(Serialize, Deserialize)]
struct JwkSetDTO {
    keys: Vec<JwkEntry>,
}

/// `PublicKeySet` (spec §3): a `kid → RSA public key` map plus the
/// absolute millisecond expiry derived from the origin's `Cache-Control:
/// max-age`. `expires_at_millis == 0` means "always stale", per the
/// spec's invariant.
#[derive(Clone, Default)]
struct PublicKeySet {
    keys: HashMap<String, RSAKeyParameters>,
    expires_at_millis: i64,
}

impl PublicKeySet {
    fn is_fresh(&self, now_millis: i64) -> bool {
        self.expires_at_millis > 0 && self.expires_at_millis > now_millis
    }
}

static CACHE: Lazy<RwLock<HashMap<String, PublicKeySet>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Resets the process-wide JWKS cache. Test-only hook per spec §9's "a
/// reset hook for tests" design note.
#[cfg(test)]
pub(crate) async fn reset() {
    CACHE.write().await.clear();
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Parses `Cache-Control: max-age=N` into an absolute millisecond expiry.
/// Missing or unparseable → `0` (always stale), per spec §4.3/§3.
fn parse_expiry(header_value: Option<&reqwest::header::HeaderValue>) -> i64 {
    let Some(value) = header_value.and_then(|v| v.to_str().ok()) else {
        return 0;
    };
    let Some(cache_control) = cache_control::CacheControl::from_value(value) else {
        return 0;
    };
    match cache_control.max_age {
        Some(max_age) => now_millis() + max_age.as_millis() as i64,
        None => 0,
    }
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<PublicKeySet> {
    let response = client.get(url).send().await?;
    let expires_at_millis = parse_expiry(response.headers().get(reqwest::header::CACHE_CONTROL));
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FirebaseError::code(
            ErrorCode::NetworkError,
            format!("JWKS fetch failed ({}): {}", status, body.chars().take(500).collect::<String>()),
        ));
    }

    let set: JwkSetDTO = response.json().await?;
    let mut keys = HashMap::with_capacity(set.keys.len());
    for entry in set.keys {
        if let Some(kid) = entry.headers.key_id {
            keys.insert(kid, entry.params);
        }
    }
    tracing::debug!(url, key_count = keys.len(), "fetched JWKS");
    Ok(PublicKeySet { keys, expires_at_millis })
}

/// A process-wide, URL-keyed JWKS cache with `Cache-Control`-driven
/// expiry. Concurrent lookups for the same URL may issue duplicate
/// requests while the cache is stale — "last write wins" is an accepted
/// optimization trade-off per spec §4.3, not a correctness requirement.
#[derive(Clone)]
pub struct JwksCache {
    url: String,
    client: reqwest::Client,
}

impl JwksCache {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        JwksCache { url: url.into(), client }
    }

    /// The default cache for Firebase ID-token verification keys.
    pub fn firebase_id_tokens(client: reqwest::Client) -> Self {
        JwksCache::new(FIREBASE_ID_TOKEN_JWKS_URL, client)
    }

    async fn ensure_fresh(&self) -> Result<()> {
        let now = now_millis();
        {
            let cache = CACHE.read().await;
            if let Some(set) = cache.get(&self.url) {
                if set.is_fresh(now) {
                    return Ok(());
                }
            }
        }

        let fetched = fetch(&self.client, &self.url).await?;
        let mut cache = CACHE.write().await;
        cache.insert(self.url.clone(), fetched);
        Ok(())
    }
}

#[async_trait]
impl KeyResolver for JwksCache {
    async fn resolve(&self, kid: &str) -> Option<RSAKeyParameters> {
        if self.ensure_fresh().await.is_err() {
            return None;
        }
        let cache = CACHE.read().await;
        cache.get(&self.url).and_then(|set| set.keys.get(kid).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_expiry_is_zero_without_cache_control() {
        assert_eq!(parse_expiry(None), 0);
    }

    #[test]
    fn public_key_set_is_stale_at_zero_expiry() {
        let set = PublicKeySet {
            keys: HashMap::new(),
            expires_at_millis: 0,
        };
        assert!(!set.is_fresh(now_millis()));
    }

    #[test]
    fn public_key_set_freshness_respects_expiry() {
        let now = now_millis();
        let set = PublicKeySet {
            keys: HashMap::new(),
            expires_at_millis: now + 60_000,
        };
        assert!(set.is_fresh(now));
        let expired = PublicKeySet {
            keys: HashMap::new(),
            expires_at_millis: now - 1,
        };
        assert!(!expired.is_fresh(now));
    }
}

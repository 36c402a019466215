//! # Identity-provider client
//!
//! Speaks the three Identity Toolkit / Secure Token HTTP endpoints spec
//! §4.5 enumerates: custom-token exchange, refresh-token exchange, and
//! the administrative user-lookup (revocation check) and delete calls.
//! Generalizes the teacher crate's `sessions::user::Session::by_user_id`
//! (custom token exchange), `get_new_access_token` (refresh exchange) and
//! `users.rs` (`userinfo`/`userremove`), moved off the old
//! `identitytoolkit/v3/relyingparty` endpoints onto the v1 Identity
//! Toolkit API and made tenant- and emulator-aware.

use serde::{Deserialize, Serialize};

use crate::errors::{extract_google_api_error, ErrorCode, FirebaseError, Result};

/// A verified Firebase ID token's subset relevant to revocation checks.
/// Kept minimal and decoupled from `crate::jwt::verify::IdToken` so this
/// module doesn't depend on the verifier.
pub struct RevocationCheck<'a> {
    pub uid: &'a str,
    pub auth_time: i64,
}

#[derive(Debug, Clone, Default)]
pub struct UserRecord {
    pub local_id: String,
    /// Seconds-since-epoch watermark; tokens with `auth_time` before this
    /// are revoked (spec §4.5/§3 revocation rule).
    pub valid_since: Option<i64>,
    pub disabled: bool,
}

fn identitytoolkit_base(tenant_id: Option<&str>) -> String {
    match tenant_id {
        Some(tenant) => format!("https://identitytoolkit.googleapis.com/v1/projects/{{}}/tenants/{}", tenant),
        None => "https://identitytoolkit.googleapis.com/v1/projects/{}".to_string(),
    }
}

fn securetoken_base() -> &'static str {
    "https://securetoken.googleapis.com/v1/token"
}

/// `disabled` takes `USER_DISABLED`, then `auth_time < valid_since` takes
/// `TOKEN_REVOKED` (spec §3/§4.5). Pulled out of [`IdentityClient::check_revoked`]
/// so the rule itself is exercisable without a network round trip.
fn apply_revocation_rule(user: &UserRecord, auth_time: i64) -> Result<()> {
    if user.disabled {
        return Err(FirebaseError::code(ErrorCode::UserDisabled, "user disabled"));
    }
    if let Some(valid_since) = user.valid_since {
        if auth_time < valid_since {
            return Err(FirebaseError::code(ErrorCode::TokenRevoked, "token issued before validSince"));
        }
    }
    Ok(())
}

/// Rewrites a production URL to point at the Firebase Auth emulator, in
/// the same shape the official Admin SDKs use: `scheme://host/path` →
/// `http://{emulator_host}/host/path`. Only exercised when
/// `FIREBASE_AUTH_EMULATOR_HOST` is configured.
fn emulator_rewrite(url: &str, emulator_host: &str) -> String {
    let without_scheme = url.splitn(2, "://").nth(1).unwrap_or(url);
    format!("http://{}/{}", emulator_host, without_scheme)
}

/// Client for the three endpoints spec §4.5 names, parameterized by
/// project id, optional tenant id, API key, and optional emulator host.
#[derive(Clone)]
pub struct IdentityClient {
    project_id: String,
    tenant_id: Option<String>,
    api_key: String,
    client: reqwest::Client,
    emulator_host: Option<String>,
}

impl IdentityClient {
    pub fn new(project_id: impl Into<String>, api_key: impl Into<String>, client: reqwest::Client) -> Self {
        IdentityClient {
            project_id: project_id.into(),
            tenant_id: None,
            api_key: api_key.into(),
            client,
            emulator_host: std::env::var("FIREBASE_AUTH_EMULATOR_HOST").ok(),
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Whether this client is redirecting to the Firebase Auth emulator.
    pub fn is_emulator(&self) -> bool {
        self.emulator_host.is_some()
    }

    fn resolve(&self, url: &str) -> String {
        match &self.emulator_host {
            Some(host) => emulator_rewrite(url, host),
            None => url.to_string(),
        }
    }

    fn accounts_url(&self, action: &str) -> String {
        let base = identitytoolkit_base(self.tenant_id.as_deref()).replace("{}", &self.project_id);
        let url = format!("{}/accounts:{}?key={}", base, action, self.api_key);
        self.resolve(&url)
    }

    /// `signInWithCustomToken`: exchanges a service-account-signed custom
    /// token for an (ID token, refresh token) pair.
    pub async fn exchange_custom_token(&self, custom_token: &str, app_check_token: Option<&str>) -> Result<(String, String)> {
        #[derive(Serialize)]
        struct Body<'a> {
            token: &'a str,
            #[serde(rename = "returnSecureToken")]
            return_secure_token: bool,
            #[serde(rename = "tenantId", skip_serializing_if = "Option::is_none")]
            tenant_id: Option<&'a str>,
        }
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "idToken")]
            id_token: String,
            #[serde(rename = "refreshToken")]
            refresh_token: String,
        }

        let body = Body {
            token: custom_token,
            return_secure_token: true,
            tenant_id: self.tenant_id.as_deref(),
        };

        let mut request = self.client.post(self.accounts_url("signInWithCustomToken")).json(&body);
        if let Some(app_check_token) = app_check_token {
            request = request.header("X-Firebase-AppCheck", app_check_token);
        }

        let response = request.send().await?;
        let response = extract_google_api_error(response, "signInWithCustomToken").await?;
        let parsed: Response = response.json().await?;
        Ok((parsed.id_token, parsed.refresh_token))
    }

    /// `securetoken/token`: exchanges a refresh token for a new (ID
    /// token, refresh token) pair, mapping upstream error strings to the
    /// taxonomy per spec §4.5.
    pub async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<(String, String)> {
        #[derive(Deserialize)]
        struct Response {
            id_token: String,
            refresh_token: String,
        }

        let url = self.resolve(&format!("{}?key={}", securetoken_base(), self.api_key));
        let response = self
            .client
            .post(url)
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .send()
            .await?;

        let response = extract_google_api_error(response, "refresh token exchange").await?;
        let parsed: Response = response.json().await?;
        Ok((parsed.id_token, parsed.refresh_token))
    }

    /// `accounts:lookup`: resolves a uid to its `validSince`/`disabled`
    /// watermarks. Bearer-authenticated with a §4.4 access token.
    pub async fn lookup_user(&self, access_token: &str, uid: &str) -> Result<UserRecord> {
        #[derive(Serialize)]
        struct Body<'a> {
            #[serde(rename = "localId")]
            local_id: [&'a str; 1],
        }
        #[derive(Deserialize, Default)]
        struct UserDTO {
            #[serde(rename = "localId")]
            local_id: String,
            #[serde(rename = "validSince")]
            valid_since: Option<String>,
            #[serde(default)]
            disabled: bool,
        }
        #[derive(Deserialize, Default)]
        struct Response {
            #[serde(default)]
            users: Vec<UserDTO>,
        }

        let response = self
            .client
            .post(self.accounts_url("lookup"))
            .bearer_auth(access_token)
            .json(&Body { local_id: [uid] })
            .send()
            .await?;

        let response = extract_google_api_error(response, "accounts:lookup").await?;
        let parsed: Response = response.json().await?;
        let user = parsed
            .users
            .into_iter()
            .next()
            .ok_or_else(|| FirebaseError::code(ErrorCode::UserNotFound, "user not found"))?;

        Ok(UserRecord {
            local_id: user.local_id,
            valid_since: user.valid_since.and_then(|s| s.parse().ok()),
            disabled: user.disabled,
        })
    }

    /// Applies the revocation rule from spec §3/§4.5: `disabled` takes
    /// `USER_DISABLED`, then `auth_time < valid_since` takes
    /// `TOKEN_REVOKED`.
    pub async fn check_revoked(&self, access_token: &str, token: &RevocationCheck<'_>) -> Result<()> {
        let user = self.lookup_user(access_token, token.uid).await?;
        apply_revocation_rule(&user, token.auth_time)
    }

    /// `accounts:delete`: administrative helper to remove a user.
    pub async fn delete_user(&self, access_token: &str, uid: &str) -> Result<()> {
        #[derive(Serialize)]
        struct Body<'a> {
            #[serde(rename = "localId")]
            local_id: &'a str,
        }

        let response = self
            .client
            .post(self.accounts_url("delete"))
            .bearer_auth(access_token)
            .json(&Body { local_id: uid })
            .send()
            .await?;

        extract_google_api_error(response, "accounts:delete").await?;
        Ok(())
    }
}

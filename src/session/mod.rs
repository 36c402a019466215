//! # Session middleware
//!
//! The per-request admit/refresh/redirect state machine from spec §4.9,
//! expressed as a pure function from a request abstraction to a
//! [`Transition`]. Generalizes the *pattern* of the teacher crate's
//! `rocket::guard::FirestoreAuthSessionGuard` (request → credential
//! extraction → session construction → guard outcome) away from any
//! specific web framework; the `rocket_support` feature's adapter
//! translates `Transition` into Rocket request outcomes.

use chrono::Duration;

use crate::cookie::{self, CookiePayload};
use crate::cookie::serializer::SerializeOptions;
use crate::credentials::{ServiceAccount, SigningKeyList};
use crate::errors::{ErrorCode, FirebaseError, Result};
use crate::id_token::{verify_and_refresh_expired_id_token, verify_id_token, Tokens};
use crate::identity::IdentityClient;
use crate::jwks::JwksCache;
use crate::jwt::{sign_claims, IdToken, JwtPrivateClaims, VerifyOptions};
use crate::oauth2::OAuth2Credential;

/// `redirectOptions` (spec §6): where and how to redirect unauthenticated
/// requests.
#[derive(Debug, Clone)]
pub struct RedirectOptions {
    pub path: String,
    pub param_name: String,
}

/// A predicate applied to a freshly verified token, beyond revocation
/// (spec §6 `isTokenValid`). Revocation always dominates: this predicate
/// only runs once verification (and any revocation check) has already
/// succeeded.
pub type TokenValidHook = Box<dyn Fn(&IdToken) -> bool + Send + Sync>;

/// All configuration enumerated in spec §6.
pub struct Config {
    pub login_path: String,
    pub logout_path: String,
    pub api_key: String,
    pub cookie_name: String,
    pub cookie_signature_keys: SigningKeyList,
    pub cookie_serialize_options: SerializeOptions,
    pub service_account: ServiceAccount,
    pub tenant_id: Option<String>,
    pub redirect_options: Option<RedirectOptions>,
    pub is_token_valid: Option<TokenValidHook>,
    pub check_revoked: bool,
    pub debug: bool,
}

impl Config {
    fn project_id(&self) -> &str {
        &self.service_account.project_id
    }

    fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id())
    }

    fn verify_options(&self) -> VerifyOptions {
        let mut options = VerifyOptions::new(self.project_id().to_string(), self.issuer());
        options.tenant_id = self.tenant_id.clone();
        options.emulator = std::env::var("FIREBASE_AUTH_EMULATOR_HOST").is_ok();
        options
    }
}

/// Abstracts the inbound HTTP request so this module stays independent of
/// any web framework, per spec's "out of scope: the HTTP request/response
/// framework itself".
pub trait SessionRequest: Send + Sync {
    fn path(&self) -> &str;
    fn bearer_token(&self) -> Option<&str>;
    fn cookie(&self, name: &str) -> Option<&str>;
    fn presented_refresh_token(&self) -> Option<&str>;
    fn app_check_token(&self) -> Option<&str>;
    fn original_url(&self) -> &str;
}

/// The terminal outcome of one request's pass through the state machine.
/// `ADMIT`, `UNAUTHED`, `ERROR` (and the request-scoped `LOGIN`/`LOGOUT`
/// responses) from spec §4.9's diagram.
pub enum Transition {
    /// Login succeeded: emit this `Set-Cookie` and an authenticated response.
    LoginOk { set_cookie: String, tokens: Box<Tokens> },
    /// Login failed: 401.
    LoginFailed(FirebaseError),
    /// Logout: always 200, emit this expired `Set-Cookie`.
    Logout { set_cookie: String },
    /// Request admitted, optionally carrying a refreshed `Set-Cookie`
    /// when `VERIFY` fell through `REFRESH`.
    Admit { tokens: Box<Tokens>, set_cookie: Option<String> },
    /// Unauthenticated terminal state, reason absent when there was
    /// simply no cookie.
    Unauthed(Option<ErrorCode>),
    /// 307 redirect to `location` (only reached from an unauthenticated
    /// state when `redirect_options` is configured).
    Redirect(String),
    /// Server error terminal state.
    Error(FirebaseError),
}

/// Bundles the collaborators the state machine needs beyond `Config`:
/// the JWKS resolver, the OAuth2 credential for administrative calls, and
/// the identity-provider client.
pub struct SessionMiddleware {
    config: Config,
    jwks: JwksCache,
    oauth2: OAuth2Credential,
    identity: IdentityClient,
}

impl SessionMiddleware {
    pub fn new(config: Config, client: reqwest::Client) -> Result<Self> {
        let oauth2 = OAuth2Credential::new(config.service_account.clone(), client.clone())?;
        let mut identity = IdentityClient::new(config.project_id(), &config.api_key, client.clone());
        if let Some(tenant) = &config.tenant_id {
            identity = identity.with_tenant(tenant.clone());
        }
        let jwks = JwksCache::firebase_id_tokens(client);
        Ok(SessionMiddleware { config, jwks, oauth2, identity })
    }

    /// The configured cookie name, so callers (e.g. the `rocket_support`
    /// adapter) know which cookie to extract from the request before
    /// calling [`SessionMiddleware::handle`].
    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    fn apply_is_token_valid(&self, decoded: &IdToken) -> bool {
        match &self.config.is_token_valid {
            Some(hook) => hook(decoded),
            None => true,
        }
    }

    fn redirect_for(&self, original_url: &str) -> Option<String> {
        self.config.redirect_options.as_ref().map(|r| {
            format!(
                "{}?{}={}",
                r.path,
                r.param_name,
                percent_encoding::utf8_percent_encode(original_url, percent_encoding::NON_ALPHANUMERIC)
            )
        })
    }

    /// Entry point: routes the request through START per spec §4.9.
    pub async fn handle(&self, request: &dyn SessionRequest) -> Transition {
        if self.config.debug {
            tracing::debug!(path = request.path(), "session middleware: handling request");
        }

        if request.path() == self.config.login_path {
            return self.handle_login(request).await;
        }
        if request.path() == self.config.logout_path {
            return self.handle_logout();
        }
        self.handle_verify(request).await
    }

    async fn handle_login(&self, request: &dyn SessionRequest) -> Transition {
        let Some(bearer) = request.bearer_token() else {
            return Transition::LoginFailed(FirebaseError::code(ErrorCode::InvalidArgument, "missing Authorization: Bearer header"));
        };

        let options = self.config.verify_options();
        let decoded = match verify_id_token(bearer, &self.jwks, &options, self.config.check_revoked, self.access_token_pair().await.as_ref().map(|(c, t)| (*c, t.as_str()))).await {
            Ok(decoded) => decoded,
            Err(e) => return Transition::LoginFailed(e),
        };

        let (id_token, refresh_token) = match request.presented_refresh_token() {
            Some(refresh_token) => (bearer.to_string(), refresh_token.to_string()),
            None => match self.mint_and_exchange_custom_token(&decoded.uid, request.app_check_token()).await {
                Ok(pair) => pair,
                Err(e) => return Transition::LoginFailed(e),
            },
        };

        let payload = CookiePayload { id_token, refresh_token, custom_token: None };
        let set_cookie = match cookie::sign(&payload, &self.config.cookie_signature_keys) {
            Ok(value) => self.set_cookie_header(&value),
            Err(e) => return Transition::LoginFailed(e),
        };

        Transition::LoginOk {
            set_cookie,
            tokens: Box::new(Tokens {
                decoded,
                id_token: payload.id_token,
                refresh_token: payload.refresh_token,
            }),
        }
    }

    fn handle_logout(&self) -> Transition {
        let expired = cookie::serializer::expired(&self.config.cookie_name, &self.config.cookie_serialize_options);
        Transition::Logout { set_cookie: expired }
    }

    async fn handle_verify(&self, request: &dyn SessionRequest) -> Transition {
        let Some(raw_cookie) = request.cookie(&self.config.cookie_name) else {
            return self.unauthed_or_redirect(request, None);
        };

        let payload = match cookie::verify(raw_cookie, &self.config.cookie_signature_keys) {
            Ok(payload) => payload,
            Err(_) => return self.unauthed_or_redirect(request, Some(ErrorCode::InvalidSignature)),
        };

        let options = self.config.verify_options();
        let access_token_pair = self.access_token_pair().await;
        let resolved = verify_id_token(
            &payload.id_token,
            &self.jwks,
            &options,
            self.config.check_revoked,
            access_token_pair.as_ref().map(|(c, t)| (*c, t.as_str())),
        )
        .await;

        match resolved {
            Ok(decoded) => {
                if !self.apply_is_token_valid(&decoded) {
                    return self.unauthed_or_redirect(request, Some(ErrorCode::InvalidCredential));
                }
                Transition::Admit {
                    tokens: Box::new(Tokens { decoded, id_token: payload.id_token, refresh_token: payload.refresh_token }),
                    set_cookie: None,
                }
            }
            Err(e) if e.error_code() == ErrorCode::TokenExpired => {
                self.handle_refresh(request, &payload.id_token, &payload.refresh_token, &options).await
            }
            Err(e) if matches!(e.error_code(), ErrorCode::UserNotFound | ErrorCode::UserDisabled | ErrorCode::TokenRevoked) => {
                self.unauthed_or_redirect(request, Some(e.error_code()))
            }
            Err(e) if matches!(e.error_code(), ErrorCode::InvalidSignature | ErrorCode::NoMatchingKid) => {
                self.unauthed_or_redirect(request, Some(e.error_code()))
            }
            Err(e) => Transition::Error(e),
        }
    }

    async fn handle_refresh(
        &self,
        request: &dyn SessionRequest,
        expired_id_token: &str,
        refresh_token: &str,
        options: &VerifyOptions,
    ) -> Transition {
        match verify_and_refresh_expired_id_token(expired_id_token, refresh_token, &self.jwks, options, &self.identity).await {
            Ok(tokens) => {
                let payload = CookiePayload {
                    id_token: tokens.id_token.clone(),
                    refresh_token: tokens.refresh_token.clone(),
                    custom_token: None,
                };
                match cookie::sign(&payload, &self.config.cookie_signature_keys) {
                    Ok(value) => Transition::Admit {
                        tokens: Box::new(tokens),
                        set_cookie: Some(self.set_cookie_header(&value)),
                    },
                    Err(e) => Transition::Error(e),
                }
            }
            Err(e) if e.error_code() == ErrorCode::UserNotFound => self.unauthed_or_redirect(request, Some(ErrorCode::UserNotFound)),
            Err(e) => Transition::Error(e),
        }
    }

    fn unauthed_or_redirect(&self, request: &dyn SessionRequest, reason: Option<ErrorCode>) -> Transition {
        match self.redirect_for(request.original_url()) {
            Some(location) => Transition::Redirect(location),
            None => Transition::Unauthed(reason),
        }
    }

    fn set_cookie_header(&self, value: &str) -> String {
        cookie::serializer::serialize(&self.config.cookie_name, value, &self.config.cookie_serialize_options)
    }

    async fn access_token_pair(&self) -> Option<(&IdentityClient, String)> {
        if !self.config.check_revoked && self.config.tenant_id.is_none() {
            return None;
        }
        match self.oauth2.get_access_token(false).await {
            Ok(token) => Some((&self.identity, token)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to obtain access token for revocation check");
                None
            }
        }
    }

    async fn mint_and_exchange_custom_token(&self, uid: &str, app_check_token: Option<&str>) -> Result<(String, String)> {
        let key_pair = std::sync::Arc::new(self.config.service_account.rsa_key_pair()?);
        let custom_token = sign_claims(
            key_pair,
            self.config.service_account.private_key_id.clone(),
            &self.config.service_account.client_email,
            &self.config.service_account.client_email,
            "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit",
            Duration::hours(1),
            JwtPrivateClaims { uid: Some(uid.to_string()), ..Default::default() },
        )?;
        self.identity.exchange_custom_token(&custom_token, app_check_token).await
    }
}

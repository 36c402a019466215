//! # Process configuration loading
//!
//! Assembles a [`crate::session::Config`] the way the teacher's
//! `Credentials::from_file`/`FromStr` load configuration: `from_file`,
//! `from_env`, or direct construction. Never a templating/config-file
//! format — that's explicitly out of scope.

use std::env;
use std::fs::File;
use std::io::Read as _;

use serde::Deserialize;

use crate::cookie::serializer::{SameSite, SerializeOptions};
use crate::credentials::{ServiceAccount, SigningKeyList};
use crate::errors::{ErrorCode, FirebaseError, Result};
use crate::session::{Config, RedirectOptions};

/// On-disk shape for a [`Config`], minus the runtime-only hooks
/// (`is_token_valid`) which aren't serializable data and default to
/// unset.
#[derive(Deserialize)]
struct ConfigFile {
    login_path: String,
    logout_path: String,
    api_key: String,
    cookie_name: String,
    cookie_signature_keys: Vec<String>,
    cookie_path: Option<String>,
    cookie_domain: Option<String>,
    cookie_http_only: Option<bool>,
    cookie_secure: Option<bool>,
    cookie_same_site: Option<String>,
    cookie_max_age: Option<i64>,
    service_account_path: String,
    tenant_id: Option<String>,
    redirect_path: Option<String>,
    redirect_param_name: Option<String>,
    check_revoked: Option<bool>,
    debug: Option<bool>,
}

fn parse_same_site(s: &str) -> Result<SameSite> {
    match s {
        "Strict" => Ok(SameSite::Strict),
        "Lax" => Ok(SameSite::Lax),
        "None" => Ok(SameSite::None),
        other => Err(FirebaseError::code(ErrorCode::InvalidArgument, format!("unknown SameSite value: {}", other))),
    }
}

fn build_config(
    login_path: String,
    logout_path: String,
    api_key: String,
    cookie_name: String,
    cookie_signature_keys: Vec<String>,
    cookie_path: Option<String>,
    cookie_domain: Option<String>,
    cookie_http_only: Option<bool>,
    cookie_secure: Option<bool>,
    cookie_same_site: Option<String>,
    cookie_max_age: Option<i64>,
    service_account: ServiceAccount,
    tenant_id: Option<String>,
    redirect_path: Option<String>,
    redirect_param_name: Option<String>,
    check_revoked: Option<bool>,
    debug: Option<bool>,
) -> Result<Config> {
    let cookie_signature_keys = SigningKeyList::new(cookie_signature_keys)?;
    let same_site = match cookie_same_site {
        Some(s) => parse_same_site(&s)?,
        None => SameSite::Lax,
    };
    let redirect_options = match (redirect_path, redirect_param_name) {
        (Some(path), Some(param_name)) => Some(RedirectOptions { path, param_name }),
        _ => None,
    };

    Ok(Config {
        login_path,
        logout_path,
        api_key,
        cookie_name,
        cookie_signature_keys,
        cookie_serialize_options: SerializeOptions {
            path: cookie_path.unwrap_or_else(|| "/".to_string()),
            domain: cookie_domain,
            http_only: cookie_http_only.unwrap_or(true),
            secure: cookie_secure.unwrap_or(true),
            same_site,
            max_age: cookie_max_age,
        },
        service_account,
        tenant_id,
        redirect_options,
        is_token_valid: None,
        check_revoked: check_revoked.unwrap_or(false),
        debug: debug.unwrap_or(false),
    })
}

/// Loads a [`Config`] from a JSON file at `path`, mirroring the teacher's
/// `Credentials::from_file`. The referenced `service_account_path` is
/// loaded separately via [`ServiceAccount::from_file`].
pub fn from_file(path: &str) -> Result<Config> {
    let mut f = File::open(path)?;
    let mut buffer = String::new();
    f.read_to_string(&mut buffer)?;
    let parsed: ConfigFile = serde_json::from_str(&buffer)?;
    let service_account = ServiceAccount::from_file(&parsed.service_account_path)?;

    build_config(
        parsed.login_path,
        parsed.logout_path,
        parsed.api_key,
        parsed.cookie_name,
        parsed.cookie_signature_keys,
        parsed.cookie_path,
        parsed.cookie_domain,
        parsed.cookie_http_only,
        parsed.cookie_secure,
        parsed.cookie_same_site,
        parsed.cookie_max_age,
        service_account,
        parsed.tenant_id,
        parsed.redirect_path,
        parsed.redirect_param_name,
        parsed.check_revoked,
        parsed.debug,
    )
}

fn required_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| FirebaseError::code(ErrorCode::InvalidArgument, format!("missing environment variable {}", name)))
}

/// Loads a [`Config`] entirely from environment variables: this crate's
/// own configuration surface, extending the pattern spec §6 names for
/// `FIREBASE_AUTH_EMULATOR_HOST`.
pub fn from_env() -> Result<Config> {
    let cookie_signature_keys: Vec<String> = required_env("FIREBASE_SESSION_COOKIE_SIGNATURE_KEYS")?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let service_account = ServiceAccount::from_file(&required_env("FIREBASE_SESSION_SERVICE_ACCOUNT_PATH")?)?;

    build_config(
        required_env("FIREBASE_SESSION_LOGIN_PATH")?,
        required_env("FIREBASE_SESSION_LOGOUT_PATH")?,
        required_env("FIREBASE_SESSION_API_KEY")?,
        required_env("FIREBASE_SESSION_COOKIE_NAME")?,
        cookie_signature_keys,
        env::var("FIREBASE_SESSION_COOKIE_PATH").ok(),
        env::var("FIREBASE_SESSION_COOKIE_DOMAIN").ok(),
        env::var("FIREBASE_SESSION_COOKIE_HTTP_ONLY").ok().and_then(|v| v.parse().ok()),
        env::var("FIREBASE_SESSION_COOKIE_SECURE").ok().and_then(|v| v.parse().ok()),
        env::var("FIREBASE_SESSION_COOKIE_SAME_SITE").ok(),
        env::var("FIREBASE_SESSION_COOKIE_MAX_AGE").ok().and_then(|v| v.parse().ok()),
        service_account,
        env::var("FIREBASE_SESSION_TENANT_ID").ok(),
        env::var("FIREBASE_SESSION_REDIRECT_PATH").ok(),
        env::var("FIREBASE_SESSION_REDIRECT_PARAM_NAME").ok(),
        env::var("FIREBASE_SESSION_CHECK_REVOKED").ok().and_then(|v| v.parse().ok()),
        env::var("FIREBASE_SESSION_DEBUG").ok().and_then(|v| v.parse().ok()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_same_site_rejects_unknown_values() {
        assert!(parse_same_site("Loose").is_err());
        assert!(parse_same_site("Strict").is_ok());
    }
}

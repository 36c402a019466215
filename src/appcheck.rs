//! # AppCheck signer
//!
//! Mints the short-lived, service-signed AppCheck assertion token named in
//! spec §2's component table and carried by the `X-Firebase-AppCheck`
//! header (§6). Reuses [`crate::jwt::sign`] exactly as
//! `oauth2::exchange` reuses it for the OAuth2 assertion, just with the
//! AppCheck mint endpoint as audience and no scopes.

use std::sync::Arc;

use chrono::Duration;

use crate::credentials::ServiceAccount;
use crate::errors::Result;
use crate::jwt::{sign_claims, JwtPrivateClaims};

/// One hour, matching the identity-provider's own ID-token lifetime
/// (spec GLOSSARY: "short-lived (1h)").
fn app_check_token_lifetime() -> Duration {
    Duration::hours(1)
}

fn exchange_url(project_id: &str, app_id: &str) -> String {
    format!(
        "https://firebaseappcheck.googleapis.com/v1/projects/{}/apps/{}:exchangeCustomToken",
        project_id, app_id
    )
}

/// Mints a custom AppCheck token, signed by the service account, scoped
/// to `app_id` under `service_account.project_id`. The caller exchanges
/// this at the AppCheck mint endpoint for the final attestation token
/// clients attach as `X-Firebase-AppCheck`.
pub fn mint_custom_token(service_account: &ServiceAccount, app_id: &str) -> Result<String> {
    let key_pair = Arc::new(service_account.rsa_key_pair()?);
    let audience = exchange_url(&service_account.project_id, app_id);
    sign_claims(
        key_pair,
        service_account.private_key_id.clone(),
        &service_account.client_email,
        &service_account.client_email,
        &audience,
        app_check_token_lifetime(),
        JwtPrivateClaims::default(),
    )
}

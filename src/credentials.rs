//! # Service account and signing-key configuration
//!
//! Process-scoped, immutable configuration: the Firebase service account
//! used to sign custom tokens and OAuth2 assertions, and the rotating
//! HMAC signing-key list used to authenticate session cookies. Grounded on
//! the teacher crate's `Credentials` (PEM → DER extraction, `from_file`,
//! `FromStr`), generalized to this spec's non-Firestore fields.

use std::fs::File;
use std::io::Read as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::base64url;
use crate::errors::{ErrorCode, FirebaseError, Result};

/// A Firebase/Google service account, as downloaded from the Cloud Console
/// ("Generate new private key" on a service account). Immutable once
/// constructed; the DER-encoded private key is derived once from the PEM
/// at load time.
#[derive(Serialize, Deserialize, Clone)]
pub struct ServiceAccount {
    pub project_id: String,
    pub client_email: String,
    private_key: String,
    #[serde(skip)]
    private_key_der: Vec<u8>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
}

impl ServiceAccount {
    /// Loads and parses a service-account JSON key file, exactly as
    /// downloaded from the Google Cloud console.
    pub fn from_file(path: &str) -> Result<Self> {
        let mut f = File::open(path)?;
        let mut buffer = Vec::new();
        f.read_to_end(&mut buffer)?;
        let mut sa: ServiceAccount = serde_json::from_slice(&buffer)?;
        sa.private_key_der = base64url::pem_to_der(&sa.private_key)?;
        Ok(sa)
    }

    /// The RSA private key, DER-encoded (PKCS#8), ready for
    /// `ring::signature::RsaKeyPair::from_pkcs8`.
    pub fn private_key_der(&self) -> &[u8] {
        &self.private_key_der
    }

    /// Builds the `ring` RSA key pair used by [`crate::jwt::sign`]. Fails
    /// with `FirebaseError::RSA` when the stored key isn't valid PKCS#8.
    pub fn rsa_key_pair(&self) -> Result<ring::signature::RsaKeyPair> {
        Ok(ring::signature::RsaKeyPair::from_pkcs8(&self.private_key_der)?)
    }
}

impl FromStr for ServiceAccount {
    type Err = FirebaseError;
    fn from_str(s: &str) -> Result<Self> {
        let mut sa: ServiceAccount = serde_json::from_str(s)?;
        sa.private_key_der = base64url::pem_to_der(&sa.private_key)?;
        Ok(sa)
    }
}

/// Ordered, non-empty list of HMAC secret keys used to sign and verify
/// session cookies (spec §3 `SigningKeyList`). The head is the current
/// signing key; the remainder is the acceptance window for in-flight
/// cookies signed under a key that has since rotated out of the head
/// position. Removing a key from the tail immediately invalidates cookies
/// signed under it.
#[derive(Clone)]
pub struct SigningKeyList(Vec<String>);

impl SigningKeyList {
    /// Fails if `keys` is empty: spec §3 requires a non-empty sequence.
    pub fn new(keys: Vec<String>) -> Result<Self> {
        if keys.is_empty() {
            return Err(FirebaseError::code(
                ErrorCode::InvalidArgument,
                "cookieSignatureKeys must not be empty",
            ));
        }
        Ok(SigningKeyList(keys))
    }

    /// The current signing key: every new cookie is signed under this key.
    pub fn signing_key(&self) -> &str {
        &self.0[0]
    }

    /// All keys in the acceptance window, current key first.
    pub fn verification_keys(&self) -> &[String] {
        &self.0
    }

    /// Prepends a new signing key, making it the new head. The previous
    /// head remains in the acceptance window until explicitly dropped.
    pub fn rotate(&mut self, new_key: String) {
        self.0.insert(0, new_key);
    }
}

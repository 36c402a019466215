//! # JSON Web Token signing and verification
//!
//! This module contains the two halves of spec §4.1/§4.2: composing an
//! RS256-signed compact JWS from a service-account private key, and
//! verifying one against a `kid`-addressed key resolver. Grounded on the
//! teacher crate's `jwt.rs` (`create_jwt`, `verify_access_token`),
//! generalized away from the Firestore-specific audience constants and
//! the single hard-coded claims shape.

mod sign;
mod verify;

pub use sign::{sign_claims, JwtPrivateClaims};
pub use verify::{verify_compact, FirebaseTenantInfo, IdToken, IdTokenClaims, KeyResolver, VerifyOptions};

use biscuit::{Empty, JWT};

/// The concrete JWT type used for service-account-minted tokens (OAuth2
/// assertions, custom tokens, AppCheck tokens): RS256-signed, with the
/// crate's shared private-claims shape.
pub(crate) type SignedJWT = JWT<JwtPrivateClaims, Empty>;

/// The concrete JWT type used for Firebase ID tokens received from
/// clients: RS256-signed by Google, verified against the Secure Token
/// JWKS.
pub(crate) type IdTokenJWT = JWT<IdTokenClaims, Empty>;

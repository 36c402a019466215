//! # Error and Result Type

use std::error;
use std::fmt;

use reqwest;

/// A result type that uses [`FirebaseError`] as an error type
pub type Result<T> = std::result::Result<T, FirebaseError>;

/// Stable error identifiers surfaced in error payloads (spec §7). Kept
/// separate from [`FirebaseError`] so the session middleware and callers
/// can match on a closed, `Copy` enum instead of downcasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UserNotFound,
    UserDisabled,
    InvalidCredential,
    TokenExpired,
    TokenRevoked,
    InvalidSignature,
    NoKidInHeader,
    NoMatchingKid,
    InvalidArgument,
    NetworkError,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::UserDisabled => "USER_DISABLED",
            ErrorCode::InvalidCredential => "INVALID_CREDENTIAL",
            ErrorCode::TokenExpired => "TOKEN_EXPIRED",
            ErrorCode::TokenRevoked => "TOKEN_REVOKED",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::NoKidInHeader => "NO_KID_IN_HEADER",
            ErrorCode::NoMatchingKid => "NO_MATCHING_KID",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(s)
    }
}

/// The main error type used throughout this crate. It wraps / converts from a few other error
/// types and implements [error::Error] so that you can use it in any situation where the
/// standard error type is expected.
#[derive(Debug)]
pub enum FirebaseError {
    /// One of the stable taxonomy errors from spec §7.
    Code(ErrorCode, String),
    Generic(&'static str),
    UnexpectedResponse(&'static str, reqwest::StatusCode, String),
    Request(reqwest::Error),
    JWT(biscuit::errors::Error),
    Ser(serde_json::Error),
    RSA(ring::error::KeyRejected),
    Unspecified(ring::error::Unspecified),
    IO(std::io::Error),
}

impl FirebaseError {
    pub fn code(code: ErrorCode, message: impl Into<String>) -> Self {
        FirebaseError::Code(code, message.into())
    }

    /// The stable error code for this error. Network/serialization
    /// failures that didn't originate from an explicit taxonomy decision
    /// map conservatively to `NetworkError` / `InternalError`, matching
    /// spec §7's "unparseable responses surface INTERNAL_ERROR" rule.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            FirebaseError::Code(code, _) => *code,
            FirebaseError::Request(e) if e.is_timeout() || e.is_connect() => ErrorCode::NetworkError,
            FirebaseError::Request(_) => ErrorCode::InternalError,
            FirebaseError::JWT(_) => ErrorCode::InvalidSignature,
            FirebaseError::RSA(_) | FirebaseError::Unspecified(_) => ErrorCode::InternalError,
            FirebaseError::Generic(_)
            | FirebaseError::UnexpectedResponse(..)
            | FirebaseError::Ser(_)
            | FirebaseError::IO(_) => ErrorCode::InternalError,
        }
    }

    /// `USER_NOT_FOUND` is first-class: callers need a direct predicate to
    /// detect it without matching on the full error shape, since it may be
    /// benign during legitimate account deletion (spec §7).
    pub fn is_user_not_found(&self) -> bool {
        self.error_code() == ErrorCode::UserNotFound
    }
}

impl std::convert::From<std::io::Error> for FirebaseError {
    fn from(error: std::io::Error) -> Self {
        FirebaseError::IO(error)
    }
}

impl std::convert::From<ring::error::KeyRejected> for FirebaseError {
    fn from(error: ring::error::KeyRejected) -> Self {
        FirebaseError::RSA(error)
    }
}

impl std::convert::From<ring::error::Unspecified> for FirebaseError {
    fn from(error: ring::error::Unspecified) -> Self {
        FirebaseError::Unspecified(error)
    }
}

impl std::convert::From<serde_json::Error> for FirebaseError {
    fn from(error: serde_json::Error) -> Self {
        FirebaseError::Ser(error)
    }
}

impl std::convert::From<biscuit::errors::Error> for FirebaseError {
    fn from(error: biscuit::errors::Error) -> Self {
        FirebaseError::JWT(error)
    }
}

impl std::convert::From<reqwest::Error> for FirebaseError {
    fn from(error: reqwest::Error) -> Self {
        FirebaseError::Request(error)
    }
}

impl fmt::Display for FirebaseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FirebaseError::Code(code, message) => write!(f, "{}: {}", code, message),
            FirebaseError::Generic(m) => write!(f, "{}", m),
            FirebaseError::UnexpectedResponse(m, status, text) => {
                writeln!(f, "{} - {}", m, status)?;
                writeln!(f, "{}", text)
            }
            FirebaseError::Request(e) => e.fmt(f),
            FirebaseError::JWT(e) => e.fmt(f),
            FirebaseError::RSA(e) => e.fmt(f),
            FirebaseError::Unspecified(e) => e.fmt(f),
            FirebaseError::IO(e) => e.fmt(f),
            FirebaseError::Ser(e) => e.fmt(f),
        }
    }
}

impl error::Error for FirebaseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            FirebaseError::Code(..) => None,
            FirebaseError::Generic(_) => None,
            FirebaseError::UnexpectedResponse(..) => None,
            FirebaseError::Request(e) => Some(e),
            FirebaseError::JWT(e) => Some(e),
            FirebaseError::RSA(_) => None,
            FirebaseError::Unspecified(_) => None,
            FirebaseError::IO(e) => Some(e),
            FirebaseError::Ser(e) => Some(e),
        }
    }
}

/// The `{code, message}` JSON payload spec §6 requires for failed
/// `<loginPath>` responses.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&FirebaseError> for ErrorPayload {
    fn from(error: &FirebaseError) -> Self {
        ErrorPayload {
            code: error.error_code(),
            message: error.to_string(),
        }
    }
}

/// Extracts a Google API `{error: {message}}` envelope from a non-2xx
/// response, mapping known upstream error strings to the taxonomy per spec
/// §4.5. Unparseable bodies surface `INTERNAL_ERROR` carrying the HTTP
/// status, per spec §7.
pub(crate) async fn extract_google_api_error(
    response: reqwest::Response,
    context: &'static str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str(&body);
    let message = parsed.ok().and_then(|v| {
        v.get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(|s| s.to_owned())
    });

    match message.as_deref() {
        Some("USER_NOT_FOUND") => Err(FirebaseError::code(ErrorCode::UserNotFound, "user not found")),
        Some("USER_DISABLED") => Err(FirebaseError::code(ErrorCode::UserDisabled, "user disabled")),
        Some(m) if m.starts_with("TOKEN_EXPIRED") => Err(FirebaseError::code(ErrorCode::TokenExpired, m.to_owned())),
        Some(m) => Err(FirebaseError::code(ErrorCode::InvalidCredential, m.to_owned())),
        None => Err(FirebaseError::UnexpectedResponse(context, status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_display_matches_taxonomy() {
        assert_eq!(ErrorCode::NoMatchingKid.to_string(), "NO_MATCHING_KID");
        assert_eq!(ErrorCode::TokenRevoked.to_string(), "TOKEN_REVOKED");
    }

    #[test]
    fn is_user_not_found_only_true_for_that_code() {
        let e = FirebaseError::code(ErrorCode::UserNotFound, "gone");
        assert!(e.is_user_not_found());
        let e = FirebaseError::code(ErrorCode::UserDisabled, "disabled");
        assert!(!e.is_user_not_found());
    }
}

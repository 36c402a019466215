//! # Cookie serializer
//!
//! Composes `Set-Cookie` values in the fixed attribute order spec §4.8
//! requires. New module; the teacher crate never issues HTTP cookies of
//! its own, so this is built directly from the spec's attribute-order
//! rules rather than generalized from teacher code. Incoming `Cookie`
//! headers are already parsed into individual name/value pairs by the
//! hosting framework (see `SessionRequest::cookie` implementations), so
//! this module has no reverse-parsing counterpart.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        };
        f.write_str(s)
    }
}

/// `cookieSerializeOptions` (spec §6): the fixed, non-value attributes of
/// a cookie. `max_age` is in seconds.
#[derive(Debug, Clone)]
pub struct SerializeOptions {
    pub path: String,
    pub domain: Option<String>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub max_age: Option<i64>,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        SerializeOptions {
            path: "/".to_string(),
            domain: None,
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
            max_age: None,
        }
    }
}

/// Composes a `Set-Cookie` value in the fixed attribute order spec §4.8
/// requires: `Name=Value; Max-Age=…; Domain=…; Path=…; Expires=…;
/// HttpOnly; Secure; SameSite=…`, each present only when set.
pub fn serialize(name: &str, value: &str, options: &SerializeOptions) -> String {
    let mut out = format!("{}={}", name, value);

    if let Some(max_age) = options.max_age {
        out.push_str(&format!("; Max-Age={}", max_age));
    }
    if let Some(domain) = &options.domain {
        out.push_str(&format!("; Domain={}", domain));
    }
    out.push_str(&format!("; Path={}", options.path));
    if options.http_only {
        out.push_str("; HttpOnly");
    }
    if options.secure {
        out.push_str("; Secure");
    }
    out.push_str(&format!("; SameSite={}", options.same_site));

    out
}

/// Emits the expired cookie spec §4.8 requires for logout: empty value,
/// `Max-Age=0`, epoch `Expires`, keeping only the configured `Path` and
/// `Domain`.
pub fn expired(name: &str, options: &SerializeOptions) -> String {
    let mut out = format!("{}=", name);
    out.push_str("; Max-Age=0");
    if let Some(domain) = &options.domain {
        out.push_str(&format!("; Domain={}", domain));
    }
    out.push_str(&format!("; Path={}", options.path));
    out.push_str("; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
    out
}

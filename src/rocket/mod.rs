//! # Rocket adapter
//!
//! Because [`crate::session::SessionMiddleware`] is already a pure
//! request → [`crate::session::Transition`] function, turning it into a
//! Rocket 0.5 request guard is a thin translation layer, the same role
//! the teacher crate's `FirestoreAuthSessionGuard` played for its own
//! `sessions::user::Session`. Enabled by the optional `rocket_support`
//! feature; not part of the core's dependency surface otherwise.
//!
//! Example:
//!
//! ```ignore
//! use firebase_session_auth::rocket::SessionGuard;
//! use firebase_session_auth::SessionMiddleware;
//!
//! #[rocket::get("/profile")]
//! fn profile(session: SessionGuard) -> String {
//!     match session.0 {
//!         firebase_session_auth::Transition::Admit { tokens, .. } => {
//!             format!("hello, {}", tokens.decoded.uid)
//!         }
//!         _ => "not logged in".to_string(),
//!     }
//! }
//! ```

mod guard;

pub use guard::SessionGuard;

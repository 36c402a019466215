use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::response::{self, Responder, Response};
use rocket::State;

use crate::errors::{ErrorCode, ErrorPayload, FirebaseError};
use crate::session::{SessionMiddleware, SessionRequest, Transition};

/// Extracted, owned copy of the request data
/// [`crate::session::SessionMiddleware::handle`] needs, since
/// `rocket::Request` doesn't hand out `&str`s with a lifetime this
/// trait's object-safe signature can borrow from directly.
struct ExtractedRequest {
    path: String,
    bearer_token: Option<String>,
    cookie_name: String,
    cookie_value: Option<String>,
    presented_refresh_token: Option<String>,
    app_check_token: Option<String>,
    original_url: String,
}

impl SessionRequest for ExtractedRequest {
    fn path(&self) -> &str {
        &self.path
    }

    fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    fn cookie(&self, name: &str) -> Option<&str> {
        if name == self.cookie_name {
            self.cookie_value.as_deref()
        } else {
            None
        }
    }

    fn presented_refresh_token(&self) -> Option<&str> {
        self.presented_refresh_token.as_deref()
    }

    fn app_check_token(&self) -> Option<&str> {
        self.app_check_token.as_deref()
    }

    fn original_url(&self) -> &str {
        &self.original_url
    }
}

/// A Rocket request guard wrapping the [`Transition`] the session
/// middleware reached for this request. Pair with a
/// [`Responder`] impl, or match on it directly in a route handler.
pub struct SessionGuard(pub Transition);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionGuard {
    type Error = FirebaseError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let middleware = match request.guard::<&State<SessionMiddleware>>().await {
            Outcome::Success(middleware) => middleware,
            _ => {
                return Outcome::Failure((
                    Status::InternalServerError,
                    FirebaseError::code(ErrorCode::InternalError, "SessionMiddleware is not managed state"),
                ))
            }
        };

        let cookie_name = middleware.cookie_name().to_string();
        let bearer_token = request
            .headers()
            .get_one("Authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|s| s.to_string());
        let cookie_value = request.cookies().get(&cookie_name).map(|c| c.value().to_string());
        let presented_refresh_token = request.headers().get_one("X-Refresh-Token").map(|s| s.to_string());
        let app_check_token = request.headers().get_one("X-Firebase-AppCheck").map(|s| s.to_string());

        let extracted = ExtractedRequest {
            path: request.uri().path().to_string(),
            bearer_token,
            cookie_name,
            cookie_value,
            presented_refresh_token,
            app_check_token,
            original_url: request.uri().to_string(),
        };

        let transition = middleware.handle(&extracted).await;
        Outcome::Success(SessionGuard(transition))
    }
}

/// Renders the terminal [`Transition`] as a Rocket response: `Set-Cookie`
/// on login/refresh/logout, 401 with the `{code, message}` error payload
/// on login failure or a server error, 307 on redirect, 200 otherwise.
impl<'r> Responder<'r, 'static> for SessionGuard {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        match self.0 {
            Transition::LoginOk { set_cookie, .. } => Response::build().raw_header("Set-Cookie", set_cookie).status(Status::Ok).ok(),
            Transition::LoginFailed(error) => {
                let payload = ErrorPayload::from(&error);
                let body = serde_json::to_string(&payload).unwrap_or_default();
                body.respond_to(request).map(|mut r| {
                    r.set_status(Status::Unauthorized);
                    r
                })
            }
            Transition::Logout { set_cookie } => Response::build().raw_header("Set-Cookie", set_cookie).status(Status::Ok).ok(),
            Transition::Admit { set_cookie: Some(set_cookie), .. } => {
                Response::build().raw_header("Set-Cookie", set_cookie).status(Status::Ok).ok()
            }
            Transition::Admit { set_cookie: None, .. } => Response::build().status(Status::Ok).ok(),
            Transition::Unauthed(_) => Response::build().status(Status::Unauthorized).ok(),
            Transition::Redirect(location) => Response::build().raw_header("Location", location).status(Status::TemporaryRedirect).ok(),
            Transition::Error(error) => {
                let payload = ErrorPayload::from(&error);
                let body = serde_json::to_string(&payload).unwrap_or_default();
                body.respond_to(request).map(|mut r| {
                    r.set_status(Status::InternalServerError);
                    r
                })
            }
        }
    }
}

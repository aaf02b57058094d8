pub mod token;

use std::{future::Future, pin::Pin};

use actix_web::{
    cookie::{Cookie, SameSite},
    dev::Payload,
    http::header::Header,
    web::Data,
    FromRequest, HttpRequest,
};
use actix_web_httpauth::headers::authorization::{Authorization, Bearer};

use crate::{
    app::{AppError, AppState},
    database::models::user::{SanitizedUser, User},
};
use token::Token;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Pulls the access token from the `accessToken` cookie, falling back to an
/// `Authorization: Bearer` header.
pub fn extract_token(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(ACCESS_COOKIE) {
        return Some(cookie.value().to_string());
    }

    Authorization::<Bearer>::parse(req)
        .ok()
        .map(|auth| auth.into_scheme().token().to_string())
}

/// Builds a session cookie: http-only, secure, cross-site capable, so the
/// browser client on another origin can send it back.
pub fn auth_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .finish()
}

pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = auth_cookie(name, String::new());
    cookie.make_removal();
    cookie
}

/// The authenticated principal, resolved per-route by taking this extractor
/// as a handler argument. Routes without it stay public.
///
/// Rejects with 401 when the token is missing, fails signature/expiry
/// verification, or references a user that no longer exists. On success the
/// handler receives the sanitized user record.
pub struct AuthedUser(pub SanitizedUser);

impl FromRequest for AuthedUser {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<AuthedUser, AppError>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();

        Box::pin(async move {
            let app_state = req
                .app_data::<Data<AppState>>()
                .ok_or_else(|| AppError::internal("Application state missing"))?;

            let token =
                extract_token(&req).ok_or_else(|| AppError::unauthorized("Unauthorized request"))?;
            let claims = Token::verify_access(&app_state.config, &token)?;

            let conn = app_state.db()?;
            let user = User::find_by_id(&conn, &claims.sub)?
                .ok_or_else(|| AppError::unauthorized("Invalid or expired token"))?;

            Ok(AuthedUser(SanitizedUser::from_user(&conn, &user)?))
        })
    }
}

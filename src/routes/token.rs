use actix_web::{http::StatusCode, post, web::Data, HttpRequest, HttpResponse};
use serde_json::{json, Value};

use crate::{
    app::{send_response, AppError, AppState},
    auth::{auth_cookie, removal_cookie, token::Token, AuthedUser, ACCESS_COOKIE, REFRESH_COOKIE},
    database::models::user::User,
};

/// Token rotation. The refresh token comes from the `refreshToken` cookie or
/// a json body; it must verify AND match the copy persisted on the user row,
/// so a stolen-but-rotated-away token is useless.
/// - url: `{domain}/api/v1/auth/refresh-token`
///
/// # Response
/// ## Ok
/// - fresh access/refresh pair, also set as cookies; the stored refresh
///   token is replaced
/// ## Error
/// - 401 when the token is missing, invalid, expired or superseded
#[post("/auth/refresh-token")]
pub async fn refresh_token(
    req: HttpRequest,
    req_body: String,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let incoming = req
        .cookie(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            serde_json::from_str::<Value>(req_body.trim())
                .ok()
                .and_then(|body| {
                    body.get("refreshToken")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
        })
        .ok_or_else(|| AppError::unauthorized("Unauthorized request"))?;

    let claims = Token::verify_refresh(&app_state.config, &incoming)
        .map_err(|_| AppError::unauthorized("Invalid refresh token"))?;

    let conn = app_state.db()?;

    let user = User::find_by_id(&conn, &claims.sub)?
        .ok_or_else(|| AppError::unauthorized("Invalid refresh token"))?;

    if user.refresh_token.as_deref() != Some(incoming.as_str()) {
        return Err(AppError::unauthorized("Invalid refresh token"));
    }

    let pair = Token::issue_for_user(&conn, &app_state.config, &user)?;

    let mut response = send_response(
        StatusCode::OK,
        "Access token refreshed successfully",
        json!({
            "accessToken": pair.access_token,
            "refreshToken": pair.refresh_token,
        }),
    );
    response
        .add_cookie(&auth_cookie(ACCESS_COOKIE, pair.access_token.clone()))
        .map_err(|_| AppError::internal("Internal server error"))?;
    response
        .add_cookie(&auth_cookie(REFRESH_COOKIE, pair.refresh_token.clone()))
        .map_err(|_| AppError::internal("Internal server error"))?;

    Ok(response)
}

/// Logout: clears the persisted refresh token and removes both cookies.
/// - url: `{domain}/api/v1/auth/logout`
#[post("/auth/logout")]
pub async fn logout(
    authed: AuthedUser,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let conn = app_state.db()?;
    User::set_refresh_token(&conn, &authed.0.id, None)?;

    let mut response = send_response(StatusCode::OK, "Logged out successfully", json!({}));
    response
        .add_cookie(&removal_cookie(ACCESS_COOKIE))
        .map_err(|_| AppError::internal("Internal server error"))?;
    response
        .add_cookie(&removal_cookie(REFRESH_COOKIE))
        .map_err(|_| AppError::internal("Internal server error"))?;

    Ok(response)
}

use actix_multipart::Multipart;
use actix_web::{
    delete, get, http::StatusCode, patch, post,
    web::{self, Data},
    HttpRequest, HttpResponse,
};
use serde_json::{json, Value};

use crate::{
    app::{send_response, AppError, AppState},
    auth::{auth_cookie, extract_token, token::Token, AuthedUser, ACCESS_COOKIE, REFRESH_COOKIE},
    database::models::{
        blog::Blog,
        user::{SanitizedUser, User},
    },
    routes::parse_multipart,
};

/// Registration
/// - url: `{domain}/api/v1/auth/register`
///
/// # HTTP request requirements
/// ## body
/// - json with `userName`, `email` and `password` keys
///
/// # Response
/// ## Created
/// - the sanitized user, password and refresh token never included
/// ## Error
/// - 400 on any blank field
/// - 409 when the username or email is already taken (case-insensitive)
#[post("/auth/register")]
pub async fn register(
    req_body: String,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let body: Value = serde_json::from_str(req_body.trim())
        .map_err(|_| AppError::validation("Please provide all required fields"))?;

    let user_name = body.get("userName").and_then(Value::as_str).unwrap_or("");
    let email = body.get("email").and_then(Value::as_str).unwrap_or("");
    let password = body.get("password").and_then(Value::as_str).unwrap_or("");

    if user_name.trim().is_empty() || email.trim().is_empty() || password.trim().is_empty() {
        return Err(AppError::validation("Please provide all required fields"));
    }

    let conn = app_state.db()?;

    if User::exists_with_username_or_email(&conn, user_name, email)? {
        return Err(AppError::conflict(
            "User with this email or username already exists",
        ));
    }

    let pass_hash = bcrypt::hash(password.trim(), bcrypt::DEFAULT_COST)?;
    let user = User::create(&conn, user_name, email, &pass_hash)?;
    let sanitized = SanitizedUser::from_user(&conn, &user)?;

    Ok(send_response(
        StatusCode::CREATED,
        "Registered successfully!",
        json!({ "user": sanitized }),
    ))
}

/// Login
/// - url: `{domain}/api/v1/auth/login`
///
/// # HTTP request requirements
/// ## body
/// - json with `email` and `password` keys
///
/// # Response
/// ## Ok
/// - sanitized user plus the token pair, also set as `accessToken` and
///   `refreshToken` cookies
/// ## Error
/// - 400 missing email, 404 unknown email, 401 wrong password
#[post("/auth/login")]
pub async fn login(req_body: String, app_state: Data<AppState>) -> Result<HttpResponse, AppError> {
    let body: Value = serde_json::from_str(req_body.trim())
        .map_err(|_| AppError::validation("Email is required"))?;

    let email = body.get("email").and_then(Value::as_str).unwrap_or("");
    let password = body.get("password").and_then(Value::as_str).unwrap_or("");

    if email.trim().is_empty() {
        return Err(AppError::validation("Email is required"));
    }

    let conn = app_state.db()?;

    let user = User::find_by_email(&conn, email)?
        .ok_or_else(|| AppError::not_found("User does not exist"))?;

    if !bcrypt::verify(password.trim(), &user.pass)? {
        return Err(AppError::unauthorized("Invalid user credentials"));
    }

    let pair = Token::issue_for_user(&conn, &app_state.config, &user)?;
    let sanitized = SanitizedUser::from_user(&conn, &user)?;

    let mut response = send_response(
        StatusCode::OK,
        "Logged in successfully",
        json!({
            "user": sanitized,
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

/// Current user
/// - url: `{domain}/api/v1/auth/me`
#[get("/auth/me")]
pub async fn get_me(authed: AuthedUser) -> Result<HttpResponse, AppError> {
    Ok(send_response(
        StatusCode::OK,
        "User fetched successfully",
        json!({ "user": authed.0 }),
    ))
}

/// All users, sanitized
/// - url: `{domain}/api/v1/user`
#[get("/user")]
pub async fn get_all_users(app_state: Data<AppState>) -> Result<HttpResponse, AppError> {
    let conn = app_state.db()?;

    let users = User::all(&conn)?;
    if users.is_empty() {
        return Err(AppError::not_found("No users found"));
    }

    let sanitized = users
        .iter()
        .map(|user| SanitizedUser::from_user(&conn, user))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(send_response(
        StatusCode::OK,
        "Users fetched",
        json!({ "users": sanitized }),
    ))
}

/// Login status check. Public route with optional credentials: never 500s a
/// browser that simply is not logged in.
/// - url: `{domain}/api/v1/user/status`
#[get("/user/status")]
pub async fn login_status(
    req: HttpRequest,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let not_logged_in = || {
        HttpResponse::Unauthorized().json(json!({
            "success": false,
            "message": "Unauthorized",
            "isLoggedIn": false,
        }))
    };

    let token = match extract_token(&req) {
        Some(token) => token,
        None => return Ok(not_logged_in()),
    };
    let claims = match Token::verify_access(&app_state.config, &token) {
        Ok(claims) => claims,
        Err(_) => return Ok(not_logged_in()),
    };

    let conn = app_state.db()?;
    let user = match User::find_by_id(&conn, &claims.sub)? {
        Some(user) => user,
        None => return Ok(not_logged_in()),
    };

    // Sanitized user with the owned blogs populated, newest first.
    let sanitized = SanitizedUser::from_user(&conn, &user)?;
    let blogs = Blog::by_author(&conn, &user.id)?
        .iter()
        .map(|blog| blog.with_author(&conn))
        .collect::<Result<Vec<_>, _>>()?;

    let mut user_json = serde_json::to_value(&sanitized)?;
    user_json["blogs"] = serde_json::to_value(&blogs)?;

    Ok(send_response(
        StatusCode::OK,
        "",
        json!({
            "isLoggedIn": true,
            "user": user_json,
        }),
    ))
}

/// Profile update (multipart): `userName` text field plus an optional
/// `profilePic` file. A new picture replaces the stored one, deleting the
/// old image best-effort first.
/// - url: `{domain}/api/v1/auth/update`
#[patch("/auth/update")]
pub async fn update_user(
    authed: AuthedUser,
    app_state: Data<AppState>,
    mut mp: Multipart,
) -> Result<HttpResponse, AppError> {
    let form = parse_multipart(
        &mut mp,
        &app_state.config.temp_upload_dir,
        &["profilePic"],
    )
    .await?;

    let user_name = form.field("userName").unwrap_or("").trim().to_string();
    if user_name.is_empty() {
        if let Some(file) = form.file {
            let _ = std::fs::remove_file(file);
        }
        return Err(AppError::validation("Please provide all required fields"));
    }

    let mut new_pic = None;
    if let Some(file) = &form.file {
        app_state.media.delete(&authed.0.profile_pic).await;

        new_pic = Some(
            app_state
                .media
                .upload(file)
                .await
                .ok_or_else(|| AppError::internal("Image upload failed"))?,
        );
    }

    let conn = app_state.db()?;
    let updated = User::update_profile(&conn, &authed.0.id, &user_name, new_pic.as_deref())?;

    Ok(send_response(
        StatusCode::OK,
        "Updated successfully",
        json!({
            "user": {
                "userName": updated.username,
                "profilePic": updated.profile_pic,
            }
        }),
    ))
}

/// User lookup by id
/// - url: `{domain}/api/v1/auth/{_id}`
#[get("/auth/{_id}")]
pub async fn get_user_by_id(
    _authed: AuthedUser,
    path: web::Path<String>,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let conn = app_state.db()?;

    let user = User::find_by_id(&conn, &path.into_inner())?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let sanitized = SanitizedUser::from_user(&conn, &user)?;

    Ok(send_response(
        StatusCode::OK,
        "User found",
        json!({ "user": sanitized }),
    ))
}

/// Account deletion. Removes the requester's own record; blogs, comments and
/// likes cascade away with it, and the stored profile picture is cleaned up
/// best-effort.
/// - url: `{domain}/api/v1/auth/{_id}`
#[delete("/auth/{_id}")]
pub async fn delete_user(
    authed: AuthedUser,
    _path: web::Path<String>,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let old_pic = authed.0.profile_pic.clone();

    let conn = app_state.db()?;
    User::delete(&conn, &authed.0.id)?;
    drop(conn);

    app_state.media.delete(&old_pic).await;

    Ok(send_response(
        StatusCode::OK,
        "User deleted successfully",
        json!({}),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::{test_state, unique};
    use actix_web::{
        test::{self, call_service},
        App,
    };
    use pretty_assertions::assert_eq;

    async fn body_json(resp: actix_web::dev::ServiceResponse) -> Value {
        let body = test::read_body(resp).await;
        serde_json::from_slice(&body).unwrap()
    }

    #[actix_rt::test]
    async fn register_rejects_blank_fields() {
        let app_state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(Data::new(app_state.clone()))
                .service(super::register),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/auth/register")
            .insert_header(actix_web::http::header::ContentType::json())
            .set_payload(r#"{ "userName": "  ", "email": "a@x.com", "password": "pw" }"#)
            .to_request();

        let resp = call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);

        let body = body_json(resp).await;
        assert_eq!(body["success"], Value::Bool(false));
        assert_eq!(body["message"], "Please provide all required fields");
    }

    #[actix_rt::test]
    async fn login_requires_an_email() {
        let app_state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(Data::new(app_state.clone()))
                .service(super::login),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/auth/login")
            .insert_header(actix_web::http::header::ContentType::json())
            .set_payload(r#"{ "password": "password1" }"#)
            .to_request();

        let resp = call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);

        let body = body_json(resp).await;
        assert_eq!(body["message"], "Email is required");
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = bcrypt::hash("password1", 4).unwrap();
        assert!(bcrypt::verify("password1", &hash).unwrap());
        assert!(!bcrypt::verify("password2", &hash).unwrap());
        assert_ne!(hash, "password1");
    }

    #[actix_rt::test]
    #[ignore = "requires a local postgres database"]
    async fn register_login_and_duplicate_conflict() {
        let app_state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(Data::new(app_state.clone()))
                .service(super::register)
                .service(super::login),
        )
        .await;

        let user_name = unique("alice");
        let email = format!("{}@example.com", user_name);
        let payload = json!({
            "userName": user_name,
            "email": email,
            "password": "password1",
        })
        .to_string();

        // register
        let req = test::TestRequest::post()
            .uri("/auth/register")
            .insert_header(actix_web::http::header::ContentType::json())
            .set_payload(payload.clone())
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 201);
        let body = body_json(resp).await;
        assert_eq!(body["user"]["userName"], user_name);
        assert!(body["user"].get("password").is_none());
        assert!(body["user"].get("pass").is_none());

        // duplicate is a conflict, case-insensitively
        let req = test::TestRequest::post()
            .uri("/auth/register")
            .insert_header(actix_web::http::header::ContentType::json())
            .set_payload(
                json!({
                    "userName": user_name.to_uppercase(),
                    "email": email.to_uppercase(),
                    "password": "password1",
                })
                .to_string(),
            )
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 409);

        // wrong password: 401 and no cookies
        let req = test::TestRequest::post()
            .uri("/auth/login")
            .insert_header(actix_web::http::header::ContentType::json())
            .set_payload(json!({ "email": email, "password": "wrong" }).to_string())
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 401);
        assert!(resp.headers().get("set-cookie").is_none());

        // correct password: 200 with both cookies
        let req = test::TestRequest::post()
            .uri("/auth/login")
            .insert_header(actix_web::http::header::ContentType::json())
            .set_payload(json!({ "email": email, "password": "password1" }).to_string())
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 200);
        let cookies: Vec<_> = resp.response().cookies().map(|c| c.name().to_string()).collect();
        assert!(cookies.contains(&ACCESS_COOKIE.to_string()));
        assert!(cookies.contains(&REFRESH_COOKIE.to_string()));
    }
}

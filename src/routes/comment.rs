use actix_web::{
    get, http::StatusCode, post,
    web::{self, Data},
    HttpResponse,
};
use serde_json::{json, Value};

use crate::{
    app::{send_response, AppError, AppState},
    auth::AuthedUser,
    database::models::{
        blog::Blog,
        comment::{validate_comment, Comment},
    },
};

/// Comment creation; the path segment is the blog being commented on.
/// - url: `{domain}/api/v1/comments/{id}`
///
/// # Response
/// ## Created
/// - the new comment, author populated
/// ## Error
/// - 404 when the blog does not exist, checked first
/// - 400 when the trimmed content is out of range
#[post("/comments/{id}")]
pub async fn create_comment(
    authed: AuthedUser,
    path: web::Path<String>,
    req_body: String,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let body: Value = serde_json::from_str(req_body.trim())?;
    let content = body
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let conn = app_state.db()?;

    // The blog must exist before the content is judged.
    let blog = Blog::get_by_id(&conn, &path.into_inner())?
        .ok_or_else(|| AppError::not_found("Blog not found"))?;

    validate_comment(content)?;

    let comment = Comment::create(&conn, &blog.id, &authed.0.id, content)?;

    Ok(send_response(
        StatusCode::CREATED,
        "Comment created successfully",
        json!({ "comment": comment.with_author(&conn)? }),
    ))
}

/// Public: all comments on a blog, newest first, authors populated.
/// - url: `{domain}/api/v1/comments/{id}`
#[get("/comments/{id}")]
pub async fn get_comments(
    path: web::Path<String>,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let conn = app_state.db()?;

    let blog = Blog::get_by_id(&conn, &path.into_inner())?
        .ok_or_else(|| AppError::not_found("Blog not found"))?;

    let comments = Comment::find_by_blog(&conn, &blog.id)?
        .iter()
        .map(|comment| comment.with_author(&conn))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(send_response(
        StatusCode::OK,
        "Comments fetched successfully",
        json!({ "comments": comments }),
    ))
}

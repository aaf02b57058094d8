use actix_multipart::Multipart;
use actix_web::{
    delete, get, http::StatusCode, patch, post,
    web::{self, Data},
    HttpResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    app::{send_response, AppError, AppState},
    auth::AuthedUser,
    database::models::{
        blog::{
            validate_category, validate_content, validate_status, validate_title, AuthorInfo,
            Blog, BlogChanges, DEFAULT_THUMBNAIL,
        },
        comment::Comment,
        like::Like,
        user::User,
    },
    routes::parse_multipart,
};

#[derive(Deserialize)]
pub struct BlogQuery {
    q: Option<String>,
}

/// Blog creation (multipart): `title`, `content`, `category`, optional
/// `status` and optional `thumbnail` file. Without a thumbnail the default
/// placeholder is stored.
/// - url: `{domain}/api/v1/blogs`
///
/// # Response
/// ## Created
/// - the new blog, author populated
/// ## Error
/// - 400 on out-of-range title/content, unknown category/status
/// - 500 when the thumbnail upload fails
#[post("/blogs")]
pub async fn create_blog(
    authed: AuthedUser,
    app_state: Data<AppState>,
    mut mp: Multipart,
) -> Result<HttpResponse, AppError> {
    let form = parse_multipart(&mut mp, &app_state.config.temp_upload_dir, &["thumbnail"]).await?;

    let title = form.field("title").unwrap_or("").trim().to_string();
    let content = form.field("content").unwrap_or("").trim().to_string();
    let category = form.field("category").unwrap_or("").trim().to_string();
    let status = form
        .field("status")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("draft")
        .to_string();

    let validated = (|| {
        if title.is_empty() || content.is_empty() {
            return Err(AppError::validation("Title and content are required"));
        }
        validate_title(&title)?;
        validate_content(&content)?;
        validate_category(&category)?;
        validate_status(&status)
    })();
    if let Err(err) = validated {
        if let Some(file) = form.file {
            let _ = std::fs::remove_file(file);
        }
        return Err(err);
    }

    let thumbnail = match &form.file {
        Some(file) => app_state
            .media
            .upload(file)
            .await
            .ok_or_else(|| AppError::internal("Image upload failed"))?,
        None => DEFAULT_THUMBNAIL.to_string(),
    };

    let conn = app_state.db()?;
    let blog = Blog::create(
        &conn,
        &authed.0.id,
        &title,
        &content,
        &category,
        &status,
        &thumbnail,
    )?;

    Ok(send_response(
        StatusCode::CREATED,
        "Blog created successfully",
        json!({ "blog": blog.with_author(&conn)? }),
    ))
}

/// Blog listing with author populated, optional `?q=` title search.
/// - url: `{domain}/api/v1/blogs?q=...`
#[get("/blogs")]
pub async fn get_all_blogs(
    _authed: AuthedUser,
    query: web::Query<BlogQuery>,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let conn = app_state.db()?;

    let mut blogs = Blog::get_all(&conn)?;
    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let needle = q.to_lowercase();
        blogs.retain(|blog| blog.title.to_lowercase().contains(&needle));
    }

    if blogs.is_empty() {
        return Err(AppError::not_found("No blogs found"));
    }

    let blogs = blogs
        .iter()
        .map(|blog| blog.with_author(&conn))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(send_response(
        StatusCode::OK,
        "Blogs fetched successfully",
        json!({ "blogs": blogs }),
    ))
}

/// Single blog with author populated
/// - url: `{domain}/api/v1/blogs/{id}`
#[get("/blogs/{id}")]
pub async fn get_blog_by_id(
    _authed: AuthedUser,
    path: web::Path<String>,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let conn = app_state.db()?;

    let blog = Blog::get_by_id(&conn, &path.into_inner())?
        .ok_or_else(|| AppError::not_found("Blog not found"))?;

    Ok(send_response(
        StatusCode::OK,
        "Blog fetched successfully",
        json!({ "blog": blog.with_author(&conn)? }),
    ))
}

/// Partial update (multipart), author only. Absent fields keep their value;
/// a new `thumbnail` file replaces the stored image, deleting the old one
/// best-effort first.
/// - url: `{domain}/api/v1/blogs/{id}`
#[patch("/blogs/{id}")]
pub async fn update_blog(
    authed: AuthedUser,
    path: web::Path<String>,
    app_state: Data<AppState>,
    mut mp: Multipart,
) -> Result<HttpResponse, AppError> {
    let form = parse_multipart(&mut mp, &app_state.config.temp_upload_dir, &["thumbnail"]).await?;
    let cleanup = |form: crate::routes::UploadForm| {
        if let Some(file) = form.file {
            let _ = std::fs::remove_file(file);
        }
    };

    let blog_id = path.into_inner();

    let conn = app_state.db()?;
    let blog = match Blog::get_by_id(&conn, &blog_id)? {
        Some(blog) => blog,
        None => {
            cleanup(form);
            return Err(AppError::not_found("Blog not found"));
        }
    };
    if blog.author_id != authed.0.id {
        cleanup(form);
        return Err(AppError::forbidden(
            "You are not authorized to update this blog",
        ));
    }

    let title = form.field("title").map(str::trim).filter(|t| !t.is_empty());
    let content = form
        .field("content")
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let category = form
        .field("category")
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let status = form.field("status").map(str::trim).filter(|s| !s.is_empty());

    let validated = (|| {
        if let Some(title) = title {
            validate_title(title)?;
        }
        if let Some(content) = content {
            validate_content(content)?;
        }
        if let Some(category) = category {
            validate_category(category)?;
        }
        if let Some(status) = status {
            validate_status(status)?;
        }
        Ok(())
    })();
    if let Err(err) = validated {
        cleanup(form);
        return Err(err);
    }

    // give the pool slot back while the remote image calls run
    drop(conn);

    let mut new_thumbnail = None;
    if let Some(file) = &form.file {
        app_state.media.delete(&blog.thumbnail).await;

        new_thumbnail = Some(
            app_state
                .media
                .upload(file)
                .await
                .ok_or_else(|| AppError::internal("Image upload failed"))?,
        );
    }

    let conn = app_state.db()?;
    let changes = BlogChanges {
        title,
        content,
        category,
        status,
        thumbnail: new_thumbnail.as_deref(),
        updated_at: chrono::Utc::now().naive_utc(),
    };
    let updated = Blog::update(&conn, &blog_id, &changes)?;

    Ok(send_response(
        StatusCode::OK,
        "Blog updated successfully",
        json!({ "blog": updated.with_author(&conn)? }),
    ))
}

/// Blog deletion, author only. The ownership check runs before the row is
/// removed; the stored thumbnail is cleaned up best-effort and the comments
/// and likes cascade away.
/// - url: `{domain}/api/v1/blogs/{id}`
#[delete("/blogs/{id}")]
pub async fn delete_blog(
    authed: AuthedUser,
    path: web::Path<String>,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let conn = app_state.db()?;

    let blog = Blog::get_by_id(&conn, &path.into_inner())?
        .ok_or_else(|| AppError::not_found("Blog not found"))?;
    if blog.author_id != authed.0.id {
        return Err(AppError::forbidden(
            "You are not authorized to delete this blog",
        ));
    }

    Blog::delete_by_id(&conn, &blog.id)?;
    drop(conn);

    app_state.media.delete(&blog.thumbnail).await;

    Ok(send_response(
        StatusCode::OK,
        "Blog deleted successfully",
        json!({}),
    ))
}

/// Public: comments on a blog, authors populated
/// - url: `{domain}/api/v1/blogs/{id}/comments`
#[get("/blogs/{id}/comments")]
pub async fn get_blog_comments(
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

/// Public: author projection
/// - url: `{domain}/api/v1/blogs/{id}/author`
#[get("/blogs/{id}/author")]
pub async fn get_blog_author(
    path: web::Path<String>,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let conn = app_state.db()?;

    let blog = Blog::get_by_id(&conn, &path.into_inner())?
        .ok_or_else(|| AppError::not_found("Blog not found"))?;
    let author = User::find_by_id(&conn, &blog.author_id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(send_response(
        StatusCode::OK,
        "Author details fetched successfully",
        json!({ "author": AuthorInfo::from(&author) }),
    ))
}

/// Public: like count
/// - url: `{domain}/api/v1/blogs/{id}/likes`
#[get("/blogs/{id}/likes")]
pub async fn get_blog_likes(
    path: web::Path<String>,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let conn = app_state.db()?;

    let blog = Blog::get_by_id(&conn, &path.into_inner())?
        .ok_or_else(|| AppError::not_found("Blog not found"))?;
    let likes = Like::count_for_blog(&conn, &blog.id)?;

    Ok(send_response(
        StatusCode::OK,
        "Likes fetched successfully",
        json!({ "likes": likes }),
    ))
}

/// One-time like. The insert is an atomic add-to-set, so a second like by
/// the same user (even concurrently) reports "already liked" instead of
/// growing the list.
/// - url: `{domain}/api/v1/blogs/{id}/like`
#[post("/blogs/{id}/like")]
pub async fn like_blog(
    authed: AuthedUser,
    path: web::Path<String>,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let conn = app_state.db()?;

    let blog = Blog::get_by_id(&conn, &path.into_inner())?
        .ok_or_else(|| AppError::not_found("Blog not found"))?;

    if !Like::add(&conn, &authed.0.id, &blog.id)? {
        return Err(AppError::validation("You have already liked this blog"));
    }

    let likes = Like::count_for_blog(&conn, &blog.id)?;

    Ok(send_response(
        StatusCode::OK,
        "Blog liked successfully",
        json!({ "likes": likes }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app::test_support::{test_config, test_state, unique},
        auth::{token::Token, ACCESS_COOKIE},
    };
    use actix_web::{
        cookie::Cookie,
        test::{self, call_service},
        App,
    };
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn make_user(conn: &diesel::PgConnection, prefix: &str) -> User {
        let name = unique(prefix);
        User::create(
            conn,
            &name,
            &format!("{}@example.com", name),
            &bcrypt::hash("password1", 4).unwrap(),
        )
        .unwrap()
    }

    fn access_cookie(user: &User) -> Cookie<'static> {
        let token = Token::issue_access(&test_config(), user).unwrap();
        Cookie::new(ACCESS_COOKIE, token)
    }

    fn make_blog(conn: &diesel::PgConnection, author: &User) -> Blog {
        Blog::create(
            conn,
            &author.id,
            "A perfectly fine title",
            &"body ".repeat(20),
            "Technology",
            "draft",
            DEFAULT_THUMBNAIL,
        )
        .unwrap()
    }

    #[actix_rt::test]
    #[ignore = "requires a local postgres database"]
    async fn non_author_update_is_forbidden_and_leaves_the_blog_unchanged() {
        let app_state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(Data::new(app_state.clone()))
                .service(super::update_blog),
        )
        .await;

        let conn = app_state.db().unwrap();
        let author = make_user(&conn, "author");
        let intruder = make_user(&conn, "intruder");
        let blog = make_blog(&conn, &author);

        let boundary = "------------------------abcdef";
        let payload = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nHijacked title\r\n--{b}--\r\n",
            b = boundary
        );
        let req = test::TestRequest::patch()
            .uri(&format!("/blogs/{}", blog.id))
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            ))
            .cookie(access_cookie(&intruder))
            .set_payload(payload)
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 403);

        let body = test::read_body(resp).await;
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["message"], "You are not authorized to update this blog");

        let unchanged = Blog::get_by_id(&conn, &blog.id).unwrap().unwrap();
        assert_eq!(unchanged.title, "A perfectly fine title");

        User::delete(&conn, &author.id).unwrap();
        User::delete(&conn, &intruder.id).unwrap();
    }

    #[actix_rt::test]
    #[ignore = "requires a local postgres database"]
    async fn double_like_is_rejected_and_count_grows_once() {
        let app_state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(Data::new(app_state.clone()))
                .service(super::like_blog),
        )
        .await;

        let conn = app_state.db().unwrap();
        let author = make_user(&conn, "author");
        let fan = make_user(&conn, "fan");
        let blog = make_blog(&conn, &author);

        let req = test::TestRequest::post()
            .uri(&format!("/blogs/{}/like", blog.id))
            .cookie(access_cookie(&fan))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 200);
        assert_eq!(Like::count_for_blog(&conn, &blog.id).unwrap(), 1);

        let req = test::TestRequest::post()
            .uri(&format!("/blogs/{}/like", blog.id))
            .cookie(access_cookie(&fan))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);

        let body = test::read_body(resp).await;
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["message"], "You have already liked this blog");
        assert_eq!(Like::count_for_blog(&conn, &blog.id).unwrap(), 1);

        User::delete(&conn, &author.id).unwrap();
        User::delete(&conn, &fan.id).unwrap();
    }

    #[actix_rt::test]
    #[ignore = "requires a local postgres database"]
    async fn deleted_blog_is_gone_for_good() {
        let app_state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(Data::new(app_state.clone()))
                .service(super::delete_blog)
                .service(super::get_blog_by_id),
        )
        .await;

        let conn = app_state.db().unwrap();
        let author = make_user(&conn, "author");
        let blog = make_blog(&conn, &author);

        let req = test::TestRequest::delete()
            .uri(&format!("/blogs/{}", blog.id))
            .cookie(access_cookie(&author))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 200);

        // gone from the author's owned list as well
        assert!(Blog::ids_by_author(&conn, &author.id).unwrap().is_empty());

        let req = test::TestRequest::get()
            .uri(&format!("/blogs/{}", blog.id))
            .cookie(access_cookie(&author))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 404);

        let body = test::read_body(resp).await;
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["message"], "Blog not found");

        User::delete(&conn, &author.id).unwrap();
    }

    #[actix_rt::test]
    #[ignore = "requires a local postgres database"]
    async fn short_title_is_rejected_with_the_exact_message() {
        let app_state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(Data::new(app_state.clone()))
                .service(super::create_blog),
        )
        .await;

        let conn = app_state.db().unwrap();
        let author = make_user(&conn, "author");

        let boundary = "------------------------abcdef";
        let payload = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nabcd\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"content\"\r\n\r\n{content}\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"category\"\r\n\r\nTechnology\r\n--{b}--\r\n",
            b = boundary,
            content = "body ".repeat(20),
        );
        let req = test::TestRequest::post()
            .uri("/blogs")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            ))
            .cookie(access_cookie(&author))
            .set_payload(payload)
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);

        let body = test::read_body(resp).await;
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["message"], "Title must be between 5 to 100 characters");

        User::delete(&conn, &author.id).unwrap();
    }
}

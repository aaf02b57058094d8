use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    app::AppError,
    database::models::{blog::AuthorInfo, user::User},
    schema::{self, comments},
};

pub const COMMENT_MIN: usize = 5;
pub const COMMENT_MAX: usize = 500;

/// Comments are validated on their trimmed length.
pub fn validate_comment(content: &str) -> Result<(), AppError> {
    let len = content.trim().chars().count();
    if len < COMMENT_MIN || len > COMMENT_MAX {
        return Err(AppError::validation(
            "Comment must be between 5 to 500 characters",
        ));
    }
    Ok(())
}

#[derive(Debug, Queryable, Clone)]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub author_id: String,
    pub blog_id: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[table_name = "comments"]
struct CommentInsert {
    id: String,
    content: String,
    author_id: String,
    blog_id: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl Comment {
    /** Creates a comment on the blog specified */
    pub fn create(
        conn: &PgConnection,
        blog: &str,
        author: &str,
        content_in: &str,
    ) -> Result<Comment, AppError> {
        let time = Utc::now().naive_utc();

        let to_insert = CommentInsert {
            id: Uuid::new_v4().to_string(),
            content: content_in.trim().to_string(),
            author_id: author.to_string(),
            blog_id: blog.to_string(),
            created_at: time,
            updated_at: time,
        };

        let comment = diesel::insert_into(schema::comments::table)
            .values(&to_insert)
            .get_result(conn)?;

        Ok(comment)
    }

    /** Returns all comments posted on a blog, newest first */
    pub fn find_by_blog(conn: &PgConnection, blog: &str) -> Result<Vec<Comment>, AppError> {
        use schema::comments::dsl::*;

        let found = comments
            .filter(blog_id.eq(blog))
            .order(created_at.desc())
            .load::<Comment>(conn)?;

        Ok(found)
    }

    /// Comment ids on a blog, for the blog's back-reference list.
    pub fn ids_by_blog(conn: &PgConnection, blog: &str) -> Result<Vec<String>, AppError> {
        use schema::comments::dsl::*;

        let found = comments
            .filter(blog_id.eq(blog))
            .order(created_at.desc())
            .select(id)
            .load::<String>(conn)?;

        Ok(found)
    }

    /// Comment ids authored by a user, for the user's back-reference list.
    pub fn ids_by_author(conn: &PgConnection, author: &str) -> Result<Vec<String>, AppError> {
        use schema::comments::dsl::*;

        let found = comments
            .filter(author_id.eq(author))
            .order(created_at.desc())
            .select(id)
            .load::<String>(conn)?;

        Ok(found)
    }

    /// Response form with the author populated.
    pub fn with_author(&self, conn: &PgConnection) -> Result<CommentResponse, AppError> {
        let author = User::find_by_id(conn, &self.author_id)?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        Ok(CommentResponse {
            id: self.id.clone(),
            content: self.content.clone(),
            author: AuthorInfo::from(&author),
            blog: self.blog_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub content: String,
    pub author: AuthorInfo,
    pub blog: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

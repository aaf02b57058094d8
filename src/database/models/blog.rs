use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    app::AppError,
    database::models::{comment::Comment, like::Like, user::User},
    schema::{self, blogs},
};

/// Placeholder used when a blog is created without a thumbnail.
pub const DEFAULT_THUMBNAIL: &str = "https://placehold.co/1200x630?text=blog";

pub const CATEGORIES: [&str; 4] = ["Technology", "Design", "Lifestyle", "Business"];
pub const STATUSES: [&str; 2] = ["draft", "published"];

pub const TITLE_MIN: usize = 5;
pub const TITLE_MAX: usize = 100;
pub const CONTENT_MIN: usize = 50;
pub const CONTENT_MAX: usize = 20000;

pub fn validate_title(title: &str) -> Result<(), AppError> {
    let len = title.chars().count();
    if len < TITLE_MIN || len > TITLE_MAX {
        return Err(AppError::validation(
            "Title must be between 5 to 100 characters",
        ));
    }
    Ok(())
}

pub fn validate_content(content: &str) -> Result<(), AppError> {
    let len = content.chars().count();
    if len < CONTENT_MIN || len > CONTENT_MAX {
        return Err(AppError::validation(
            "Content must be between 50 to 20000 characters",
        ));
    }
    Ok(())
}

pub fn validate_category(category: &str) -> Result<(), AppError> {
    if !CATEGORIES.contains(&category) {
        return Err(AppError::validation("Invalid category"));
    }
    Ok(())
}

pub fn validate_status(status: &str) -> Result<(), AppError> {
    if !STATUSES.contains(&status) {
        return Err(AppError::validation("Invalid status"));
    }
    Ok(())
}

#[derive(Debug, Queryable, Clone)]
pub struct Blog {
    pub id: String,
    pub title: String,
    pub content: String,
    pub thumbnail: String,
    pub category: String,
    pub status: String,
    pub author_id: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[table_name = "blogs"]
struct BlogInsert {
    id: String,
    title: String,
    content: String,
    thumbnail: String,
    category: String,
    status: String,
    author_id: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

/// Partial update; `None` fields keep their current value.
#[derive(AsChangeset)]
#[table_name = "blogs"]
pub struct BlogChanges<'a> {
    pub title: Option<&'a str>,
    pub content: Option<&'a str>,
    pub category: Option<&'a str>,
    pub status: Option<&'a str>,
    pub thumbnail: Option<&'a str>,
    pub updated_at: NaiveDateTime,
}

impl Blog {
    /// Inserts a validated blog. Caller runs the field validation first so
    /// the error messages stay at the request boundary.
    pub fn create(
        conn: &PgConnection,
        author: &str,
        title_in: &str,
        content_in: &str,
        category_in: &str,
        status_in: &str,
        thumbnail_in: &str,
    ) -> Result<Blog, AppError> {
        let time = Utc::now().naive_utc();

        let to_insert = BlogInsert {
            id: Uuid::new_v4().to_string(),
            title: title_in.trim().to_string(),
            content: content_in.trim().to_string(),
            thumbnail: thumbnail_in.to_string(),
            category: category_in.to_string(),
            status: status_in.to_string(),
            author_id: author.to_string(),
            created_at: time,
            updated_at: time,
        };

        let blog = diesel::insert_into(schema::blogs::table)
            .values(&to_insert)
            .get_result(conn)?;

        Ok(blog)
    }

    pub fn get_by_id(conn: &PgConnection, blog_id: &str) -> Result<Option<Blog>, AppError> {
        use crate::schema::blogs::dsl::*;

        let found = blogs.filter(id.eq(blog_id)).first::<Blog>(conn).optional()?;

        Ok(found)
    }

    pub fn get_all(conn: &PgConnection) -> Result<Vec<Blog>, AppError> {
        use crate::schema::blogs::dsl::*;

        let found = blogs.order(created_at.desc()).load::<Blog>(conn)?;

        Ok(found)
    }

    /// Blogs owned by one user, newest first.
    pub fn by_author(conn: &PgConnection, author: &str) -> Result<Vec<Blog>, AppError> {
        use crate::schema::blogs::dsl::*;

        let found = blogs
            .filter(author_id.eq(author))
            .order(created_at.desc())
            .load::<Blog>(conn)?;

        Ok(found)
    }

    /// Just the ids, for populating a user's back-reference list.
    pub fn ids_by_author(conn: &PgConnection, author: &str) -> Result<Vec<String>, AppError> {
        use crate::schema::blogs::dsl::*;

        let found = blogs
            .filter(author_id.eq(author))
            .order(created_at.desc())
            .select(id)
            .load::<String>(conn)?;

        Ok(found)
    }

    pub fn update(
        conn: &PgConnection,
        blog_id: &str,
        changes: &BlogChanges,
    ) -> Result<Blog, AppError> {
        use crate::schema::blogs::dsl::*;

        let updated = diesel::update(blogs.filter(id.eq(blog_id)))
            .set(changes)
            .get_result(conn)?;

        Ok(updated)
    }

    /// Deletes the blog row; comments and likes follow via cascade, and the
    /// id disappears from the author's populated `blogs` list with it.
    pub fn delete_by_id(conn: &PgConnection, blog_id: &str) -> Result<(), AppError> {
        use crate::schema::blogs::dsl::*;

        diesel::delete(blogs.filter(id.eq(blog_id))).execute(conn)?;

        Ok(())
    }

    /// Assembles the response form: author populated, reference lists joined.
    pub fn with_author(&self, conn: &PgConnection) -> Result<BlogResponse, AppError> {
        let author = User::find_by_id(conn, &self.author_id)?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        Ok(BlogResponse {
            id: self.id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            thumbnail: self.thumbnail.clone(),
            category: self.category.clone(),
            status: self.status.clone(),
            author: AuthorInfo::from(&author),
            comments: Comment::ids_by_blog(conn, &self.id)?,
            likes: Like::user_ids_for_blog(conn, &self.id)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Author projection embedded in blog and comment responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorInfo {
    pub id: String,
    pub user_name: String,
    pub profile_pic: String,
}

impl From<&User> for AuthorInfo {
    fn from(user: &User) -> Self {
        AuthorInfo {
            id: user.id.clone(),
            user_name: user.username.clone(),
            profile_pic: user.profile_pic.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogResponse {
    pub id: String,
    pub title: String,
    pub content: String,
    pub thumbnail: String,
    pub category: String,
    pub status: String,
    pub author: AuthorInfo,
    pub comments: Vec<String>,
    pub likes: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn title_bounds() {
        assert!(validate_title("1234").is_err());
        assert!(validate_title("12345").is_ok());
        assert!(validate_title(&"a".repeat(100)).is_ok());
        assert!(validate_title(&"a".repeat(101)).is_err());

        let err = validate_title("hi").unwrap_err();
        assert_eq!(err.to_string(), "Title must be between 5 to 100 characters");
    }

    #[test]
    fn content_bounds() {
        assert!(validate_content(&"a".repeat(49)).is_err());
        assert!(validate_content(&"a".repeat(50)).is_ok());
        assert!(validate_content(&"a".repeat(20000)).is_ok());
        assert!(validate_content(&"a".repeat(20001)).is_err());

        let err = validate_content("short").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Content must be between 50 to 20000 characters"
        );
    }

    #[test]
    fn category_membership() {
        for cat in CATEGORIES {
            assert!(validate_category(cat).is_ok());
        }
        assert!(validate_category("Sports").is_err());
        assert!(validate_category("technology").is_err());
        assert_eq!(
            validate_category("Sports").unwrap_err().to_string(),
            "Invalid category"
        );
    }

    #[test]
    fn status_membership() {
        assert!(validate_status("draft").is_ok());
        assert!(validate_status("published").is_ok());
        assert!(validate_status("archived").is_err());
    }
}

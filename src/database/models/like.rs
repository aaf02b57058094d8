use diesel::prelude::*;

use crate::{app::AppError, schema::likes};

/// One row per (user, blog) pair; the composite primary key plus
/// `ON CONFLICT DO NOTHING` makes liking an atomic add-to-set, so two
/// concurrent likes by the same user cannot produce duplicates.
#[derive(Debug, Insertable, Queryable)]
#[table_name = "likes"]
pub struct Like {
    pub user_id: String,
    pub blog_id: String,
}

impl Like {
    /// Returns `true` if the like was inserted, `false` if it already existed.
    pub fn add(conn: &PgConnection, user: &str, blog: &str) -> Result<bool, AppError> {
        let like = Like {
            user_id: user.to_string(),
            blog_id: blog.to_string(),
        };

        let inserted = diesel::insert_into(likes::table)
            .values(&like)
            .on_conflict_do_nothing()
            .execute(conn)?;

        Ok(inserted > 0)
    }

    pub fn count_for_blog(conn: &PgConnection, blog: &str) -> Result<i64, AppError> {
        use crate::schema::likes::dsl::*;

        let count = likes.filter(blog_id.eq(blog)).count().get_result(conn)?;

        Ok(count)
    }

    /// Users who liked the blog, the blog-side mirror list.
    pub fn user_ids_for_blog(conn: &PgConnection, blog: &str) -> Result<Vec<String>, AppError> {
        use crate::schema::likes::dsl::*;

        let found = likes
            .filter(blog_id.eq(blog))
            .select(user_id)
            .load::<String>(conn)?;

        Ok(found)
    }

    /// Blogs the user liked, the user-side mirror list.
    pub fn blog_ids_for_user(conn: &PgConnection, user: &str) -> Result<Vec<String>, AppError> {
        use crate::schema::likes::dsl::*;

        let found = likes
            .filter(user_id.eq(user))
            .select(blog_id)
            .load::<String>(conn)?;

        Ok(found)
    }
}

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    app::AppError,
    database::models::{blog::Blog, comment::Comment, like::Like},
    schema::{self, users},
};

/// Placeholder shown until the user uploads their own picture.
pub const DEFAULT_PROFILE_PIC: &str =
    "https://militaryhealthinstitute.org/wp-content/uploads/sites/37/2021/08/blank-profile-picture-png.png";

/// Full user row. `pass` and `refresh_token` never leave the server,
/// responses go through [SanitizedUser] instead.
#[derive(Debug, Queryable, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    /// bcrypt hash of the password
    pub pass: String,
    pub profile_pic: String,
    pub refresh_token: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[table_name = "users"]
struct UserInsert {
    id: String,
    username: String,
    email: String,
    pass: String,
    profile_pic: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl User {
    /// Inserts a new user. Username and email are stored lowercased so the
    /// uniqueness constraint is effectively case-insensitive.
    pub fn create(
        conn: &PgConnection,
        username_in: &str,
        email_in: &str,
        pass_hash: &str,
    ) -> Result<User, AppError> {
        let time = Utc::now().naive_utc();

        let to_insert = UserInsert {
            id: Uuid::new_v4().to_string(),
            username: username_in.trim().to_lowercase(),
            email: email_in.trim().to_lowercase(),
            pass: pass_hash.to_string(),
            profile_pic: DEFAULT_PROFILE_PIC.to_string(),
            created_at: time,
            updated_at: time,
        };

        // Two registrations can race past the pre-insert duplicate check;
        // the unique constraint catches the loser, on the same message.
        let user = diesel::insert_into(schema::users::table)
            .values(&to_insert)
            .get_result(conn)
            .map_err(|err| match err {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => AppError::conflict("User with this email or username already exists"),
                other => other.into(),
            })?;

        Ok(user)
    }

    pub fn find_by_id(conn: &PgConnection, user_id: &str) -> Result<Option<User>, AppError> {
        use crate::schema::users::dsl::*;

        let found = users
            .filter(id.eq(user_id))
            .first::<User>(conn)
            .optional()?;

        Ok(found)
    }

    pub fn find_by_email(conn: &PgConnection, email_in: &str) -> Result<Option<User>, AppError> {
        use crate::schema::users::dsl::*;

        let found = users
            .filter(email.eq(email_in.trim().to_lowercase()))
            .first::<User>(conn)
            .optional()?;

        Ok(found)
    }

    /// Duplicate check used by registration, case-insensitive on both fields.
    pub fn exists_with_username_or_email(
        conn: &PgConnection,
        username_in: &str,
        email_in: &str,
    ) -> Result<bool, AppError> {
        use crate::schema::users::dsl::*;

        let count: i64 = users
            .filter(
                username
                    .eq(username_in.trim().to_lowercase())
                    .or(email.eq(email_in.trim().to_lowercase())),
            )
            .count()
            .get_result(conn)?;

        Ok(count > 0)
    }

    pub fn all(conn: &PgConnection) -> Result<Vec<User>, AppError> {
        use crate::schema::users::dsl::*;

        let found = users.order(created_at.desc()).load::<User>(conn)?;

        Ok(found)
    }

    /// Persists (or clears) the refresh token, the only server-side session
    /// state.
    pub fn set_refresh_token(
        conn: &PgConnection,
        user_id: &str,
        token: Option<&str>,
    ) -> Result<(), AppError> {
        use crate::schema::users::dsl::*;

        diesel::update(users.filter(id.eq(user_id)))
            .set((
                refresh_token.eq(token),
                updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        Ok(())
    }

    pub fn update_profile(
        conn: &PgConnection,
        user_id: &str,
        username_in: &str,
        profile_pic_in: Option<&str>,
    ) -> Result<User, AppError> {
        use crate::schema::users::dsl::*;

        let current = User::find_by_id(conn, user_id)?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        let new_pic = profile_pic_in.unwrap_or(&current.profile_pic).to_string();

        let updated = diesel::update(users.filter(id.eq(user_id)))
            .set((
                username.eq(username_in.trim().to_lowercase()),
                profile_pic.eq(new_pic),
                updated_at.eq(Utc::now().naive_utc()),
            ))
            .get_result(conn)?;

        Ok(updated)
    }

    /// Deletes the user row; blogs, comments and likes follow through the
    /// `ON DELETE CASCADE` foreign keys.
    pub fn delete(conn: &PgConnection, user_id: &str) -> Result<(), AppError> {
        use crate::schema::users::dsl::*;

        diesel::delete(users.filter(id.eq(user_id))).execute(conn)?;

        Ok(())
    }
}

/// User record as returned to clients: no password hash, no refresh token,
/// with the owned/liked/authored reference lists populated at query time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedUser {
    pub id: String,
    pub user_name: String,
    pub email: String,
    pub profile_pic: String,
    pub blogs: Vec<String>,
    pub likes: Vec<String>,
    pub comments: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl SanitizedUser {
    pub fn from_user(conn: &PgConnection, user: &User) -> Result<SanitizedUser, AppError> {
        Ok(SanitizedUser {
            id: user.id.clone(),
            user_name: user.username.clone(),
            email: user.email.clone(),
            profile_pic: user.profile_pic.clone(),
            blogs: Blog::ids_by_author(conn, &user.id)?,
            likes: Like::blog_ids_for_user(conn, &user.id)?,
            comments: Comment::ids_by_author(conn, &user.id)?,
            created_at: user.created_at,
            updated_at: user.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sanitized_user_serializes_camel_case_without_secrets() {
        let time = Utc::now().naive_utc();
        let user = SanitizedUser {
            id: "u-1".to_string(),
            user_name: "alice".to_string(),
            email: "a@x.com".to_string(),
            profile_pic: DEFAULT_PROFILE_PIC.to_string(),
            blogs: vec!["b-1".to_string()],
            likes: vec![],
            comments: vec![],
            created_at: time,
            updated_at: time,
        };

        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["userName"], "alice");
        assert_eq!(value["profilePic"], DEFAULT_PROFILE_PIC);
        assert_eq!(value["blogs"][0], "b-1");
        assert!(value.get("pass").is_none());
        assert!(value.get("password").is_none());
        assert!(value.get("refreshToken").is_none());
    }

    #[test]
    #[ignore = "requires a local postgres database"]
    fn racing_duplicate_insert_keeps_the_registration_message() {
        use actix_web::{http::StatusCode, ResponseError};

        let app_state = crate::app::test_support::test_state();
        let conn = app_state.db().unwrap();

        let name = crate::app::test_support::unique("dupe");
        let email = format!("{}@example.com", name);
        let user = User::create(&conn, &name, &email, "hash").unwrap();

        let err = User::create(&conn, &name, &email, "hash").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            err.to_string(),
            "User with this email or username already exists"
        );

        User::delete(&conn, &user.id).unwrap();
    }
}

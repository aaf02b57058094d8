use chrono::Utc;
use diesel::PgConnection;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    app::{config::Config, AppError},
    database::models::user::User,
};

/// Claims carried by the short-lived access token. Self-verifying: the
/// server keeps no state for these.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub username: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by the refresh token; only the user id.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct Token {}

impl Token {
    pub fn issue_access(config: &Config, user: &User) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            iat: now,
            exp: now + config.access_expiry_secs,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.access_token_secret.as_bytes()),
        )?;

        Ok(token)
    }

    pub fn issue_refresh(config: &Config, user_id: &str) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + config.refresh_expiry_secs,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
        )?;

        Ok(token)
    }

    pub fn verify_access(config: &Config, token: &str) -> Result<AccessClaims, AppError> {
        let data = decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(config.access_token_secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(data.claims)
    }

    pub fn verify_refresh(config: &Config, token: &str) -> Result<RefreshClaims, AppError> {
        let data = decode::<RefreshClaims>(
            token,
            &DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(data.claims)
    }

    /// Issues a fresh access/refresh pair and persists the refresh token on
    /// the user row. Every issuance rotates the stored token.
    pub fn issue_for_user(
        conn: &PgConnection,
        config: &Config,
        user: &User,
    ) -> Result<TokenPair, AppError> {
        let access_token = Token::issue_access(config, user)?;
        let refresh_token = Token::issue_refresh(config, &user.id)?;

        User::set_refresh_token(conn, &user.id, Some(&refresh_token))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/unused".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            access_token_secret: "access-secret-for-tests".to_string(),
            refresh_token_secret: "refresh-secret-for-tests".to_string(),
            access_expiry_secs: 900,
            refresh_expiry_secs: 3600,
            temp_upload_dir: std::path::PathBuf::from("temp-images"),
            cloudinary: crate::app::config::CloudinaryConfig {
                cloud_name: "demo".to_string(),
                api_key: "key".to_string(),
                api_secret: "secret".to_string(),
                folder: "blog-uploads".to_string(),
            },
        }
    }

    fn test_user() -> User {
        let time = Utc::now().naive_utc();
        User {
            id: "user-1".to_string(),
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            pass: "hash".to_string(),
            profile_pic: "pic".to_string(),
            refresh_token: None,
            created_at: time,
            updated_at: time,
        }
    }

    #[test]
    fn access_token_round_trip() {
        let config = test_config();
        let user = test_user();

        let token = Token::issue_access(&config, &user).unwrap();
        let claims = Token::verify_access(&config, &token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.email, "a@x.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn refresh_token_round_trip_carries_only_the_id() {
        let config = test_config();

        let token = Token::issue_refresh(&config, "user-1").unwrap();
        let claims = Token::verify_refresh(&config, &token).unwrap();

        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn access_and_refresh_secrets_are_not_interchangeable() {
        let config = test_config();
        let user = test_user();

        let access = Token::issue_access(&config, &user).unwrap();
        let refresh = Token::issue_refresh(&config, &user.id).unwrap();

        assert!(Token::verify_refresh(&config, &access).is_err());
        assert!(Token::verify_access(&config, &refresh).is_err());
    }

    #[test]
    fn expired_access_token_is_rejected() {
        let config = test_config();
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: "user-1".to_string(),
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.access_token_secret.as_bytes()),
        )
        .unwrap();

        let err = Token::verify_access(&config, &token).unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired token");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let config = test_config();
        let user = test_user();

        let mut token = Token::issue_access(&config, &user).unwrap();
        token.pop();
        token.push('x');

        assert!(Token::verify_access(&config, &token).is_err());
    }
}

use std::env;
use std::path::PathBuf;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_num(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Credentials for the remote image store.
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
}

/// Runtime configuration, loaded once from the environment at startup.
/// `DATABASE_URL` and the token secrets are required, everything else
/// has a sensible default.
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_expiry_secs: i64,
    pub refresh_expiry_secs: i64,
    pub temp_upload_dir: PathBuf,
    pub cloudinary: CloudinaryConfig,
}

impl Config {
    pub fn from_env() -> Config {
        dotenv::dotenv().ok();

        Config {
            database_url: env::var("DATABASE_URL")
                .expect("Enviroment variable 'DATABASE_URL' not set"),
            bind_addr: env_or("BIND_ADDR", "127.0.0.1:8080"),
            access_token_secret: env::var("ACCESS_TOKEN_SECRET")
                .expect("Enviroment variable 'ACCESS_TOKEN_SECRET' not set"),
            refresh_token_secret: env::var("REFRESH_TOKEN_SECRET")
                .expect("Enviroment variable 'REFRESH_TOKEN_SECRET' not set"),
            access_expiry_secs: env_num("ACCESS_EXPIRY_SECS", 15 * 60),
            refresh_expiry_secs: env_num("REFRESH_EXPIRY_SECS", 7 * 24 * 60 * 60),
            temp_upload_dir: PathBuf::from(env_or("TEMP_UPLOAD_DIR", "temp-images")),
            cloudinary: CloudinaryConfig {
                cloud_name: env_or("CLOUDINARY_CLOUD_NAME", ""),
                api_key: env_or("CLOUDINARY_API_KEY", ""),
                api_secret: env_or("CLOUDINARY_API_SECRET", ""),
                folder: env_or("CLOUDINARY_FOLDER", "blog-uploads"),
            },
        }
    }
}

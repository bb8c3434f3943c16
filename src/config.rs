use std::env;

use anyhow::{Context, Result};

use crate::db::DEFAULT_MAX_POOL_SIZE;

pub const DEFAULT_UPLOAD_MAX_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_access_expiry_minutes: i64,
    pub jwt_refresh_expiry_days: i64,
    pub upload_dir: String,
    pub upload_max_size: u64,
    pub cors_allowed_origin: Option<String>,
    pub admin_password: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_pool_size = env::var("DATABASE_MAX_POOL_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "tarasul".to_string());
        let jwt_access_expiry_minutes = env::var("JWT_ACCESS_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .context("JWT_ACCESS_EXPIRY_MINUTES must be an integer")?;
        let jwt_refresh_expiry_days = env::var("JWT_REFRESH_EXPIRY_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse()
            .context("JWT_REFRESH_EXPIRY_DAYS must be an integer")?;
        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string());
        let upload_max_size = env::var("UPLOAD_MAX_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_UPLOAD_MAX_SIZE);
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();
        let admin_password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());

        Ok(Self {
            database_url,
            database_max_pool_size,
            server_host,
            server_port,
            jwt_secret,
            jwt_issuer,
            jwt_access_expiry_minutes,
            jwt_refresh_expiry_days,
            upload_dir,
            upload_max_size,
            cors_allowed_origin,
            admin_password,
        })
    }
}

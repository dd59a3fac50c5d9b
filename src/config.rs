use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,

    // Store configuration
    pub store_backend: String,
    pub database_url: String,
    pub database_namespace: String,
    pub database_name: String,
    pub database_username: String,
    pub database_password: String,

    // Authentication configuration
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub enable_registrations: bool,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,

    // Image hosting
    pub cloudinary_base_url: String,
    pub cloudinary_cloud_name: String,
    pub cloudinary_upload_preset: String,
    pub max_upload_size: u64,
    pub http_timeout_secs: u64,

    // Views
    pub products_per_page: usize,
    pub low_stock_threshold: f64,
    pub notification_feed_limit: usize,

    // Bulk import
    pub import_concurrency: usize,

    // Customer catalog
    pub catalog_feed: String,

    // CORS configuration
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "smart_retail_catalog=debug,tower_http=debug".to_string()),

            store_backend: env::var("STORE_BACKEND").unwrap_or_else(|_| "memory".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "ws://localhost:8000".to_string()),
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "smart_retail".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "catalog".to_string()),
            database_username: env::var("DATABASE_USERNAME")
                .unwrap_or_else(|_| "root".to_string()),
            database_password: env::var("DATABASE_PASSWORD")
                .unwrap_or_else(|_| "root".to_string()),

            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "development-secret-change-me".to_string()),
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()?,
            enable_registrations: env::var("ENABLE_REGISTRATIONS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,
            admin_email: env::var("ADMIN_EMAIL").ok().filter(|v| !v.is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),

            cloudinary_base_url: env::var("CLOUDINARY_BASE_URL")
                .unwrap_or_else(|_| "https://api.cloudinary.com".to_string()),
            cloudinary_cloud_name: env::var("CLOUDINARY_CLOUD_NAME")
                .unwrap_or_else(|_| "demo".to_string()),
            cloudinary_upload_preset: env::var("CLOUDINARY_UPLOAD_PRESET")
                .unwrap_or_else(|_| "Smart_Retail".to_string()),
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .unwrap_or_else(|_| "10485760".to_string())
                .parse()?,
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,

            products_per_page: env::var("PRODUCTS_PER_PAGE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            low_stock_threshold: env::var("LOW_STOCK_THRESHOLD")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            notification_feed_limit: env::var("NOTIFICATION_FEED_LIMIT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,

            import_concurrency: env::var("IMPORT_CONCURRENCY")
                .unwrap_or_else(|_| "16".to_string())
                .parse()?,

            catalog_feed: env::var("CATALOG_FEED")
                .unwrap_or_else(|_| "products.json".to_string()),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn uses_surreal(&self) -> bool {
        self.store_backend.eq_ignore_ascii_case("surreal")
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            environment: "development".to_string(),
            log_level: "smart_retail_catalog=debug".to_string(),

            store_backend: "memory".to_string(),
            database_url: "ws://localhost:8000".to_string(),
            database_namespace: "smart_retail".to_string(),
            database_name: "catalog".to_string(),
            database_username: "root".to_string(),
            database_password: "root".to_string(),

            jwt_secret: "development-secret-change-me".to_string(),
            jwt_expiry_hours: 24,
            enable_registrations: false,
            admin_email: None,
            admin_password: None,

            cloudinary_base_url: "https://api.cloudinary.com".to_string(),
            cloudinary_cloud_name: "demo".to_string(),
            cloudinary_upload_preset: "Smart_Retail".to_string(),
            max_upload_size: 10 * 1024 * 1024,
            http_timeout_secs: 30,

            products_per_page: 10,
            low_stock_threshold: 10.0,
            notification_feed_limit: 5,

            import_concurrency: 16,

            catalog_feed: "products.json".to_string(),

            cors_allowed_origins: "http://localhost:5173".to_string(),
        }
    }
}

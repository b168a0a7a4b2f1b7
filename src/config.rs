//! Configuration module

use std::env;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL (sqlite: or postgres:)
    pub database_url: String,

    /// Maximum pooled connections
    pub database_max_connections: u32,

    /// Listen address
    pub host: String,

    /// Server port
    pub port: u16,

    /// ONNX model file
    pub model_path: PathBuf,

    /// Class label file, one label per line
    pub class_names_path: PathBuf,

    /// Predictions below this probability are reported as out of scope
    pub confidence_threshold: f32,

    /// Model input edge length in pixels
    pub image_size: u32,

    /// Maximum request body in bytes
    pub body_limit_bytes: usize,

    /// Directory for uploaded images
    pub upload_dir: PathBuf,

    /// Bearer token guarding admin mutations
    pub admin_token: Option<String>,

    /// OAuth access token for Google Calendar
    pub calendar_token: Option<String>,

    /// Calendar used for consultation events
    pub calendar_id: String,

    /// Environment (development, production)
    pub environment: String,

    /// Emit JSON logs
    pub json_logs: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup, applying defaults and bounds
    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        Self {
            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://leafsense.db?mode=rwc".to_string()),

            database_max_connections: var("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(10),

            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),

            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),

            model_path: var("MODEL_PATH")
                .unwrap_or_else(|| "Medicinal_model.onnx".to_string())
                .into(),

            class_names_path: var("CLASS_NAMES_PATH")
                .unwrap_or_else(|| "class_names.txt".to_string())
                .into(),

            confidence_threshold: var("CONFIDENCE_THRESHOLD")
                .and_then(|t| t.parse::<f32>().ok())
                .filter(|t| t.is_finite())
                .map(|t| t.clamp(0.0, 1.0))
                .unwrap_or(0.5),

            image_size: var("IMAGE_SIZE")
                .and_then(|s| s.parse().ok())
                .filter(|s| *s > 0)
                .unwrap_or(256),

            body_limit_bytes: var("BODY_LIMIT_MB")
                .and_then(|mb| mb.parse::<usize>().ok())
                .unwrap_or(10)
                .saturating_mul(1024 * 1024),

            upload_dir: var("UPLOAD_DIR")
                .unwrap_or_else(|| "uploads".to_string())
                .into(),

            admin_token: non_empty("ADMIN_TOKEN"),

            calendar_token: non_empty("GOOGLE_CALENDAR_TOKEN"),

            calendar_id: var("GOOGLE_CALENDAR_ID")
                .unwrap_or_else(|| "primary".to_string()),

            environment: var("ENVIRONMENT")
                .unwrap_or_else(|| "development".to_string()),

            json_logs: var("LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Database URL with credentials stripped, safe for logs
    pub fn redacted_database_url(&self) -> &str {
        self.database_url.split('@').last().unwrap_or("***")
    }
}

#[cfg(test)]
impl Config {
    /// In-memory database, fallback model and a caller-owned upload directory
    pub fn for_tests(upload_dir: PathBuf) -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            database_max_connections: 1,
            host: "127.0.0.1".to_string(),
            port: 0,
            model_path: upload_dir.join("missing-model.onnx"),
            class_names_path: upload_dir.join("missing-class-names.txt"),
            confidence_threshold: 0.5,
            image_size: 64,
            body_limit_bytes: 10 * 1024 * 1024,
            upload_dir,
            admin_token: None,
            calendar_token: None,
            calendar_id: "primary".to_string(),
            environment: "test".to_string(),
            json_logs: false,
        }
    }
}

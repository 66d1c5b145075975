use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_STORAGE_ROOT: &str = "./storage";
const DEFAULT_MAX_SIZE_MB: u64 = 200;
const DEFAULT_VALIDATION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CORS_ORIGINS: &[&str] = &["https://uploadshp-rh.netlify.app", "http://localhost:3000"];
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub storage_root: PathBuf,
    pub max_upload_bytes: u64,
    pub max_upload_label: String,
    pub validation_timeout: Duration,
    pub cors_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let max_upload_bytes = DEFAULT_MAX_SIZE_MB * BYTES_PER_MB;
        Self {
            port: DEFAULT_PORT,
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            max_upload_bytes,
            max_upload_label: format_bytes(max_upload_bytes),
            validation_timeout: Duration::from_secs(DEFAULT_VALIDATION_TIMEOUT_SECS),
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or unparsable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = lookup("PORT")
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let storage_root = lookup("STORAGE_ROOT")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_root);

        let max_upload_bytes = lookup("UPLOAD_MAX_SIZE_MB")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
            .map(|mb| mb.saturating_mul(BYTES_PER_MB))
            .unwrap_or(defaults.max_upload_bytes);

        let validation_timeout = lookup("VALIDATION_TIMEOUT_SECS")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.validation_timeout);

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or(defaults.cors_origins);

        Self {
            port,
            storage_root,
            max_upload_bytes,
            max_upload_label: format_bytes(max_upload_bytes),
            validation_timeout,
            cors_origins,
        }
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    if bytes >= GB && bytes % GB == 0 {
        format!("{}GB", bytes / GB)
    } else if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{}KB", bytes / KB)
    } else {
        format!("{}B", bytes)
    }
}

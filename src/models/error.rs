use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    #[error("Archive must contain at least one geometry file (.shp)")]
    NoGeometryFound,

    #[error("Unknown activity: {0}")]
    UnknownActivity(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Shapefile validation failed")]
    Rejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Validation timed out after {0}s")]
    Timeout(u64),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> u16 {
        match self {
            AppError::MalformedArchive(_) => 4001,
            AppError::NoGeometryFound => 4002,
            AppError::UnknownActivity(_) => 4003,
            AppError::InvalidRequest(_) => 4000,
            AppError::Rejected(_) => 4220,
            AppError::NotFound(_) => 4004,
            AppError::PayloadTooLarge(_) => 4013,
            AppError::Timeout(_) => 5040,
            AppError::Storage(_) => 5002,
            AppError::Io(_) => 5001,
            AppError::Internal(_) => 5000,
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::MalformedArchive(_) => "Not a valid ZIP archive".to_string(),
            AppError::NoGeometryFound => {
                "Archive must contain at least one geometry file (.shp)".to_string()
            }
            AppError::UnknownActivity(label) => format!("Unknown activity '{}'", label),
            AppError::InvalidRequest(msg) => msg.clone(),
            AppError::Rejected(_) => "Shapefile validation failed".to_string(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::PayloadTooLarge(msg) => msg.clone(),
            AppError::Timeout(secs) => format!("Validation did not finish within {}s", secs),
            AppError::Storage(msg) => msg.clone(),
            AppError::Io(msg) => msg.clone(),
            AppError::Internal(msg) => msg.clone(),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            AppError::MalformedArchive(_)
            | AppError::NoGeometryFound
            | AppError::UnknownActivity(_)
            | AppError::InvalidRequest(_) => 400,
            AppError::NotFound(_) => 404,
            AppError::PayloadTooLarge(_) => 413,
            AppError::Rejected(_) => 422,
            AppError::Timeout(_) => 504,
            AppError::Storage(_) | AppError::Io(_) | AppError::Internal(_) => 500,
        }
    }

    /// The rejection report is surfaced verbatim; everything else gets a short prefix.
    pub fn detail(&self) -> Option<String> {
        match self {
            AppError::MalformedArchive(msg) => Some(format!("Decompression failed: {}", msg)),
            AppError::NoGeometryFound => None,
            AppError::UnknownActivity(_) => Some(format!(
                "Activity must be one of: {}",
                crate::services::schema::Activity::labels().join(", ")
            )),
            AppError::InvalidRequest(_) => None,
            AppError::Rejected(report) => Some(report.clone()),
            AppError::NotFound(_) => None,
            AppError::PayloadTooLarge(_) => None,
            AppError::Timeout(_) => Some("Partial results were discarded".to_string()),
            AppError::Storage(msg) => Some(format!("Storage operation failed: {}", msg)),
            AppError::Io(msg) => Some(format!("File operation failed: {}", msg)),
            AppError::Internal(msg) => Some(format!("Internal error: {}", msg)),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(err: zip::result::ZipError) -> Self {
        AppError::MalformedArchive(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidRequest(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

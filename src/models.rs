pub mod error;
pub use error::{AppError, Result};

use crate::services::schema::Activity;
use crate::services::validator::ArchiveReport;
use serde::{Deserialize, Serialize};

/// Body of `POST /validate-shapefile`. Fields are optional so a missing one
/// gets our own message instead of a generic JSON rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidateStoredRequest {
    pub zip_path: Option<String>,
    pub bucket: Option<String>,
}

/// An archive that passed validation and was written to its activity bucket.
#[derive(Debug, Clone, Serialize)]
pub struct StoredUpload {
    #[serde(rename = "fileName")]
    pub file_name: String,
    pub bucket: Activity,
    pub path: String,
    pub size: u64,
    #[serde(rename = "uploadedAt")]
    pub uploaded_at: String,
}

#[derive(Debug, Clone)]
pub enum StoredCheck {
    Missing {
        file_name: String,
        bucket: Activity,
        root_contents: Vec<String>,
    },
    Checked {
        file_name: String,
        bucket: Activity,
        path: String,
        report: ArchiveReport,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "OK",
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

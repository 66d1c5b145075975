use crate::models::{AppError, Result, StoredCheck, StoredUpload, ValidateStoredRequest};
use crate::services::schema::Activity;
use crate::services::validator::{self, ArchiveReport};
use crate::storage::Storage;
use bytes::Bytes;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

const SHAPEFILE_FOLDER: &str = "shapefiles";
const ZIP_PATH_PATTERN: &str = r"^shapefiles/([A-Za-z0-9._ -]+\.(?i:zip))$";

#[derive(Clone)]
pub struct ValidationService {
    storage: Storage,
    timeout: Duration,
}

impl ValidationService {
    pub fn new(storage: Storage, timeout: Duration) -> Self {
        Self { storage, timeout }
    }

    /// Runs the validator off the async runtime, bounded by the configured timeout.
    /// A timed-out run is abandoned and its partial results are dropped.
    pub async fn validate_archive(&self, bytes: Bytes, activity: Activity) -> Result<ArchiveReport> {
        let size = bytes.len();
        let task = tokio::task::spawn_blocking(move || validator::validate(bytes, activity));

        let report = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => return Err(AppError::Internal(format!("Validation task failed: {}", e))),
            Err(_) => {
                warn!(
                    "Validation of {} byte archive for {} exceeded {:?}",
                    size, activity, self.timeout
                );
                return Err(AppError::Timeout(self.timeout.as_secs()));
            }
        };

        info!(
            "Validated {} unit(s) for {}: {}",
            report.units.len(),
            activity,
            if report.is_valid() { "valid" } else { "invalid" }
        );
        Ok(report)
    }

    /// Validates an upload and, only when every unit passes, stores it in the
    /// activity's bucket.
    pub async fn accept_upload(
        &self,
        bytes: Bytes,
        original_name: &str,
        activity: Activity,
    ) -> Result<(StoredUpload, ArchiveReport)> {
        info!("Processing shapefile upload: {} ({})", original_name, activity);

        let file_name = std::path::Path::new(original_name)
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| AppError::InvalidRequest("Invalid file name".to_string()))?
            .to_string();
        let path = format!("{}/{}", SHAPEFILE_FOLDER, file_name);
        parse_zip_path(&path)?;

        let size = bytes.len() as u64;
        let report = self.validate_archive(bytes.clone(), activity).await?;
        if !report.is_valid() {
            return Err(AppError::Rejected(report.render()));
        }

        self.storage.write(activity.label(), &path, &bytes).await?;

        let upload = StoredUpload {
            file_name,
            bucket: activity,
            path,
            size,
            uploaded_at: chrono::Utc::now().to_rfc3339(),
        };
        Ok((upload, report))
    }

    /// Looks up an archive already sitting in a bucket and validates it
    /// against the schema of the activity the bucket belongs to.
    pub async fn validate_stored(&self, request: ValidateStoredRequest) -> Result<StoredCheck> {
        let (zip_path, bucket) = match (request.zip_path, request.bucket) {
            (Some(zip_path), Some(bucket)) if !zip_path.is_empty() && !bucket.is_empty() => {
                (zip_path, bucket)
            }
            (zip_path, bucket) => {
                warn!("Missing parameters: zip_path={:?} bucket={:?}", zip_path, bucket);
                return Err(AppError::InvalidRequest(
                    "zip_path and bucket are both required".to_string(),
                ));
            }
        };

        let activity: Activity = bucket.parse().map_err(|_| {
            warn!("Invalid bucket: {}", bucket);
            AppError::InvalidRequest(format!(
                "Invalid bucket! Must be one of: {}.",
                Activity::labels().join(", ")
            ))
        })?;

        let file_name = parse_zip_path(&zip_path)?;
        info!("Looking up {} in {}/{}", file_name, bucket, SHAPEFILE_FOLDER);

        if !self.storage.exists(activity.label(), &zip_path).await? {
            let root_contents = self.storage.list(activity.label(), "").await?;
            warn!("File {} not found in {}/{}", file_name, bucket, SHAPEFILE_FOLDER);
            return Ok(StoredCheck::Missing {
                file_name,
                bucket: activity,
                root_contents,
            });
        }

        let bytes = self.storage.read(activity.label(), &zip_path).await?;
        let report = self.validate_archive(bytes, activity).await?;

        Ok(StoredCheck::Checked {
            file_name,
            bucket: activity,
            path: zip_path,
            report,
        })
    }
}

fn zip_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(ZIP_PATH_PATTERN).expect("zip path pattern compiles"))
}

/// Accepts `shapefiles/<name>.zip` (extension in any case) and returns `<name>.zip`.
pub fn parse_zip_path(zip_path: &str) -> Result<String> {
    zip_path_pattern()
        .captures(zip_path)
        .and_then(|caps| caps.get(1))
        .map(|name| name.as_str().to_string())
        .filter(|name| !name.starts_with('.'))
        .ok_or_else(|| {
            AppError::InvalidRequest(
                "zip_path must be in the form shapefiles/<file_name>.zip".to_string(),
            )
        })
}

pub mod config;
pub mod models;
pub mod services;
pub mod storage;

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

pub use config::AppConfig;
use models::{AppError, HealthStatus, Result, StoredCheck, ValidateStoredRequest};
use services::schema::{all_schemas, Activity};
use services::validator::ArchiveReport;
pub use services::ValidationService;
pub use storage::Storage;

/// Room for multipart framing on top of the archive itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Storage,
    pub validation_service: ValidationService,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let storage = Storage::new(config.storage_root.clone());
        let validation_service = ValidationService::new(storage.clone(), config.validation_timeout);
        Self {
            config: Arc::new(config),
            storage,
            validation_service,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health))
        .route("/activities", get(list_activities))
        .route("/validate", post(validate_upload))
        .route("/upload", post(upload_shapefile))
        .route("/validate-shapefile", post(validate_stored_shapefile))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn health() -> impl IntoResponse {
    Json(HealthStatus::ok())
}

async fn list_activities() -> impl IntoResponse {
    Json(serde_json::json!({ "activities": all_schemas() }))
}

struct UploadForm {
    file_name: String,
    bytes: Bytes,
    activity: Activity,
}

async fn read_upload_form(mut multipart: Multipart, max_size: u64, max_label: &str) -> Result<UploadForm> {
    let mut file: Option<(String, Bytes)> = None;
    let mut activity: Option<String> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.zip").to_string();
                let mut buf = BytesMut::new();
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    if (buf.len() + chunk.len()) as u64 > max_size {
                        return Err(AppError::PayloadTooLarge(format!(
                            "File too large (max {})",
                            max_label
                        )));
                    }
                    buf.extend_from_slice(&chunk);
                }
                file = Some((file_name, buf.freeze()));
            }
            "activity" => {
                activity = Some(field.text().await.map_err(multipart_error)?.trim().to_string());
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| {
        AppError::InvalidRequest("No file uploaded; provide a shapefile ZIP archive".to_string())
    })?;
    let activity = activity
        .ok_or_else(|| AppError::InvalidRequest("activity is required".to_string()))?
        .parse::<Activity>()?;

    Ok(UploadForm {
        file_name,
        bytes,
        activity,
    })
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::InvalidRequest(format!("Failed to parse multipart form: {}", err.body_text()))
    }
}

/// Validates an uploaded archive without storing it.
async fn validate_upload(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = match read_upload_form(
        multipart,
        state.config.max_upload_bytes,
        &state.config.max_upload_label,
    )
    .await
    {
        Ok(form) => form,
        Err(e) => return e.into_response(),
    };

    info!("Validating {} for {}", form.file_name, form.activity);

    match state
        .validation_service
        .validate_archive(form.bytes, form.activity)
        .await
    {
        Ok(report) => report_response(&report, serde_json::Map::new()),
        Err(e) => e.into_response(),
    }
}

/// Validates an uploaded archive and stores it in the activity's bucket when it passes.
async fn upload_shapefile(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = match read_upload_form(
        multipart,
        state.config.max_upload_bytes,
        &state.config.max_upload_label,
    )
    .await
    {
        Ok(form) => form,
        Err(e) => return e.into_response(),
    };

    match state
        .validation_service
        .accept_upload(form.bytes, &form.file_name, form.activity)
        .await
    {
        Ok((upload, report)) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "success": true,
                "message": report.render(),
                "upload": upload,
                "units": report.units,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Validates an archive already present in a bucket's `shapefiles` folder.
/// An absent or unparsable body counts as missing parameters.
async fn validate_stored_shapefile(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ValidateStoredRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Unreadable validation request body: {}", rejection.body_text());
            ValidateStoredRequest::default()
        }
    };

    info!(
        "Validation request: zip_path={:?} bucket={:?}",
        request.zip_path, request.bucket
    );

    match state.validation_service.validate_stored(request).await {
        Ok(StoredCheck::Missing {
            file_name,
            bucket,
            root_contents,
        }) => {
            let missing = AppError::NotFound(format!(
                "File {} not found in bucket {}/shapefiles",
                file_name, bucket
            ));
            let mut body = error_body(&missing);
            body["rootContents"] = root_contents.into();
            (StatusCode::NOT_FOUND, Json(body)).into_response()
        }
        Ok(StoredCheck::Checked {
            file_name,
            bucket,
            path,
            report,
        }) => {
            let mut extra = serde_json::Map::new();
            extra.insert("fileName".to_string(), file_name.into());
            extra.insert("bucket".to_string(), bucket.label().into());
            extra.insert("path".to_string(), path.into());
            report_response(&report, extra)
        }
        Err(e) => e.into_response(),
    }
}

/// 200 with the confirmation when every unit passed, 422 with the full
/// defect report otherwise. `extra` keys are merged into the body.
fn report_response(report: &ArchiveReport, extra: serde_json::Map<String, serde_json::Value>) -> Response {
    let valid = report.is_valid();
    let text = report.render();

    let mut body = serde_json::json!({
        "success": valid,
        "valid": valid,
        "activity": report.activity,
        "units": report.units,
    });

    let status = if valid {
        body["message"] = serde_json::Value::String(text);
        StatusCode::OK
    } else {
        let rejection = error_body(&AppError::Rejected(text));
        body["error"] = rejection["error"].clone();
        StatusCode::UNPROCESSABLE_ENTITY
    };

    if let Some(object) = body.as_object_mut() {
        object.extend(extra);
    }

    (status, Json(body)).into_response()
}

fn error_body(err: &AppError) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "error": {
            "code": err.code(),
            "message": err.message(),
            "detail": err.detail()
        }
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        (status, Json(error_body(&self))).into_response()
    }
}

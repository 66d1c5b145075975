use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use shpgate::{build_router, services::schema::Activity, AppConfig, AppState};
use std::io::{Cursor, Write};
use tempfile::TempDir;
use tower::ServiceExt;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const BOUNDARY: &str = "shpgate-test-boundary";

pub fn test_app() -> (Router, TempDir) {
    test_app_with(AppConfig::default())
}

/// Router over `config` with its storage root moved into a fresh temp dir.
pub fn test_app_with(config: AppConfig) -> (Router, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = AppConfig {
        storage_root: dir.path().to_path_buf(),
        ..config
    };
    (build_router(AppState::new(config)), dir)
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub fn multipart_request(uri: &str, filename: &str, bytes: &[u8], activity: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    if let Some(activity) = activity {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"activity\"\r\n\r\n{activity}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/zip\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

pub fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// dBase III table with every column as character data except `LUAS_HA`.
pub fn dbf(columns: &[&str], rows: &[Vec<&str>]) -> Vec<u8> {
    let widths: Vec<(u8, u8)> = columns
        .iter()
        .map(|name| if *name == "LUAS_HA" { (b'N', 12) } else { (b'C', 20) })
        .collect();
    let header_len = 32 + 32 * columns.len() + 1;
    let record_len = 1 + widths.iter().map(|(_, w)| *w as usize).sum::<usize>();

    let mut out = vec![0x03, 124, 1, 1];
    out.extend_from_slice(&(rows.len() as u32).to_le_bytes());
    out.extend_from_slice(&(header_len as u16).to_le_bytes());
    out.extend_from_slice(&(record_len as u16).to_le_bytes());
    out.extend_from_slice(&[0u8; 20]);
    for (name, (kind, width)) in columns.iter().zip(&widths) {
        let mut descriptor = [0u8; 32];
        descriptor[..name.len()].copy_from_slice(name.as_bytes());
        descriptor[11] = *kind;
        descriptor[16] = *width;
        out.extend_from_slice(&descriptor);
    }
    out.push(0x0D);
    for row in rows {
        out.push(b' ');
        for (value, (_, width)) in row.iter().zip(&widths) {
            let width = *width as usize;
            out.extend_from_slice(format!("{:<width$}", value, width = width).as_bytes());
        }
    }
    out.push(0x1A);
    out
}

pub fn zip_bytes(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options).expect("Failed to create zip entry");
        zip.write_all(bytes).expect("Failed to write zip entry");
    }
    zip.finish().expect("Failed to finish zip").into_inner()
}

pub fn unit(base: &str, table: Vec<u8>) -> Vec<(String, Vec<u8>)> {
    vec![
        (format!("{base}.shp"), vec![0u8; 100]),
        (format!("{base}.shx"), vec![0u8; 100]),
        (format!("{base}.dbf"), table),
    ]
}

/// One row filling every required column; `LUAS_HA` gets `area`.
pub fn compliant_table(activity: Activity, area: &str) -> Vec<u8> {
    let columns = activity.required_fields();
    let row: Vec<&str> = columns
        .iter()
        .map(|name| if *name == "LUAS_HA" { area } else { "1" })
        .collect();
    dbf(columns, &[row])
}

pub fn compliant_archive(activity: Activity) -> Vec<u8> {
    zip_bytes(&unit("plots/blok_a", compliant_table(activity, "4.25")))
}

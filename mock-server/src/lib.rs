use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, delete, get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Upper bound for `/bytes/{n}`.
pub const MAX_BYTES: usize = 100 * 1024;

/// Upper bound for `/delay/{ms}`.
pub const MAX_DELAY_MS: u64 = 10_000;

/// What the echo routes saw of the request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub args: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub data: String,
    pub json: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Upload {
    pub fields: Vec<(String, String)>,
    pub files: BTreeMap<String, UploadedFile>,
}

pub fn app() -> Router {
    Router::new()
        .route("/get", get(echo))
        .route("/post", post(echo))
        .route("/put", put(echo))
        .route("/patch", patch(echo))
        .route("/delete", delete(echo))
        .route("/status/{code}", any(status))
        .route("/delay/{ms}", any(delay))
        .route("/bytes/{n}", get(bytes))
        .route("/headers", get(headers))
        .route("/upload", post(upload))
        .route("/empty", any(empty))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect()
}

async fn echo(
    method: Method,
    Query(args): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Echo> {
    let data = String::from_utf8_lossy(&body).into_owned();
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    let json = if is_json { serde_json::from_slice(&body).ok() } else { None };
    tracing::debug!(%method, args = args.len(), "echo");

    Json(Echo {
        method: method.to_string(),
        args,
        headers: header_map(&headers),
        data,
        json,
    })
}

async fn status(Path(code): Path<u16>) -> Response {
    let Ok(status) = StatusCode::from_u16(code) else {
        return (StatusCode::BAD_REQUEST, "invalid status code").into_response();
    };
    match status {
        StatusCode::IM_A_TEAPOT => (status, "Teapot").into_response(),
        _ => status.into_response(),
    }
}

async fn delay(Path(ms): Path<u64>) -> Json<serde_json::Value> {
    let ms = ms.min(MAX_DELAY_MS);
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(serde_json::json!({ "delay": ms }))
}

async fn bytes(Path(n): Path<usize>) -> Response {
    let payload: Vec<u8> = (0..n.min(MAX_BYTES)).map(|i| (i % 256) as u8).collect();
    ([(header::CONTENT_TYPE, "application/octet-stream")], payload).into_response()
}

async fn headers(headers: HeaderMap) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "headers": header_map(&headers) }))
}

async fn upload(mut multipart: Multipart) -> Result<Json<Upload>, (StatusCode, String)> {
    let mut upload = Upload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?;

        match filename {
            Some(filename) => {
                upload.files.insert(
                    name,
                    UploadedFile {
                        filename: Some(filename),
                        content_type,
                        size: data.len(),
                    },
                );
            }
            None => upload.fields.push((name, String::from_utf8_lossy(&data).into_owned())),
        }
    }
    tracing::debug!(fields = upload.fields.len(), files = upload.files.len(), "upload");
    Ok(Json(upload))
}

async fn empty() -> StatusCode {
    StatusCode::NO_CONTENT
}

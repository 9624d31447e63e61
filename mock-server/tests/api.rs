use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Echo, Upload, MAX_BYTES};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder().method(method).uri(uri).body(String::new()).unwrap()
}

// --- echo ---

#[tokio::test]
async fn get_echoes_query_and_headers() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/get?q=ann&tags%5B%5D=a&tags%5B%5D=b")
                .header("X-Trace", "abc")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "GET");
    assert_eq!(
        echo.args,
        vec![
            ("q".to_string(), "ann".to_string()),
            ("tags[]".to_string(), "a".to_string()),
            ("tags[]".to_string(), "b".to_string()),
        ]
    );
    assert_eq!(echo.headers.get("x-trace").map(String::as_str), Some("abc"));
}

#[tokio::test]
async fn post_echoes_json_body() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/post")
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(r#"{"title":"Buy milk"}"#.to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.json, Some(serde_json::json!({"title": "Buy milk"})));
    assert_eq!(echo.data, r#"{"title":"Buy milk"}"#);
}

#[tokio::test]
async fn form_body_is_echoed_as_data() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/put")
                .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body("a=1&b=two".to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "PUT");
    assert_eq!(echo.data, "a=1&b=two");
    assert!(echo.json.is_none());
}

#[tokio::test]
async fn echo_routes_reject_other_methods() {
    let resp = app().oneshot(empty_request("POST", "/get")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// --- status ---

#[tokio::test]
async fn teapot_has_a_body() {
    let resp = app().oneshot(empty_request("GET", "/status/418")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(body_bytes(resp).await, "Teapot");
}

#[tokio::test]
async fn status_echoes_any_method() {
    let resp = app().oneshot(empty_request("DELETE", "/status/503")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn invalid_status_is_rejected() {
    let resp = app().oneshot(empty_request("GET", "/status/99")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- delay, bytes, empty ---

#[tokio::test(start_paused = true)]
async fn delay_waits_before_answering() {
    let start = tokio::time::Instant::now();
    let resp = app().oneshot(empty_request("GET", "/delay/250")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(start.elapsed() >= std::time::Duration::from_millis(250));
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["delay"], 250);
}

#[tokio::test]
async fn bytes_returns_n_octets() {
    let resp = app().oneshot(empty_request("GET", "/bytes/300")).await.unwrap();
    assert_eq!(
        resp.headers().get(http::header::CONTENT_TYPE).unwrap(),
        "application/octet-stream"
    );
    let body = body_bytes(resp).await;
    assert_eq!(body.len(), 300);
    assert_eq!(body[0], 0);
    assert_eq!(body[257], 1);
}

#[tokio::test]
async fn bytes_is_capped() {
    let resp = app()
        .oneshot(empty_request("GET", &format!("/bytes/{}", MAX_BYTES * 2)))
        .await
        .unwrap();
    assert_eq!(body_bytes(resp).await.len(), MAX_BYTES);
}

#[tokio::test]
async fn empty_returns_204() {
    let resp = app().oneshot(empty_request("HEAD", "/empty")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());
}

// --- headers ---

#[tokio::test]
async fn headers_are_reported_lowercase() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/headers")
                .header("Authorization", "Bearer t0k")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["headers"]["authorization"], "Bearer t0k");
}

// --- upload ---

#[tokio::test]
async fn upload_reports_fields_and_files() {
    let body = concat!(
        "--B\r\n",
        "Content-Disposition: form-data; name=\"foo\"\r\n\r\n",
        "bar\r\n",
        "--B\r\n",
        "Content-Disposition: form-data; name=\"report\"; filename=\"r.txt\"\r\n",
        "Content-Type: text/plain\r\n\r\n",
        "hello\r\n",
        "--B--\r\n",
    );
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(http::header::CONTENT_TYPE, "multipart/form-data; boundary=B")
                .body(body.to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let upload: Upload = body_json(resp).await;
    assert_eq!(upload.fields, vec![("foo".to_string(), "bar".to_string())]);
    let file = &upload.files["report"];
    assert_eq!(file.filename.as_deref(), Some("r.txt"));
    assert_eq!(file.content_type.as_deref(), Some("text/plain"));
    assert_eq!(file.size, 5);
}

#[tokio::test]
async fn upload_without_multipart_is_rejected() {
    let resp = app().oneshot(empty_request("POST", "/upload")).await.unwrap();
    assert!(resp.status().is_client_error());
}

use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Echo, Part};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn post(uri: &str, content_type: &str, body: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, content_type)
        .body(body.to_string())
        .unwrap()
}

fn empty_post(uri: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(String::new())
        .unwrap()
}

// --- echo ---

#[tokio::test]
async fn echo_reports_body_and_headers() {
    let req = Request::builder()
        .method("POST")
        .uri("/echo")
        .header("x-trace", "abc")
        .header(http::header::AUTHORIZATION, "Basic eDp5")
        .body("raw payload".to_string())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.body, "raw payload");
    assert_eq!(echo.authorization.as_deref(), Some("Basic eDp5"));
    assert_eq!(echo.headers.get("x-trace").map(String::as_str), Some("abc"));
    assert!(echo.content_type.is_none());
}

#[tokio::test]
async fn echo_rejects_get() {
    let req = Request::builder()
        .uri("/echo")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// --- form ---

#[tokio::test]
async fn form_decodes_percent_encoded_values() {
    let resp = app()
        .oneshot(post(
            "/form",
            "application/x-www-form-urlencoded",
            "a=x+y&b=1%262&",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let pairs: Vec<(String, String)> = body_json(resp).await;
    assert_eq!(
        pairs,
        vec![
            ("a".to_string(), "x y".to_string()),
            ("b".to_string(), "1&2".to_string()),
        ]
    );
}

#[tokio::test]
async fn form_without_content_type_is_rejected() {
    let resp = app().oneshot(empty_post("/form")).await.unwrap();
    assert!(resp.status().is_client_error());
}

// --- multipart ---

#[tokio::test]
async fn multipart_lists_parts() {
    let body = "--B\r\n\
        Content-Disposition: form-data; name=\"sender\"\r\n\r\n\
        John\r\n\
        --B\r\n\
        Content-Disposition: form-data; name=\"pic\"; filename=\"pic.jpg\"\r\n\
        Content-Type: application/octet-stream\r\n\r\n\
        JPEG\r\n\
        --B--\r\n";
    let resp = app()
        .oneshot(post("/multipart", "multipart/form-data; boundary=B", body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let parts: Vec<Part> = body_json(resp).await;
    assert_eq!(
        parts,
        vec![
            Part {
                name: "sender".to_string(),
                file_name: None,
                content: "John".to_string(),
            },
            Part {
                name: "pic".to_string(),
                file_name: Some("pic.jpg".to_string()),
                content: "JPEG".to_string(),
            },
        ]
    );
}

// --- sized bodies and status codes ---

#[tokio::test]
async fn bytes_returns_requested_length() {
    let resp = app().oneshot(empty_post("/bytes/2048")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_bytes(resp).await;
    assert_eq!(body.len(), 2048);
    assert!(body.iter().all(|b| *b == b'x'));
}

#[tokio::test]
async fn status_returns_requested_code() {
    let resp = app().oneshot(empty_post("/status/503")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn status_rejects_invalid_code() {
    let resp = app().oneshot(empty_post("/status/42")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn redirect_points_at_echo() {
    let resp = app().oneshot(empty_post("/redirect")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()[http::header::LOCATION], "/echo");
}

// --- timing ---

#[tokio::test]
async fn slow_answers_after_delay() {
    let resp = app().oneshot(empty_post("/slow/10")).await.unwrap();
    assert_eq!(body_bytes(resp).await, "done");
}

#[tokio::test]
async fn flaky_counts_hits_per_app() {
    let app = app();
    let first = app.clone().oneshot(empty_post("/flaky/10")).await.unwrap();
    assert_eq!(body_bytes(first).await, "attempt 1");
    let second = app.oneshot(empty_post("/flaky/10")).await.unwrap();
    assert_eq!(body_bytes(second).await, "attempt 2");
}

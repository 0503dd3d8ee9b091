use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    routing::post,
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// What `/echo` saw of the request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// One decoded part of a `multipart/form-data` body.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub file_name: Option<String>,
    pub content: String,
}

#[derive(Clone, Default)]
pub struct AppState {
    flaky_hits: Arc<AtomicUsize>,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", post(echo))
        .route("/form", post(form))
        .route("/multipart", post(multipart))
        .route("/bytes/{n}", post(sized_body))
        .route("/slow/{ms}", post(slow))
        .route("/flaky/{ms}", post(flaky))
        .route("/status/{code}", post(status))
        .route("/redirect", post(redirect))
        .with_state(AppState::default())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<Echo> {
    let header_text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let all = headers
        .iter()
        .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
        .collect();
    Json(Echo {
        method: method.to_string(),
        content_type: header_text(header::CONTENT_TYPE),
        authorization: header_text(header::AUTHORIZATION),
        headers: all,
        body,
    })
}

async fn form(Form(pairs): Form<Vec<(String, String)>>) -> Json<Vec<(String, String)>> {
    Json(pairs)
}

async fn multipart(mut multipart: Multipart) -> Result<Json<Vec<Part>>, StatusCode> {
    let mut parts = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        parts.push(Part {
            name,
            file_name,
            content: String::from_utf8_lossy(&data).into_owned(),
        });
    }
    Ok(Json(parts))
}

async fn sized_body(Path(n): Path<usize>) -> Vec<u8> {
    vec![b'x'; n]
}

async fn slow(Path(ms): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "done"
}

/// Sleeps `ms` on the first hit only; later hits answer at once.
async fn flaky(State(state): State<AppState>, Path(ms): Path<u64>) -> String {
    let hit = state.flaky_hits.fetch_add(1, Ordering::SeqCst) + 1;
    if hit == 1 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
    format!("attempt {hit}")
}

/// `302` to `/echo`, which only answers POST.
async fn redirect() -> (StatusCode, [(header::HeaderName, &'static str); 1]) {
    (StatusCode::FOUND, [(header::LOCATION, "/echo")])
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

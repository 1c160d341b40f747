#![allow(dead_code)]
//! Mock archivers for integration tests.
//!
//! Each mock is a real axum server on `127.0.0.1:0`. `GET /archivers` returns
//! the mock's active list, any other path returns `{"path", "servedBy", "tag"}`
//! (`tag` echoes the `x-archiver-tag` request header), both shaped by the
//! configured [`Behavior`].

use archiver_discovery::crypto::public_key_hex;
use archiver_discovery::{CandidateEndpoint, Endpoint, sign_payload};
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// How a mock archiver answers every request.
#[derive(Clone)]
pub enum Behavior {
    /// Signed 200 response
    Healthy,
    /// Signed body with a 500 status
    ServerError,
    /// 200 with an empty body
    EmptyBody,
    /// 200 with JSON `null`
    NullBody,
    /// 200 with a body that is not JSON
    NotJson,
    /// 200 without a `sign` envelope
    Unsigned,
    /// Signed, then altered after signing
    Forged,
    /// Signed by the given key instead of the archiver's own
    SignedBy(SigningKey),
    /// Healthy, after a delay
    Slow(Duration),
}

struct MockState {
    key: SigningKey,
    behavior: Behavior,
    active: Vec<Value>,
    hits: AtomicUsize,
}

pub struct MockArchiver {
    pub endpoint: Endpoint,
    state: Arc<MockState>,
}

impl MockArchiver {
    pub async fn start(behavior: Behavior) -> Self {
        Self::start_with_active(behavior, Vec::new()).await
    }

    /// Start an archiver whose `/archivers` list holds itself followed by `others`.
    pub async fn start_with_active(behavior: Behavior, others: Vec<Value>) -> Self {
        let key = SigningKey::generate(&mut OsRng);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let endpoint = Endpoint::new("127.0.0.1", port, public_key_hex(&key));

        let mut active = vec![serde_json::to_value(&endpoint).unwrap()];
        active.extend(others);

        let state = Arc::new(MockState {
            key,
            behavior,
            active,
            hits: AtomicUsize::new(0),
        });

        let app = Router::new().fallback(handle).with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { endpoint, state }
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn candidate(&self) -> CandidateEndpoint {
        self.endpoint.clone().into()
    }
}

pub const TAG_HEADER: &str = "x-archiver-tag";

async fn handle(State(state): State<Arc<MockState>>, headers: HeaderMap, uri: Uri) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let path = uri.path().trim_start_matches('/');
    let body = if path == "archivers" {
        json!({"activeArchivers": state.active})
    } else {
        let tag = headers.get(TAG_HEADER).and_then(|v| v.to_str().ok());
        json!({"path": path, "servedBy": public_key_hex(&state.key), "tag": tag})
    };

    match &state.behavior {
        Behavior::Healthy => axum::Json(sign_payload(&state.key, body).unwrap()).into_response(),
        Behavior::ServerError => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(sign_payload(&state.key, body).unwrap()),
        )
            .into_response(),
        Behavior::EmptyBody => StatusCode::OK.into_response(),
        Behavior::NullBody => axum::Json(Value::Null).into_response(),
        Behavior::NotJson => (StatusCode::OK, "not json").into_response(),
        Behavior::Unsigned => axum::Json(body).into_response(),
        Behavior::Forged => {
            let mut signed = sign_payload(&state.key, body).unwrap();
            if let Some(list) = signed
                .get_mut("activeArchivers")
                .and_then(Value::as_array_mut)
            {
                list.push(json!({"ip": "6.6.6.6", "port": 6666, "publicKey": "injected"}));
            } else {
                signed["servedBy"] = json!("injected");
            }
            axum::Json(signed).into_response()
        }
        Behavior::SignedBy(other) => axum::Json(sign_payload(other, body).unwrap()).into_response(),
        Behavior::Slow(delay) => {
            tokio::time::sleep(*delay).await;
            axum::Json(sign_payload(&state.key, body).unwrap()).into_response()
        }
    }
}

/// An endpoint on a port with nothing listening.
pub async fn dead_endpoint(public_key: &str) -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Endpoint::new("127.0.0.1", port, public_key)
}

/// An archiver speaking raw HTTP/1.1 that answers every connection with
/// `status_line` (e.g. `600 Weird`) and a JSON `body`.
pub async fn raw_http_endpoint(public_key: &str, status_line: &str, body: &str) -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
    );

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let response = response.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Endpoint::new("127.0.0.1", port, public_key)
}

/// Serve `seed_list` at `GET /seed.json` and return its URL.
pub async fn serve_seed_list(seed_list: Value) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route(
        "/seed.json",
        axum::routing::get(move || async move { axum::Json(seed_list) }),
    );
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/seed.json", addr)
}

pub fn served_by(value: &Value) -> &str {
    value["servedBy"].as_str().unwrap_or_default()
}

pub fn keys(roster: &[Endpoint]) -> Vec<String> {
    roster.iter().map(|e| e.public_key.clone()).collect()
}

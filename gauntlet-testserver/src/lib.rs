use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_CHAT: &str = "/api/chat";
pub const PATH_SEARCH: &str = "/api/search";
pub const PATH_LOGIN: &str = "/api/auth/login";

/// How the server misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestServerOptions {
    /// Added before every response.
    pub latency: Duration,
    /// Every n-th request (across all routes) answers with `failure_status`.
    pub fail_every: Option<u64>,
    pub failure_status: u16,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            fail_every: None,
            failure_status: 503,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    chat: Arc<AtomicU64>,
    search: Arc<AtomicU64>,
    login: Arc<AtomicU64>,
    injected_failures: Arc<AtomicU64>,
    bad_requests: Arc<AtomicU64>,
    saw_json_content_type: Arc<AtomicU64>,
    saw_user_agent: Arc<AtomicU64>,
    last_search: Arc<Mutex<Option<(String, String)>>>,
}

impl TestServerStats {
    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn chat(&self) -> u64 {
        self.chat.load(Ordering::Relaxed)
    }

    pub fn search(&self) -> u64 {
        self.search.load(Ordering::Relaxed)
    }

    pub fn login(&self) -> u64 {
        self.login.load(Ordering::Relaxed)
    }

    pub fn injected_failures(&self) -> u64 {
        self.injected_failures.load(Ordering::Relaxed)
    }

    pub fn bad_requests(&self) -> u64 {
        self.bad_requests.load(Ordering::Relaxed)
    }

    pub fn saw_json_content_type(&self) -> u64 {
        self.saw_json_content_type.load(Ordering::Relaxed)
    }

    pub fn saw_user_agent(&self) -> u64 {
        self.saw_user_agent.load(Ordering::Relaxed)
    }

    /// Decoded `(q, userId)` of the latest search.
    pub fn last_search(&self) -> Option<(String, String)> {
        self.last_search.lock().clone()
    }
}

#[derive(Debug, Clone)]
struct AppState {
    options: TestServerOptions,
    stats: TestServerStats,
}

impl AppState {
    /// Common request prologue. Returns the injected failure status, if any.
    async fn begin(&self, headers: &HeaderMap) -> Option<StatusCode> {
        let n = self.stats.requests_total.fetch_add(1, Ordering::Relaxed) + 1;
        if headers.contains_key("user-agent") {
            self.stats.saw_user_agent.fetch_add(1, Ordering::Relaxed);
        }
        if !self.options.latency.is_zero() {
            sleep(self.options.latency).await;
        }
        match self.options.fail_every {
            Some(every) if every > 0 && n % every == 0 => {
                self.stats.injected_failures.fetch_add(1, Ordering::Relaxed);
                Some(
                    StatusCode::from_u16(self.options.failure_status)
                        .unwrap_or(StatusCode::SERVICE_UNAVAILABLE),
                )
            }
            _ => None,
        }
    }

    fn note_json(&self, headers: &HeaderMap) {
        if headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().starts_with("application/json"))
        {
            self.stats.saw_json_content_type.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn bad_request(&self, msg: &'static str) -> Response {
        self.stats.bad_requests.fetch_add(1, Ordering::Relaxed);
        (StatusCode::BAD_REQUEST, msg).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    message: String,
    user_id: String,
    session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams {
    q: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    user_id: String,
    password: String,
}

async fn handle_chat(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    if let Some(status) = state.begin(&headers).await {
        return status.into_response();
    }
    state.note_json(&headers);
    let Ok(req) = serde_json::from_str::<ChatRequest>(&body) else {
        return state.bad_request("bad json");
    };
    if req.message.trim().is_empty() || req.user_id.is_empty() || req.session_id.is_empty() {
        return state.bad_request("missing fields");
    }
    state.stats.chat.fetch_add(1, Ordering::Relaxed);

    Json(json!({
        "sessionId": req.session_id,
        "reply": format!("echo: {}", req.message),
    }))
    .into_response()
}

async fn handle_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Response {
    if let Some(status) = state.begin(&headers).await {
        return status.into_response();
    }
    let (Some(q), Some(user_id)) = (params.q, params.user_id) else {
        return state.bad_request("missing q or userId");
    };
    state.stats.search.fetch_add(1, Ordering::Relaxed);
    let results = vec![format!("{q} (1)"), format!("{q} (2)")];
    *state.stats.last_search.lock() = Some((q, user_id));

    Json(json!({ "results": results })).into_response()
}

async fn handle_login(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    if let Some(status) = state.begin(&headers).await {
        return status.into_response();
    }
    state.note_json(&headers);
    let Ok(req) = serde_json::from_str::<LoginRequest>(&body) else {
        return state.bad_request("bad json");
    };
    if req.password.is_empty() {
        return (StatusCode::UNAUTHORIZED, "missing password").into_response();
    }
    state.stats.login.fetch_add(1, Ordering::Relaxed);

    Json(json!({ "token": format!("token-{}", req.user_id) })).into_response()
}

pub fn router(options: TestServerOptions, stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_CHAT, post(handle_chat))
        .route(PATH_SEARCH, get(handle_search))
        .route(PATH_LOGIN, post(handle_login))
        .with_state(AppState { options, stats })
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(TestServerOptions::default()).await
    }

    pub async fn start_with(options: TestServerOptions) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(options, stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}

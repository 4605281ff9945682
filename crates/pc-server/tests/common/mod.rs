#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Json;
use serde_json::Value;

use pc_server::config::{
    AnnotationConfig, AppConfig, BackendConfig, LoggingConfig, ServerConfig,
};
use pc_server::handler::{router, AppState};

// ---------------------------------------------------------------------------
// MockBackendServer — chat-completion backend that numbers its replies
// ---------------------------------------------------------------------------

/// One request as seen by the mock.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub body: Value,
    pub conversation_id: Option<String>,
    pub turn_id: Option<String>,
    pub authorization: Option<String>,
}

struct MockState {
    calls: AtomicUsize,
    fail_on: Vec<usize>,
    recorded: Mutex<Vec<RecordedCall>>,
}

pub struct MockBackendServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockBackendServer {
    pub async fn start() -> Self {
        Self::start_failing_on(&[]).await
    }

    /// Calls whose 1-based number is in `fail_on` get an HTTP 500.
    pub async fn start_failing_on(fail_on: &[usize]) -> Self {
        let state = Arc::new(MockState {
            calls: AtomicUsize::new(0),
            fail_on: fail_on.to_vec(),
            recorded: Mutex::new(Vec::new()),
        });

        let app = axum::Router::new()
            .route("/v1/chat/completions", post(mock_completion_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            state,
            _handle: handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn call_count(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.state.recorded.lock().unwrap().clone()
    }
}

impl Drop for MockBackendServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn mock_completion_handler(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let call = state.calls.fetch_add(1, Ordering::SeqCst) + 1;
    state.recorded.lock().unwrap().push(RecordedCall {
        body,
        conversation_id: header(&headers, "x-conversation-id"),
        turn_id: header(&headers, "x-turn-id"),
        authorization: header(&headers, "authorization"),
    });

    if state.fail_on.contains(&call) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": {"message": "model crashed", "type": "server_error"}
            })),
        )
            .into_response();
    }

    Json(sample_completion(&format!("reply-{call}"))).into_response()
}

pub fn sample_completion(content: &str) -> Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1700000000,
        "model": TEST_MODEL,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
    })
}

// ---------------------------------------------------------------------------
// TestApp — the real annotation router over files in a scratch directory
// ---------------------------------------------------------------------------

pub const TEST_MODEL: &str = "gemma-3-27b";

pub struct TestApp {
    pub addr: SocketAddr,
    pub output_file: PathBuf,
    pub session_file: PathBuf,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn start(mock_url: &str, dir: &Path, system_prompts: &[&str]) -> Self {
        let output_file = dir.join("dpo_dataset.jsonl");
        let session_file = dir.join("annotation_session.json");

        let config = AppConfig {
            server: ServerConfig {
                listen: "127.0.0.1:0".to_owned(),
            },
            backend: BackendConfig {
                base_url: mock_url.to_owned(),
                model: TEST_MODEL.to_owned(),
                api_key: Some("sk-test".to_owned()),
                temperature: 0.95,
                top_p: 0.95,
                request_delay_ms: 0,
                timeout_ms: Some(5_000),
            },
            annotation: AnnotationConfig {
                output_file: output_file.clone(),
                session_file: session_file.clone(),
                initial_user_prompt: "Write a haiku about autumn.".to_owned(),
                system_prompts: system_prompts.iter().map(|s| (*s).to_owned()).collect(),
                ..AnnotationConfig::default()
            },
            logging: LoggingConfig::default(),
        };

        let runtime =
            pc_server::bootstrap::into_runtime(config).expect("test config should be valid");
        let state = Arc::new(AppState::from_runtime(&runtime).expect("app state"));
        let app = router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind app");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            output_file,
            session_file,
            _handle: handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Posts a form and asserts the post/redirect/get response.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) {
        let resp = http_client()
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(resp.status(), 303, "POST {path} should redirect");
        assert_eq!(resp.headers()["location"], "/");
    }

    /// Waits for any running transition, then returns the view model.
    pub async fn state(&self) -> Value {
        self.get_json("/api/state").await
    }

    pub async fn get_json(&self, path: &str) -> Value {
        http_client()
            .get(self.url(path))
            .send()
            .await
            .expect("request should succeed")
            .json()
            .await
            .expect("valid JSON")
    }

    pub async fn page(&self) -> String {
        http_client()
            .get(self.url("/"))
            .send()
            .await
            .expect("request should succeed")
            .text()
            .await
            .expect("page body")
    }

    pub fn dataset_lines(&self) -> Vec<Value> {
        match std::fs::read_to_string(&self.output_file) {
            Ok(content) => content
                .lines()
                .map(|line| serde_json::from_str(line).expect("valid JSONL line"))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn session_json(&self) -> Option<Value> {
        std::fs::read_to_string(&self.session_file)
            .ok()
            .map(|content| serde_json::from_str(&content).expect("valid session JSON"))
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("http client")
}

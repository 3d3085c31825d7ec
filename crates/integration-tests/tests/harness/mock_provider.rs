//! Mock image generation backends for integration tests
//!
//! One axum server per provider shape, each with canned responses and
//! request counters.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Base64 of the bytes `[1, 2, 3]`
pub const IMAGE_B64: &str = "AQID";

/// URL the prediction mock reports as its output
pub const PREDICTION_OUTPUT: &str = "https://cdn.mock/flux.png";

/// Rewritten prompt returned by the enhancer mock
pub const ENHANCED_PROMPT: &str = "a gleaming red bicycle at golden hour";

#[derive(Default)]
struct MockState {
    requests: AtomicU32,
    polls: AtomicU32,
    prompts: Mutex<Vec<String>>,
    images: Mutex<Vec<String>>,
    delay: Duration,
    fail: bool,
}

impl MockState {
    async fn begin(&self, prompt: Option<&str>, image: Option<&str>) -> Option<Response> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if let Some(prompt) = prompt {
            self.prompts.lock().unwrap().push(prompt.to_owned());
        }
        if let Some(image) = image {
            self.images.lock().unwrap().push(image.to_owned());
        }
        tokio::time::sleep(self.delay).await;

        self.fail.then(|| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": { "message": "mock backend exploded" } })),
            )
                .into_response()
        })
    }
}

/// Mock backend serving one provider shape
pub struct MockProvider {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

/// Knobs for how the mock behaves
#[derive(Default, Clone, Copy)]
pub struct Behavior {
    pub delay: Duration,
    pub fail: bool,
}

impl Behavior {
    pub fn delayed(millis: u64) -> Self {
        Self {
            delay: Duration::from_millis(millis),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl MockProvider {
    /// OpenAI-compatible `/images/generations` returning base64 output
    pub async fn images_api(behavior: Behavior) -> anyhow::Result<Self> {
        Self::start(behavior, |router| {
            router
                .route("/images/generations", routing::post(handle_images))
                .route("/chat/completions", routing::post(handle_chat))
        })
        .await
    }

    /// Replicate-compatible prediction API that succeeds on the second poll
    pub async fn prediction(behavior: Behavior) -> anyhow::Result<Self> {
        Self::start(behavior, |router| {
            router
                .route("/models/{owner}/{name}/predictions", routing::post(handle_create_prediction))
                .route("/predictions/{id}", routing::get(handle_get_prediction))
        })
        .await
    }

    /// Gemini `streamGenerateContent` emitting text, then an inline image
    pub async fn gemini(behavior: Behavior) -> anyhow::Result<Self> {
        Self::start(behavior, |router| router.route("/models/{action}", routing::post(handle_gemini))).await
    }

    async fn start(
        behavior: Behavior,
        routes: impl FnOnce(Router<Arc<MockState>>) -> Router<Arc<MockState>>,
    ) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            delay: behavior.delay,
            fail: behavior.fail,
            ..MockState::default()
        });

        let app = routes(Router::new()).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Generation requests received (polls excluded)
    pub fn request_count(&self) -> u32 {
        self.state.requests.load(Ordering::Relaxed)
    }

    pub fn poll_count(&self) -> u32 {
        self.state.polls.load(Ordering::Relaxed)
    }

    /// Prompts seen by the generation endpoint, in arrival order
    pub fn prompts(&self) -> Vec<String> {
        self.state.prompts.lock().unwrap().clone()
    }

    /// Reference images attached to generation requests, as sent on the wire
    pub fn input_images(&self) -> Vec<String> {
        self.state.images.lock().unwrap().clone()
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_images(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    if let Some(failure) = state.begin(body["prompt"].as_str(), None).await {
        return failure;
    }

    Json(json!({
        "created": 1,
        "data": [{ "b64_json": IMAGE_B64 }],
        "usage": { "input_tokens": 12, "output_tokens": 30 },
    }))
    .into_response()
}

async fn handle_chat(Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["messages"][1]["role"], "user");
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": ENHANCED_PROMPT } }],
    }))
}

async fn handle_create_prediction(
    State(state): State<Arc<MockState>>,
    Path((_owner, _name)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    if let Some(failure) = state.begin(body["input"]["prompt"].as_str(), body["input"]["image"].as_str()).await {
        return failure;
    }

    Json(json!({ "id": "pred-1", "status": "starting" })).into_response()
}

async fn handle_get_prediction(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Json<Value> {
    let polls = state.polls.fetch_add(1, Ordering::Relaxed) + 1;
    if polls < 2 {
        return Json(json!({ "id": id, "status": "processing" }));
    }

    Json(json!({ "id": id, "status": "succeeded", "output": [PREDICTION_OUTPUT] }))
}

async fn handle_gemini(
    State(state): State<Arc<MockState>>,
    Path(action): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    assert!(action.ends_with(":streamGenerateContent"), "unexpected action {action}");
    let parts = &body["contents"][0]["parts"];
    if let Some(failure) = state.begin(parts[0]["text"].as_str(), parts[1]["inlineData"]["data"].as_str()).await {
        return failure;
    }

    let chunks = [
        json!({ "candidates": [{ "content": { "role": "model", "parts": [{ "text": "Here is your bicycle." }] } }] }),
        json!({ "candidates": [{ "content": { "role": "model", "parts": [
            { "inlineData": { "mimeType": "image/png", "data": IMAGE_B64 } },
        ] } }] }),
        json!({ "usageMetadata": { "promptTokenCount": 8, "candidatesTokenCount": 34, "totalTokenCount": 42 } }),
    ];
    let body: String = chunks.iter().map(|chunk| format!("data: {chunk}\n\n")).collect();

    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}
